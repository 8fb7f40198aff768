//! NextGCore ASN.1 Codec Library
//!
//! This crate provides ASN.1 APER encoding/decoding for the NGAP transfer
//! payloads an SMF exchanges with the RAN through the AMF.
//!
//! # Modules
//!
//! - `per` - Packed Encoding Rules (APER) encoder/decoder
//! - `ngap` - NGAP transfer types and codec (3GPP TS 38.413)

pub mod per;    // Packed Encoding Rules
pub mod ngap;   // NGAP codec (directory module)

#[cfg(test)]
mod property_tests;

// Re-export commonly used types
pub use per::{
    decode_from_bytes, encode_to_bytes, AperDecode, AperDecoder, AperEncode, AperEncoder,
    Constraint, PerError, PerResult, Size,
};

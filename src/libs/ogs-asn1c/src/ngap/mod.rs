//! NGAP (NG Application Protocol) codec
//!
//! The subset of 3GPP TS 38.413 an SMF needs to produce N2 SM transfers:
//! IE containers, causes and the PDU session resource transfer types.

pub mod types;
pub mod cause;
pub mod ies;
pub mod transfer;

// Re-export commonly used types
pub use types::*;
pub use cause::*;
pub use ies::*;
pub use transfer::*;

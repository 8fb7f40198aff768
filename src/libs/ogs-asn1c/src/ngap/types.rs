//! NGAP common data types
//!
//! Criticality and ProtocolIE-ID (NGAP-CommonDataTypes, 3GPP TS 38.413), plus
//! the macro the IE modules use to declare ENUMERATED types.

use crate::per::{AperDecode, AperDecoder, AperEncode, AperEncoder, Constraint, PerResult};

/// Declares an ENUMERATED type with its PER constraint, a checked
/// `TryFrom<u8>` conversion and the APER codec impls.
macro_rules! aper_enumerated {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident ($constraint:expr) {
            $($variant:ident = $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        $vis enum $name {
            $($variant = $value,)+
        }

        impl $name {
            pub const CONSTRAINT: $crate::per::Constraint = $constraint;
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];
        }

        impl TryFrom<u8> for $name {
            type Error = u8;

            fn try_from(value: u8) -> Result<Self, u8> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| *v as u8 == value)
                    .ok_or(value)
            }
        }

        impl $crate::per::AperEncode for $name {
            fn encode_aper(
                &self,
                encoder: &mut $crate::per::AperEncoder,
            ) -> $crate::per::PerResult<()> {
                encoder.encode_enumerated(*self as i64, &Self::CONSTRAINT)
            }
        }

        impl $crate::per::AperDecode for $name {
            fn decode_aper(
                decoder: &mut $crate::per::AperDecoder,
            ) -> $crate::per::PerResult<Self> {
                let value = decoder.decode_enumerated(&Self::CONSTRAINT)?;
                u8::try_from(value)
                    .ok()
                    .and_then(|v| Self::try_from(v).ok())
                    .ok_or_else(|| {
                        $crate::per::PerError::DecodeError(format!(
                            "Invalid {} value: {}",
                            stringify!($name),
                            value
                        ))
                    })
            }
        }
    };
}

pub(crate) use aper_enumerated;

aper_enumerated! {
    /// Criticality ::= ENUMERATED { reject, ignore, notify }
    pub enum Criticality (Constraint::new(0, 2)) {
        Reject = 0,
        Ignore = 1,
        Notify = 2,
    }
}

/// ProtocolIE-ID ::= INTEGER (0..65535)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolIeId(pub u16);

impl ProtocolIeId {
    pub const CONSTRAINT: Constraint = Constraint::new(0, 65535);

    // Transfer container IE IDs from 3GPP TS 38.413
    pub const PDU_SESSION_AGGREGATE_MAXIMUM_BIT_RATE: Self = Self(130);
    pub const PDU_SESSION_TYPE: Self = Self(134);
    pub const QOS_FLOW_ADD_OR_MODIFY_REQUEST_LIST: Self = Self(135);
    pub const QOS_FLOW_SETUP_REQUEST_LIST: Self = Self(136);
    pub const UL_NGU_UP_TNL_INFORMATION: Self = Self(139);
}

impl AperEncode for ProtocolIeId {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        encoder.encode_constrained_whole_number(self.0 as i64, &Self::CONSTRAINT)
    }
}

impl AperDecode for ProtocolIeId {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let value = decoder.decode_constrained_whole_number(&Self::CONSTRAINT)?;
        Ok(ProtocolIeId(value as u16))
    }
}

//! NGAP Information Elements
//!
//! ProtocolIE-Field and ProtocolIE-Container (NGAP-Containers, 3GPP TS 38.413).
//! IE values travel as open types: the APER encoding of the value, length
//! prefixed.

use bytes::Bytes;

use super::types::{Criticality, ProtocolIeId};
use crate::per::{
    decode_from_bytes, encode_to_bytes, AperDecode, AperDecoder, AperEncode, AperEncoder,
    PerResult,
};

/// One IE: id, criticality and the encoded value
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolIeField {
    pub id: ProtocolIeId,
    pub criticality: Criticality,
    pub value: Bytes,
}

impl ProtocolIeField {
    pub fn new<T: AperEncode + ?Sized>(
        id: ProtocolIeId,
        criticality: Criticality,
        value: &T,
    ) -> PerResult<Self> {
        let encoded = encode_to_bytes(value)?;
        // An open type is never empty
        let value = if encoded.is_empty() {
            Bytes::from_static(&[0])
        } else {
            encoded
        };
        Ok(Self {
            id,
            criticality,
            value,
        })
    }

    pub fn decode_value<T: AperDecode>(&self) -> PerResult<T> {
        decode_from_bytes(&self.value)
    }
}

impl AperEncode for ProtocolIeField {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        self.id.encode_aper(encoder)?;
        self.criticality.encode_aper(encoder)?;
        encoder.encode_length_determinant(self.value.len())?;
        encoder.write_bytes(&self.value);
        Ok(())
    }
}

impl AperDecode for ProtocolIeField {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let id = ProtocolIeId::decode_aper(decoder)?;
        let criticality = Criticality::decode_aper(decoder)?;
        let length = decoder.decode_length_determinant()?;
        Ok(Self {
            id,
            criticality,
            value: Bytes::from(decoder.read_bytes(length)?),
        })
    }
}

/// SEQUENCE (SIZE (0..maxProtocolIEs)) OF ProtocolIE-Field
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProtocolIeContainer {
    pub ies: Vec<ProtocolIeField>,
}

impl ProtocolIeContainer {
    /// maxProtocolIEs
    pub const MAX_PROTOCOL_IES: usize = 65535;

    pub fn find(&self, id: ProtocolIeId) -> Option<&ProtocolIeField> {
        self.ies.iter().find(|ie| ie.id == id)
    }

    pub fn ids(&self) -> Vec<ProtocolIeId> {
        self.ies.iter().map(|ie| ie.id).collect()
    }
}

impl FromIterator<ProtocolIeField> for ProtocolIeContainer {
    fn from_iter<I: IntoIterator<Item = ProtocolIeField>>(iter: I) -> Self {
        Self {
            ies: iter.into_iter().collect(),
        }
    }
}

impl AperEncode for ProtocolIeContainer {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        encoder.encode_constrained_length(self.ies.len(), 0, Self::MAX_PROTOCOL_IES)?;
        self.ies.iter().try_for_each(|ie| ie.encode_aper(encoder))
    }
}

impl AperDecode for ProtocolIeContainer {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let count = decoder.decode_constrained_length(0, Self::MAX_PROTOCOL_IES)?;
        (0..count)
            .map(|_| ProtocolIeField::decode_aper(decoder))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ngap::cause::{Cause, CauseMisc};

    #[test]
    fn test_container_layout() {
        let container: ProtocolIeContainer = std::iter::once(
            ProtocolIeField::new(
                ProtocolIeId::PDU_SESSION_TYPE,
                Criticality::Reject,
                &Cause::Misc(CauseMisc::Unspecified),
            )
            .unwrap(),
        )
        .collect();

        let bytes = encode_to_bytes(&container).unwrap();
        // count (2 octets), id (2 octets), criticality + pad, length, value
        assert_eq!(bytes[..2], [0x00u8, 0x01]);
        assert_eq!(bytes[2..4], [0x00u8, 134]);
        assert_eq!(bytes[4], 0x00);
        assert_eq!(bytes[5] as usize, bytes.len() - 6);

        let decoded: ProtocolIeContainer = decode_from_bytes(&bytes).unwrap();
        assert_eq!(decoded, container);
        assert_eq!(
            decoded
                .find(ProtocolIeId::PDU_SESSION_TYPE)
                .map(|ie| ie.decode_value::<Cause>()),
            Some(Ok(Cause::Misc(CauseMisc::Unspecified)))
        );
        assert!(decoded.find(ProtocolIeId::QOS_FLOW_SETUP_REQUEST_LIST).is_none());
    }

    #[test]
    fn test_empty_container() {
        let bytes = encode_to_bytes(&ProtocolIeContainer::default()).unwrap();
        assert_eq!(bytes.as_ref(), &[0x00, 0x00]);
        assert_eq!(
            decode_from_bytes::<ProtocolIeContainer>(&bytes),
            Ok(ProtocolIeContainer::default())
        );
    }
}

//! NGAP Cause
//!
//! The Cause CHOICE and its per-group enumerations (NGAP-IEs, 3GPP TS 38.413).
//! Values are numbered by their position in the ASN.1 enumeration.

use super::types::aper_enumerated;
use crate::per::{AperDecode, AperDecoder, AperEncode, AperEncoder, Constraint, PerError, PerResult};

aper_enumerated! {
    /// CauseRadioNetwork
    /// Root enumeration has 45 values (0-44), extensible
    pub enum CauseRadioNetwork (Constraint::extensible(0, 44)) {
        Unspecified = 0,
        TxnrelocoverallExpiry = 1,
        SuccessfulHandover = 2,
        ReleaseDueToNgranGeneratedReason = 3,
        ReleaseDueTo5gcGeneratedReason = 4,
        HandoverCancelled = 5,
        PartialHandover = 6,
        HoFailureInTarget5gcNgranNodeOrTargetSystem = 7,
        HoTargetNotAllowed = 8,
        TngrelocoverallExpiry = 9,
        TngrelocprepExpiry = 10,
        CellNotAvailable = 11,
        UnknownTargetId = 12,
        NoRadioResourcesAvailableInTargetCell = 13,
        UnknownLocalUeNgapId = 14,
        InconsistentRemoteUeNgapId = 15,
        HandoverDesirableForRadioReason = 16,
        TimeCriticalHandover = 17,
        ResourceOptimisationHandover = 18,
        ReduceLoadInServingCell = 19,
        UserInactivity = 20,
        RadioConnectionWithUeLost = 21,
        RadioResourcesNotAvailable = 22,
        InvalidQosCombination = 23,
        FailureInRadioInterfaceProcedure = 24,
        InteractionWithOtherProcedure = 25,
        UnknownPduSessionId = 26,
        UnknownQosFlowId = 27,
        MultiplePduSessionIdInstances = 28,
        MultipleQosFlowIdInstances = 29,
        EncryptionAndOrIntegrityProtectionAlgorithmsNotSupported = 30,
        NgIntraSystemHandoverTriggered = 31,
        NgInterSystemHandoverTriggered = 32,
        XnHandoverTriggered = 33,
        NotSupported5qiValue = 34,
        UeContextTransfer = 35,
        ImsVoiceEpsFallbackOrRatFallbackTriggered = 36,
        UpIntegrityProtectionNotPossible = 37,
        UpConfidentialityProtectionNotPossible = 38,
        SliceNotSupported = 39,
        UeInRrcInactiveStateNotReachable = 40,
        Redirection = 41,
        ResourcesNotAvailableForTheSlice = 42,
        UeMaxIntegrityProtectedDataRateReason = 43,
        ReleaseDueToCnDetectedMobility = 44,
        // Extension values
        N26InterfaceNotAvailable = 45,
        ReleaseDueToPreEmption = 46,
    }
}

aper_enumerated! {
    /// CauseTransport
    pub enum CauseTransport (Constraint::extensible(0, 1)) {
        TransportResourceUnavailable = 0,
        Unspecified = 1,
    }
}

aper_enumerated! {
    /// CauseNas
    pub enum CauseNas (Constraint::extensible(0, 3)) {
        NormalRelease = 0,
        AuthenticationFailure = 1,
        Deregister = 2,
        Unspecified = 3,
        // Extension
        UeNotInPlmnServingArea = 4,
    }
}

aper_enumerated! {
    /// CauseProtocol
    pub enum CauseProtocol (Constraint::extensible(0, 6)) {
        TransferSyntaxError = 0,
        AbstractSyntaxErrorReject = 1,
        AbstractSyntaxErrorIgnoreAndNotify = 2,
        MessageNotCompatibleWithReceiverState = 3,
        SemanticError = 4,
        AbstractSyntaxErrorFalselyConstructedMessage = 5,
        Unspecified = 6,
    }
}

aper_enumerated! {
    /// CauseMisc
    pub enum CauseMisc (Constraint::extensible(0, 5)) {
        ControlProcessingOverload = 0,
        NotEnoughUserPlaneProcessingResources = 1,
        HardwareFailure = 2,
        OmIntervention = 3,
        UnknownPlmnOrSnpn = 4,
        Unspecified = 5,
    }
}

aper_enumerated! {
    /// Cause CHOICE alternative, numbered by its root index
    pub enum CauseCategory (Constraint::new(0, 4)) {
        RadioNetwork = 0,
        Transport = 1,
        Nas = 2,
        Protocol = 3,
        Misc = 4,
    }
}

/// Reasons a (category, value) pair does not name a cause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CauseLookupError {
    UnknownCategory(u8),
    InvalidValue { category: CauseCategory, value: u8 },
}

/// Cause ::= CHOICE { radioNetwork, transport, nas, protocol, misc, choice-Extensions }
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    RadioNetwork(CauseRadioNetwork),
    Transport(CauseTransport),
    Nas(CauseNas),
    Protocol(CauseProtocol),
    Misc(CauseMisc),
}

impl Cause {
    /// Five categories plus choice-Extensions, no extension marker
    pub const NUM_ALTERNATIVES: usize = 6;

    /// Build the cause carried by exactly one category alternative.
    pub fn from_parts(category: u8, value: u8) -> Result<Self, CauseLookupError> {
        let category =
            CauseCategory::try_from(category).map_err(CauseLookupError::UnknownCategory)?;
        let invalid = |value| CauseLookupError::InvalidValue { category, value };
        Ok(match category {
            CauseCategory::RadioNetwork => {
                Cause::RadioNetwork(CauseRadioNetwork::try_from(value).map_err(invalid)?)
            }
            CauseCategory::Transport => {
                Cause::Transport(CauseTransport::try_from(value).map_err(invalid)?)
            }
            CauseCategory::Nas => Cause::Nas(CauseNas::try_from(value).map_err(invalid)?),
            CauseCategory::Protocol => {
                Cause::Protocol(CauseProtocol::try_from(value).map_err(invalid)?)
            }
            CauseCategory::Misc => Cause::Misc(CauseMisc::try_from(value).map_err(invalid)?),
        })
    }

    pub fn category(&self) -> CauseCategory {
        match self {
            Cause::RadioNetwork(_) => CauseCategory::RadioNetwork,
            Cause::Transport(_) => CauseCategory::Transport,
            Cause::Nas(_) => CauseCategory::Nas,
            Cause::Protocol(_) => CauseCategory::Protocol,
            Cause::Misc(_) => CauseCategory::Misc,
        }
    }
}

impl AperEncode for Cause {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        encoder.encode_choice_index(self.category() as usize, Self::NUM_ALTERNATIVES, false)?;
        match self {
            Cause::RadioNetwork(v) => v.encode_aper(encoder),
            Cause::Transport(v) => v.encode_aper(encoder),
            Cause::Nas(v) => v.encode_aper(encoder),
            Cause::Protocol(v) => v.encode_aper(encoder),
            Cause::Misc(v) => v.encode_aper(encoder),
        }
    }
}

impl AperDecode for Cause {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let index = decoder.decode_choice_index(Self::NUM_ALTERNATIVES, false)?;
        let category = match u8::try_from(index).map(CauseCategory::try_from) {
            Ok(Ok(category)) => category,
            // choice-Extensions
            _ if index == Self::NUM_ALTERNATIVES - 1 => return Err(PerError::UnsupportedExtension),
            _ => {
                return Err(PerError::InvalidChoiceIndex {
                    index,
                    max: Self::NUM_ALTERNATIVES - 1,
                })
            }
        };
        Ok(match category {
            CauseCategory::RadioNetwork => Cause::RadioNetwork(AperDecode::decode_aper(decoder)?),
            CauseCategory::Transport => Cause::Transport(AperDecode::decode_aper(decoder)?),
            CauseCategory::Nas => Cause::Nas(AperDecode::decode_aper(decoder)?),
            CauseCategory::Protocol => Cause::Protocol(AperDecode::decode_aper(decoder)?),
            CauseCategory::Misc => Cause::Misc(AperDecode::decode_aper(decoder)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::per::{decode_from_bytes, encode_to_bytes};

    #[test]
    fn test_every_category_decodes_back() {
        let causes = [
            Cause::RadioNetwork(CauseRadioNetwork::UserInactivity),
            Cause::Transport(CauseTransport::Unspecified),
            Cause::Nas(CauseNas::Unspecified),
            Cause::Protocol(CauseProtocol::Unspecified),
            Cause::Misc(CauseMisc::OmIntervention),
        ];
        for cause in causes {
            let bytes = encode_to_bytes(&cause).unwrap();
            assert_eq!(decode_from_bytes::<Cause>(&bytes), Ok(cause));
        }
    }

    #[test]
    fn test_value_after_extension_marker() {
        // 46 sits past the root (0..=44) and travels as a normally small number
        let cause = Cause::RadioNetwork(CauseRadioNetwork::ReleaseDueToPreEmption);
        let bytes = encode_to_bytes(&cause).unwrap();
        assert_eq!(bytes[0] >> 5, 0, "radioNetwork index");
        assert_eq!(decode_from_bytes::<Cause>(&bytes), Ok(cause));
    }

    #[test]
    fn test_choice_extensions_alternative() {
        // index 101 is choice-Extensions
        assert_eq!(
            decode_from_bytes::<Cause>(&[0xA0, 0x00]),
            Err(PerError::UnsupportedExtension)
        );
        // 110 is past the six alternatives
        assert!(matches!(
            decode_from_bytes::<Cause>(&[0xC0, 0x00]),
            Err(PerError::ConstraintViolation { .. })
        ));
    }

    #[test]
    fn test_nas_normal_release_bits() {
        // index 010 in 3 bits, no choice extension bit, enum ext=0, value 00
        let bytes = encode_to_bytes(&Cause::Nas(CauseNas::NormalRelease)).unwrap();
        assert_eq!(bytes.as_ref(), &[0x40]);
    }

    #[test]
    fn test_from_parts() {
        assert_eq!(
            Cause::from_parts(1, 0),
            Ok(Cause::Transport(CauseTransport::TransportResourceUnavailable))
        );
        assert_eq!(
            Cause::from_parts(4, 2),
            Ok(Cause::Misc(CauseMisc::HardwareFailure))
        );
        assert_eq!(Cause::from_parts(5, 0), Err(CauseLookupError::UnknownCategory(5)));
        assert_eq!(
            Cause::from_parts(1, 2),
            Err(CauseLookupError::InvalidValue {
                category: CauseCategory::Transport,
                value: 2
            })
        );
    }
}

//! NGAP Transfer Containers
//!
//! PDU session resource transfers from NGAP-IEs (3GPP TS 38.413 §9.3.4).
//! Transfers are standalone APER payloads carried as OCTET STRINGs inside
//! session resource, path switch and handover messages.

use bitvec::prelude::*;

use super::cause::Cause;
use super::ies::{ProtocolIeContainer, ProtocolIeField};
use super::types::{aper_enumerated, Criticality, ProtocolIeId};
use crate::per::{
    AperDecode, AperDecoder, AperEncode, AperEncoder, Constraint, PerError, PerResult, Size,
};

/// maxnoofQosFlows
pub const MAX_QOS_FLOWS: usize = 64;

/// Writes the extension marker and the optional-field bitmap of an
/// extensible SEQUENCE. Extension additions are never emitted.
fn encode_preamble(encoder: &mut AperEncoder, optional_present: &[bool]) {
    encoder.write_bit(false);
    for present in optional_present {
        encoder.write_bit(*present);
    }
}

fn decode_preamble<const N: usize>(decoder: &mut AperDecoder) -> PerResult<[bool; N]> {
    if decoder.read_bit()? {
        return Err(PerError::UnsupportedExtension);
    }
    let mut present = [false; N];
    for bit in present.iter_mut() {
        *bit = decoder.read_bit()?;
    }
    Ok(present)
}

/// The trailing iE-Extensions slot is never populated by this codec.
fn reject_ie_extensions(present: bool) -> PerResult<()> {
    if present {
        Err(PerError::UnsupportedExtension)
    } else {
        Ok(())
    }
}

fn encode_bit_rate(encoder: &mut AperEncoder, value: u64) -> PerResult<()> {
    let value = i64::try_from(value).unwrap_or(i64::MAX);
    encoder.encode_integer(value, &PduSessionAggregateMaximumBitRate::BIT_RATE)
}

fn decode_bit_rate(decoder: &mut AperDecoder) -> PerResult<u64> {
    decoder
        .decode_integer(&PduSessionAggregateMaximumBitRate::BIT_RATE)
        .map(|v| v as u64)
}

fn decode_small(decoder: &mut AperDecoder, constraint: &Constraint) -> PerResult<u8> {
    decoder.decode_integer(constraint).map(|v| v as u8)
}

/// PDUSessionAggregateMaximumBitRate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduSessionAggregateMaximumBitRate {
    pub downlink: u64,
    pub uplink: u64,
}

impl PduSessionAggregateMaximumBitRate {
    /// BitRate ::= INTEGER (0..4000000000000, ...)
    pub const BIT_RATE: Constraint = Constraint::extensible(0, 4_000_000_000_000);
}

impl AperEncode for PduSessionAggregateMaximumBitRate {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        encode_preamble(encoder, &[false]);
        encode_bit_rate(encoder, self.downlink)?;
        encode_bit_rate(encoder, self.uplink)
    }
}

impl AperDecode for PduSessionAggregateMaximumBitRate {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let [ext] = decode_preamble::<1>(decoder)?;
        reject_ie_extensions(ext)?;
        Ok(Self {
            downlink: decode_bit_rate(decoder)?,
            uplink: decode_bit_rate(decoder)?,
        })
    }
}

/// GTPTunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtpTunnel {
    /// TransportLayerAddress as an IPv4 (4 octets) or IPv6 (16 octets) address
    pub transport_layer_address: Vec<u8>,
    pub gtp_teid: [u8; 4],
}

impl GtpTunnel {
    pub fn new(address: impl Into<Vec<u8>>, teid: u32) -> Self {
        Self {
            transport_layer_address: address.into(),
            gtp_teid: teid.to_be_bytes(),
        }
    }

    pub fn teid(&self) -> u32 {
        u32::from_be_bytes(self.gtp_teid)
    }
}

impl AperEncode for GtpTunnel {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        encode_preamble(encoder, &[false]);
        // TransportLayerAddress ::= BIT STRING (SIZE(1..160, ...))
        encoder.write_bit(false);
        let bits = BitSlice::<u8, Msb0>::from_slice(&self.transport_layer_address);
        encoder.encode_bit_string(bits, Size::Range(1, 160))?;
        encoder.encode_octet_string(&self.gtp_teid, Size::Fixed(4))
    }
}

impl AperDecode for GtpTunnel {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let [ext] = decode_preamble::<1>(decoder)?;
        reject_ie_extensions(ext)?;
        if decoder.read_bit()? {
            return Err(PerError::UnsupportedExtension);
        }
        let bits = decoder.decode_bit_string(Size::Range(1, 160))?;
        if bits.len() % 8 != 0 {
            return Err(PerError::InvalidLength { length: bits.len() });
        }
        let teid = decoder.decode_octet_string(Size::Fixed(4))?;
        let mut gtp_teid = [0u8; 4];
        gtp_teid.copy_from_slice(&teid);
        Ok(Self {
            transport_layer_address: bits.into_vec(),
            gtp_teid,
        })
    }
}

/// UPTransportLayerInformation ::= CHOICE { gTPTunnel, choice-Extensions }
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpTransportLayerInformation {
    GtpTunnel(GtpTunnel),
}

impl UpTransportLayerInformation {
    pub const NUM_ALTERNATIVES: usize = 2;
}

impl AperEncode for UpTransportLayerInformation {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        match self {
            UpTransportLayerInformation::GtpTunnel(tunnel) => {
                encoder.encode_choice_index(0, Self::NUM_ALTERNATIVES, false)?;
                tunnel.encode_aper(encoder)
            }
        }
    }
}

impl AperDecode for UpTransportLayerInformation {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        match decoder.decode_choice_index(Self::NUM_ALTERNATIVES, false)? {
            0 => Ok(Self::GtpTunnel(GtpTunnel::decode_aper(decoder)?)),
            _ => Err(PerError::UnsupportedExtension),
        }
    }
}

aper_enumerated! {
    /// PDUSessionType
    pub enum PduSessionType (Constraint::extensible(0, 4)) {
        Ipv4 = 0,
        Ipv6 = 1,
        Ipv4v6 = 2,
        Ethernet = 3,
        Unstructured = 4,
    }
}

aper_enumerated! {
    pub enum PreEmptionCapability (Constraint::extensible(0, 1)) {
        ShallNotTriggerPreEmption = 0,
        MayTriggerPreEmption = 1,
    }
}

aper_enumerated! {
    pub enum PreEmptionVulnerability (Constraint::extensible(0, 1)) {
        NotPreEmptable = 0,
        PreEmptable = 1,
    }
}

/// AllocationAndRetentionPriority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationAndRetentionPriority {
    pub priority_level_arp: u8,
    pub pre_emption_capability: PreEmptionCapability,
    pub pre_emption_vulnerability: PreEmptionVulnerability,
}

impl AllocationAndRetentionPriority {
    /// PriorityLevelARP ::= INTEGER (1..15)
    pub const PRIORITY_LEVEL: Constraint = Constraint::new(1, 15);
}

impl AperEncode for AllocationAndRetentionPriority {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        encode_preamble(encoder, &[false]);
        encoder.encode_integer(self.priority_level_arp as i64, &Self::PRIORITY_LEVEL)?;
        self.pre_emption_capability.encode_aper(encoder)?;
        self.pre_emption_vulnerability.encode_aper(encoder)
    }
}

impl AperDecode for AllocationAndRetentionPriority {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let [ext] = decode_preamble::<1>(decoder)?;
        reject_ie_extensions(ext)?;
        Ok(Self {
            priority_level_arp: decode_small(decoder, &Self::PRIORITY_LEVEL)?,
            pre_emption_capability: PreEmptionCapability::decode_aper(decoder)?,
            pre_emption_vulnerability: PreEmptionVulnerability::decode_aper(decoder)?,
        })
    }
}

/// NonDynamic5QIDescriptor without the optional priority/window/burst fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonDynamic5qiDescriptor {
    pub five_qi: u8,
}

impl NonDynamic5qiDescriptor {
    /// FiveQI ::= INTEGER (0..255, ...)
    pub const FIVE_QI: Constraint = Constraint::extensible(0, 255);
}

impl AperEncode for NonDynamic5qiDescriptor {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        encode_preamble(encoder, &[false; 4]);
        encoder.encode_integer(self.five_qi as i64, &Self::FIVE_QI)
    }
}

impl AperDecode for NonDynamic5qiDescriptor {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let present = decode_preamble::<4>(decoder)?;
        if present.iter().any(|p| *p) {
            return Err(PerError::DecodeError(
                "optional NonDynamic5QIDescriptor fields not supported".to_string(),
            ));
        }
        Ok(Self {
            five_qi: decode_small(decoder, &Self::FIVE_QI)?,
        })
    }
}

/// QosCharacteristics ::= CHOICE { nonDynamic5QI, dynamic5QI, choice-Extensions }
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QosCharacteristics {
    NonDynamic5qi(NonDynamic5qiDescriptor),
}

impl QosCharacteristics {
    pub const NUM_ALTERNATIVES: usize = 3;
}

impl AperEncode for QosCharacteristics {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        match self {
            QosCharacteristics::NonDynamic5qi(descriptor) => {
                encoder.encode_choice_index(0, Self::NUM_ALTERNATIVES, false)?;
                descriptor.encode_aper(encoder)
            }
        }
    }
}

impl AperDecode for QosCharacteristics {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        match decoder.decode_choice_index(Self::NUM_ALTERNATIVES, false)? {
            0 => Ok(Self::NonDynamic5qi(NonDynamic5qiDescriptor::decode_aper(decoder)?)),
            index => Err(PerError::DecodeError(format!(
                "QosCharacteristics alternative {index} not supported"
            ))),
        }
    }
}

/// QosFlowLevelQosParameters for non-GBR flows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QosFlowLevelQosParameters {
    pub qos_characteristics: QosCharacteristics,
    pub allocation_and_retention_priority: AllocationAndRetentionPriority,
}

impl AperEncode for QosFlowLevelQosParameters {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        // gBR-QosInformation, reflectiveQosAttribute, additionalQosFlowInformation, iE-Extensions
        encode_preamble(encoder, &[false; 4]);
        self.qos_characteristics.encode_aper(encoder)?;
        self.allocation_and_retention_priority.encode_aper(encoder)
    }
}

impl AperDecode for QosFlowLevelQosParameters {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let present = decode_preamble::<4>(decoder)?;
        if present.iter().any(|p| *p) {
            return Err(PerError::DecodeError(
                "optional QosFlowLevelQosParameters fields not supported".to_string(),
            ));
        }
        Ok(Self {
            qos_characteristics: QosCharacteristics::decode_aper(decoder)?,
            allocation_and_retention_priority: AllocationAndRetentionPriority::decode_aper(
                decoder,
            )?,
        })
    }
}

/// QosFlowIdentifier ::= INTEGER (0..63, ...)
pub const QOS_FLOW_IDENTIFIER: Constraint = Constraint::extensible(0, 63);

/// QosFlowSetupRequestItem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QosFlowSetupRequestItem {
    pub qos_flow_identifier: u8,
    pub qos_flow_level_qos_parameters: QosFlowLevelQosParameters,
}

impl AperEncode for QosFlowSetupRequestItem {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        // e-RAB-ID, iE-Extensions
        encode_preamble(encoder, &[false, false]);
        encoder.encode_integer(self.qos_flow_identifier as i64, &QOS_FLOW_IDENTIFIER)?;
        self.qos_flow_level_qos_parameters.encode_aper(encoder)
    }
}

impl AperDecode for QosFlowSetupRequestItem {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let [e_rab_id, ext] = decode_preamble::<2>(decoder)?;
        reject_ie_extensions(e_rab_id || ext)?;
        Ok(Self {
            qos_flow_identifier: decode_small(decoder, &QOS_FLOW_IDENTIFIER)?,
            qos_flow_level_qos_parameters: QosFlowLevelQosParameters::decode_aper(decoder)?,
        })
    }
}

/// QosFlowAddOrModifyRequestItem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QosFlowAddOrModifyRequestItem {
    pub qos_flow_identifier: u8,
    pub qos_flow_level_qos_parameters: Option<QosFlowLevelQosParameters>,
}

impl AperEncode for QosFlowAddOrModifyRequestItem {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        // qosFlowLevelQosParameters, e-RAB-ID, iE-Extensions
        encode_preamble(
            encoder,
            &[self.qos_flow_level_qos_parameters.is_some(), false, false],
        );
        encoder.encode_integer(self.qos_flow_identifier as i64, &QOS_FLOW_IDENTIFIER)?;
        if let Some(parameters) = &self.qos_flow_level_qos_parameters {
            parameters.encode_aper(encoder)?;
        }
        Ok(())
    }
}

impl AperDecode for QosFlowAddOrModifyRequestItem {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let [parameters, e_rab_id, ext] = decode_preamble::<3>(decoder)?;
        reject_ie_extensions(e_rab_id || ext)?;
        let qos_flow_identifier = decode_small(decoder, &QOS_FLOW_IDENTIFIER)?;
        let qos_flow_level_qos_parameters = if parameters {
            Some(QosFlowLevelQosParameters::decode_aper(decoder)?)
        } else {
            None
        };
        Ok(Self {
            qos_flow_identifier,
            qos_flow_level_qos_parameters,
        })
    }
}

/// SEQUENCE (SIZE(1..maxnoofQosFlows)) OF item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QosFlowList<T>(pub Vec<T>);

pub type QosFlowSetupRequestList = QosFlowList<QosFlowSetupRequestItem>;
pub type QosFlowAddOrModifyRequestList = QosFlowList<QosFlowAddOrModifyRequestItem>;

impl<T> QosFlowList<T> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: AperEncode> AperEncode for QosFlowList<T> {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        encoder.encode_constrained_length(self.0.len(), 1, MAX_QOS_FLOWS)?;
        for item in &self.0 {
            item.encode_aper(encoder)?;
        }
        Ok(())
    }
}

impl<T: AperDecode> AperDecode for QosFlowList<T> {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let count = decoder.decode_constrained_length(1, MAX_QOS_FLOWS)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(T::decode_aper(decoder)?);
        }
        Ok(Self(items))
    }
}

aper_enumerated! {
    pub enum IntegrityProtectionIndication (Constraint::extensible(0, 2)) {
        Required = 0,
        Preferred = 1,
        NotNeeded = 2,
    }
}

aper_enumerated! {
    pub enum ConfidentialityProtectionIndication (Constraint::extensible(0, 2)) {
        Required = 0,
        Preferred = 1,
        NotNeeded = 2,
    }
}

aper_enumerated! {
    pub enum MaximumIntegrityProtectedDataRate (Constraint::extensible(0, 1)) {
        Bitrate64kbs = 0,
        MaximumUeRate = 1,
    }
}

/// SecurityIndication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityIndication {
    pub integrity_protection_indication: IntegrityProtectionIndication,
    pub confidentiality_protection_indication: ConfidentialityProtectionIndication,
    pub maximum_integrity_protected_data_rate_ul: Option<MaximumIntegrityProtectedDataRate>,
}

impl AperEncode for SecurityIndication {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        encode_preamble(
            encoder,
            &[self.maximum_integrity_protected_data_rate_ul.is_some(), false],
        );
        self.integrity_protection_indication.encode_aper(encoder)?;
        self.confidentiality_protection_indication.encode_aper(encoder)?;
        if let Some(rate) = &self.maximum_integrity_protected_data_rate_ul {
            rate.encode_aper(encoder)?;
        }
        Ok(())
    }
}

impl AperDecode for SecurityIndication {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let [rate, ext] = decode_preamble::<2>(decoder)?;
        reject_ie_extensions(ext)?;
        let integrity_protection_indication = IntegrityProtectionIndication::decode_aper(decoder)?;
        let confidentiality_protection_indication =
            ConfidentialityProtectionIndication::decode_aper(decoder)?;
        let maximum_integrity_protected_data_rate_ul = if rate {
            Some(MaximumIntegrityProtectedDataRate::decode_aper(decoder)?)
        } else {
            None
        };
        Ok(Self {
            integrity_protection_indication,
            confidentiality_protection_indication,
            maximum_integrity_protected_data_rate_ul,
        })
    }
}

/// Encodes an optional IE slot, keeping absent slots absent.
fn ie_slot<T: AperEncode>(id: ProtocolIeId, value: Option<&T>) -> PerResult<Option<ProtocolIeField>> {
    value
        .map(|v| ProtocolIeField::new(id, Criticality::Reject, v))
        .transpose()
}

/// Serializes ordered slots as `SEQUENCE { protocolIEs, ... }`.
fn encode_ie_sequence(
    encoder: &mut AperEncoder,
    slots: Vec<Option<ProtocolIeField>>,
) -> PerResult<()> {
    let container = ProtocolIeContainer {
        ies: slots.into_iter().flatten().collect(),
    };
    encoder.write_bit(false);
    container.encode_aper(encoder)
}

fn decode_ie_sequence(decoder: &mut AperDecoder) -> PerResult<ProtocolIeContainer> {
    if decoder.read_bit()? {
        return Err(PerError::UnsupportedExtension);
    }
    ProtocolIeContainer::decode_aper(decoder)
}

fn optional_ie<T: AperDecode>(
    container: &ProtocolIeContainer,
    id: ProtocolIeId,
) -> PerResult<Option<T>> {
    container.find(id).map(|ie| ie.decode_value()).transpose()
}

fn mandatory_ie<T: AperDecode>(container: &ProtocolIeContainer, id: ProtocolIeId) -> PerResult<T> {
    optional_ie(container, id)?
        .ok_or_else(|| PerError::DecodeError(format!("missing mandatory IE {}", id.0)))
}

/// PDUSessionResourceSetupRequestTransfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionResourceSetupRequestTransfer {
    pub pdu_session_aggregate_maximum_bit_rate: Option<PduSessionAggregateMaximumBitRate>,
    pub ul_ngu_up_tnl_information: UpTransportLayerInformation,
    pub pdu_session_type: PduSessionType,
    pub qos_flow_setup_request_list: Option<QosFlowSetupRequestList>,
}

impl AperEncode for PduSessionResourceSetupRequestTransfer {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        let slots = vec![
            ie_slot(
                ProtocolIeId::PDU_SESSION_AGGREGATE_MAXIMUM_BIT_RATE,
                self.pdu_session_aggregate_maximum_bit_rate.as_ref(),
            )?,
            ie_slot(
                ProtocolIeId::UL_NGU_UP_TNL_INFORMATION,
                Some(&self.ul_ngu_up_tnl_information),
            )?,
            ie_slot(ProtocolIeId::PDU_SESSION_TYPE, Some(&self.pdu_session_type))?,
            ie_slot(
                ProtocolIeId::QOS_FLOW_SETUP_REQUEST_LIST,
                self.qos_flow_setup_request_list.as_ref(),
            )?,
        ];
        encode_ie_sequence(encoder, slots)
    }
}

impl AperDecode for PduSessionResourceSetupRequestTransfer {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let ies = decode_ie_sequence(decoder)?;
        Ok(Self {
            pdu_session_aggregate_maximum_bit_rate: optional_ie(
                &ies,
                ProtocolIeId::PDU_SESSION_AGGREGATE_MAXIMUM_BIT_RATE,
            )?,
            ul_ngu_up_tnl_information: mandatory_ie(&ies, ProtocolIeId::UL_NGU_UP_TNL_INFORMATION)?,
            pdu_session_type: mandatory_ie(&ies, ProtocolIeId::PDU_SESSION_TYPE)?,
            qos_flow_setup_request_list: optional_ie(
                &ies,
                ProtocolIeId::QOS_FLOW_SETUP_REQUEST_LIST,
            )?,
        })
    }
}

/// PDUSessionResourceModifyRequestTransfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionResourceModifyRequestTransfer {
    pub pdu_session_aggregate_maximum_bit_rate: Option<PduSessionAggregateMaximumBitRate>,
    pub qos_flow_add_or_modify_request_list: Option<QosFlowAddOrModifyRequestList>,
}

impl AperEncode for PduSessionResourceModifyRequestTransfer {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        let slots = vec![
            ie_slot(
                ProtocolIeId::PDU_SESSION_AGGREGATE_MAXIMUM_BIT_RATE,
                self.pdu_session_aggregate_maximum_bit_rate.as_ref(),
            )?,
            ie_slot(
                ProtocolIeId::QOS_FLOW_ADD_OR_MODIFY_REQUEST_LIST,
                self.qos_flow_add_or_modify_request_list.as_ref(),
            )?,
        ];
        encode_ie_sequence(encoder, slots)
    }
}

impl AperDecode for PduSessionResourceModifyRequestTransfer {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let ies = decode_ie_sequence(decoder)?;
        Ok(Self {
            pdu_session_aggregate_maximum_bit_rate: optional_ie(
                &ies,
                ProtocolIeId::PDU_SESSION_AGGREGATE_MAXIMUM_BIT_RATE,
            )?,
            qos_flow_add_or_modify_request_list: optional_ie(
                &ies,
                ProtocolIeId::QOS_FLOW_ADD_OR_MODIFY_REQUEST_LIST,
            )?,
        })
    }
}

/// SEQUENCE { cause, iE-Extensions OPTIONAL, ... }, shared by the release
/// command and path switch request unsuccessful transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CauseTransfer {
    pub cause: Cause,
}

impl AperEncode for CauseTransfer {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        encode_preamble(encoder, &[false]);
        self.cause.encode_aper(encoder)
    }
}

impl AperDecode for CauseTransfer {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let [ext] = decode_preamble::<1>(decoder)?;
        reject_ie_extensions(ext)?;
        Ok(Self {
            cause: Cause::decode_aper(decoder)?,
        })
    }
}

/// PDUSessionResourceReleaseCommandTransfer
pub type PduSessionResourceReleaseCommandTransfer = CauseTransfer;

/// PathSwitchRequestUnsuccessfulTransfer
pub type PathSwitchRequestUnsuccessfulTransfer = CauseTransfer;

/// PathSwitchRequestAcknowledgeTransfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSwitchRequestAcknowledgeTransfer {
    pub ul_ngu_up_tnl_information: Option<UpTransportLayerInformation>,
    pub security_indication: Option<SecurityIndication>,
}

impl AperEncode for PathSwitchRequestAcknowledgeTransfer {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        encode_preamble(
            encoder,
            &[
                self.ul_ngu_up_tnl_information.is_some(),
                self.security_indication.is_some(),
                false,
            ],
        );
        if let Some(tnl) = &self.ul_ngu_up_tnl_information {
            tnl.encode_aper(encoder)?;
        }
        if let Some(indication) = &self.security_indication {
            indication.encode_aper(encoder)?;
        }
        Ok(())
    }
}

impl AperDecode for PathSwitchRequestAcknowledgeTransfer {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let [tnl, indication, ext] = decode_preamble::<3>(decoder)?;
        reject_ie_extensions(ext)?;
        let ul_ngu_up_tnl_information = if tnl {
            Some(UpTransportLayerInformation::decode_aper(decoder)?)
        } else {
            None
        };
        let security_indication = if indication {
            Some(SecurityIndication::decode_aper(decoder)?)
        } else {
            None
        };
        Ok(Self {
            ul_ngu_up_tnl_information,
            security_indication,
        })
    }
}

/// HandoverCommandTransfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoverCommandTransfer {
    pub dl_forwarding_up_tnl_information: Option<UpTransportLayerInformation>,
}

impl AperEncode for HandoverCommandTransfer {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()> {
        // dLForwardingUP-TNLInformation, qosFlowToBeForwardedList,
        // dataForwardingResponseDRBList, iE-Extensions
        encode_preamble(
            encoder,
            &[self.dl_forwarding_up_tnl_information.is_some(), false, false, false],
        );
        if let Some(tnl) = &self.dl_forwarding_up_tnl_information {
            tnl.encode_aper(encoder)?;
        }
        Ok(())
    }
}

impl AperDecode for HandoverCommandTransfer {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self> {
        let [tnl, forwarded, drb, ext] = decode_preamble::<4>(decoder)?;
        if forwarded || drb {
            return Err(PerError::DecodeError(
                "forwarding lists not supported".to_string(),
            ));
        }
        reject_ie_extensions(ext)?;
        let dl_forwarding_up_tnl_information = if tnl {
            Some(UpTransportLayerInformation::decode_aper(decoder)?)
        } else {
            None
        };
        Ok(Self {
            dl_forwarding_up_tnl_information,
        })
    }
}

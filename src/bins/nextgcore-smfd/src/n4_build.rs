//! SMF N4 (PFCP) Message Building
//!
//! PFCP node-level messages the SMF exchanges with UPFs (3GPP TS 29.244):
//! header codec, IE builder and the heartbeat / association setup messages.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, BytesMut};
use thiserror::Error;

use crate::context::NodeId;

// ============================================================================
// PFCP Message Types
// ============================================================================

/// PFCP message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PfcpMessageType {
    HeartbeatRequest = 1,
    HeartbeatResponse = 2,
    PfdManagementRequest = 3,
    PfdManagementResponse = 4,
    AssociationSetupRequest = 5,
    AssociationSetupResponse = 6,
    AssociationUpdateRequest = 7,
    AssociationUpdateResponse = 8,
    AssociationReleaseRequest = 9,
    AssociationReleaseResponse = 10,
    VersionNotSupportedResponse = 11,
    NodeReportRequest = 12,
    NodeReportResponse = 13,
    SessionSetDeletionRequest = 14,
    SessionSetDeletionResponse = 15,
    SessionEstablishmentRequest = 50,
    SessionEstablishmentResponse = 51,
    SessionModificationRequest = 52,
    SessionModificationResponse = 53,
    SessionDeletionRequest = 54,
    SessionDeletionResponse = 55,
    SessionReportRequest = 56,
    SessionReportResponse = 57,
}

impl PfcpMessageType {
    pub const ALL: &'static [Self] = &[
        Self::HeartbeatRequest,
        Self::HeartbeatResponse,
        Self::PfdManagementRequest,
        Self::PfdManagementResponse,
        Self::AssociationSetupRequest,
        Self::AssociationSetupResponse,
        Self::AssociationUpdateRequest,
        Self::AssociationUpdateResponse,
        Self::AssociationReleaseRequest,
        Self::AssociationReleaseResponse,
        Self::VersionNotSupportedResponse,
        Self::NodeReportRequest,
        Self::NodeReportResponse,
        Self::SessionSetDeletionRequest,
        Self::SessionSetDeletionResponse,
        Self::SessionEstablishmentRequest,
        Self::SessionEstablishmentResponse,
        Self::SessionModificationRequest,
        Self::SessionModificationResponse,
        Self::SessionDeletionRequest,
        Self::SessionDeletionResponse,
        Self::SessionReportRequest,
        Self::SessionReportResponse,
    ];

    /// Metric label of the message type
    pub fn name(&self) -> &'static str {
        match self {
            Self::HeartbeatRequest => "PFCP_HEARTBEAT_REQUEST",
            Self::HeartbeatResponse => "PFCP_HEARTBEAT_RESPONSE",
            Self::PfdManagementRequest => "PFCP_PFD_MANAGEMENT_REQUEST",
            Self::PfdManagementResponse => "PFCP_PFD_MANAGEMENT_RESPONSE",
            Self::AssociationSetupRequest => "PFCP_ASSOCIATION_SETUP_REQUEST",
            Self::AssociationSetupResponse => "PFCP_ASSOCIATION_SETUP_RESPONSE",
            Self::AssociationUpdateRequest => "PFCP_ASSOCIATION_UPDATE_REQUEST",
            Self::AssociationUpdateResponse => "PFCP_ASSOCIATION_UPDATE_RESPONSE",
            Self::AssociationReleaseRequest => "PFCP_ASSOCIATION_RELEASE_REQUEST",
            Self::AssociationReleaseResponse => "PFCP_ASSOCIATION_RELEASE_RESPONSE",
            Self::VersionNotSupportedResponse => "PFCP_VERSION_NOT_SUPPORTED_RESPONSE",
            Self::NodeReportRequest => "PFCP_NODE_REPORT_REQUEST",
            Self::NodeReportResponse => "PFCP_NODE_REPORT_RESPONSE",
            Self::SessionSetDeletionRequest => "PFCP_SESSION_SET_DELETION_REQUEST",
            Self::SessionSetDeletionResponse => "PFCP_SESSION_SET_DELETION_RESPONSE",
            Self::SessionEstablishmentRequest => "PFCP_SESSION_ESTABLISHMENT_REQUEST",
            Self::SessionEstablishmentResponse => "PFCP_SESSION_ESTABLISHMENT_RESPONSE",
            Self::SessionModificationRequest => "PFCP_SESSION_MODIFICATION_REQUEST",
            Self::SessionModificationResponse => "PFCP_SESSION_MODIFICATION_RESPONSE",
            Self::SessionDeletionRequest => "PFCP_SESSION_DELETION_REQUEST",
            Self::SessionDeletionResponse => "PFCP_SESSION_DELETION_RESPONSE",
            Self::SessionReportRequest => "PFCP_SESSION_REPORT_REQUEST",
            Self::SessionReportResponse => "PFCP_SESSION_REPORT_RESPONSE",
        }
    }

    /// Session messages carry a SEID in the header
    pub fn is_session_message(&self) -> bool {
        (*self as u8) >= 50
    }
}

impl TryFrom<u8> for PfcpMessageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| *t as u8 == value)
            .ok_or(value)
    }
}

// ============================================================================
// PFCP Cause Values
// ============================================================================

/// PFCP cause values (3GPP TS 29.244)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PfcpCause {
    RequestAccepted = 1,
    RequestRejected = 64,
    MandatoryIeMissing = 66,
    ConditionalIeMissing = 67,
    InvalidLength = 68,
    MandatoryIeIncorrect = 69,
    NoEstablishedPfcpAssociation = 72,
    PfcpEntityInCongestion = 74,
    NoResourcesAvailable = 75,
    ServiceNotSupported = 76,
    SystemFailure = 77,
}

impl TryFrom<u8> for PfcpCause {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        Ok(match value {
            1 => PfcpCause::RequestAccepted,
            64 => PfcpCause::RequestRejected,
            66 => PfcpCause::MandatoryIeMissing,
            67 => PfcpCause::ConditionalIeMissing,
            68 => PfcpCause::InvalidLength,
            69 => PfcpCause::MandatoryIeIncorrect,
            72 => PfcpCause::NoEstablishedPfcpAssociation,
            74 => PfcpCause::PfcpEntityInCongestion,
            75 => PfcpCause::NoResourcesAvailable,
            76 => PfcpCause::ServiceNotSupported,
            77 => PfcpCause::SystemFailure,
            _ => return Err(value),
        })
    }
}

// ============================================================================
// PFCP IE Types
// ============================================================================

/// PFCP IE types used on node-level messages
pub mod pfcp_ie {
    pub const CAUSE: u16 = 19;
    pub const NODE_ID: u16 = 60;
    pub const RECOVERY_TIME_STAMP: u16 = 96;
}

/// Node ID IE type field
pub mod node_id_type {
    pub const IPV4: u8 = 0;
    pub const IPV6: u8 = 1;
    pub const FQDN: u8 = 2;
}

// ============================================================================
// Header
// ============================================================================

pub const PFCP_VERSION: u8 = 1;
/// Header length of node messages (no SEID)
pub const PFCP_NODE_HEADER_LEN: usize = 8;
/// Header length of session messages
pub const PFCP_SESSION_HEADER_LEN: usize = 16;
/// Sequence numbers are 24 bits
pub const PFCP_MAX_SEQUENCE: u32 = 0x00ff_ffff;

/// Seconds between the NTP epoch (1900) and the Unix epoch
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PfcpParseError {
    #[error("message too short: {0} bytes")]
    TooShort(usize),
    #[error("unsupported PFCP version {0}")]
    UnsupportedVersion(u8),
    #[error("length field {length} does not match {actual} received bytes")]
    LengthMismatch { length: usize, actual: usize },
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),
    #[error("truncated IE {ie_type}")]
    TruncatedIe { ie_type: u16 },
}

/// PFCP Header structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PfcpHeader {
    pub version: u8,
    pub message_type: PfcpMessageType,
    /// Octets following the first four
    pub length: u16,
    pub seid: Option<u64>,
    pub sequence_number: u32,
}

impl PfcpHeader {
    pub fn new(message_type: PfcpMessageType, sequence_number: u32) -> Self {
        Self {
            version: PFCP_VERSION,
            message_type,
            length: 0,
            seid: None,
            sequence_number: sequence_number & PFCP_MAX_SEQUENCE,
        }
    }

    pub fn header_len(&self) -> usize {
        if self.seid.is_some() {
            PFCP_SESSION_HEADER_LEN
        } else {
            PFCP_NODE_HEADER_LEN
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        let mut flags = self.version << 5;
        if self.seid.is_some() {
            flags |= 0x01;
        }
        buf.put_u8(flags);
        buf.put_u8(self.message_type as u8);
        buf.put_u16(self.length);
        if let Some(seid) = self.seid {
            buf.put_u64(seid);
        }
        let seq = self.sequence_number & PFCP_MAX_SEQUENCE;
        buf.put_u8((seq >> 16) as u8);
        buf.put_u8((seq >> 8) as u8);
        buf.put_u8(seq as u8);
        buf.put_u8(0);
    }

    /// Parse the header of a datagram, returning it with the IE payload.
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8]), PfcpParseError> {
        if data.len() < PFCP_NODE_HEADER_LEN {
            return Err(PfcpParseError::TooShort(data.len()));
        }
        let version = data[0] >> 5;
        if version != PFCP_VERSION {
            return Err(PfcpParseError::UnsupportedVersion(version));
        }
        let has_seid = data[0] & 0x01 != 0;
        let message_type =
            PfcpMessageType::try_from(data[1]).map_err(PfcpParseError::UnknownMessageType)?;
        let length = u16::from_be_bytes([data[2], data[3]]);
        let total = length as usize + 4;
        if total > data.len() {
            return Err(PfcpParseError::LengthMismatch {
                length: total,
                actual: data.len(),
            });
        }

        let header_len = if has_seid {
            PFCP_SESSION_HEADER_LEN
        } else {
            PFCP_NODE_HEADER_LEN
        };
        if total < header_len {
            return Err(PfcpParseError::TooShort(total));
        }

        let (seid, seq_at) = if has_seid {
            let mut seid = [0u8; 8];
            seid.copy_from_slice(&data[4..12]);
            (Some(u64::from_be_bytes(seid)), 12)
        } else {
            (None, 4)
        };
        let sequence_number = u32::from_be_bytes([0, data[seq_at], data[seq_at + 1], data[seq_at + 2]]);

        Ok((
            Self {
                version,
                message_type,
                length,
                seid,
                sequence_number,
            },
            &data[header_len..total],
        ))
    }
}

/// Iterate the TLV IEs of a message body.
pub fn parse_ies(mut body: &[u8]) -> Result<Vec<(u16, &[u8])>, PfcpParseError> {
    let mut ies = Vec::new();
    while !body.is_empty() {
        if body.len() < 4 {
            return Err(PfcpParseError::TooShort(body.len()));
        }
        let ie_type = u16::from_be_bytes([body[0], body[1]]);
        let len = u16::from_be_bytes([body[2], body[3]]) as usize;
        let value = body
            .get(4..4 + len)
            .ok_or(PfcpParseError::TruncatedIe { ie_type })?;
        ies.push((ie_type, value));
        body = &body[4 + len..];
    }
    Ok(ies)
}

/// First IE of the given type
pub fn find_ie<'a>(ies: &[(u16, &'a [u8])], ie_type: u16) -> Option<&'a [u8]> {
    ies.iter().find(|(t, _)| *t == ie_type).map(|(_, v)| *v)
}

// ============================================================================
// IE Values
// ============================================================================

/// Node ID IE value
pub fn node_id_value(node_id: &NodeId) -> Vec<u8> {
    let mut value = Vec::new();
    match node_id {
        NodeId::Ipv4(addr) => {
            value.push(node_id_type::IPV4);
            value.extend_from_slice(&addr.octets());
        }
        NodeId::Ipv6(addr) => {
            value.push(node_id_type::IPV6);
            value.extend_from_slice(&addr.octets());
        }
        NodeId::Fqdn(fqdn) => {
            // DNS label encoding
            value.push(node_id_type::FQDN);
            for label in fqdn.split('.').filter(|l| !l.is_empty()) {
                let label = &label.as_bytes()[..label.len().min(63)];
                value.push(label.len() as u8);
                value.extend_from_slice(label);
            }
        }
    }
    value
}

/// Decode a Node ID IE value
pub fn parse_node_id(value: &[u8]) -> Option<NodeId> {
    let (kind, rest) = value.split_first()?;
    match *kind & 0x0f {
        node_id_type::IPV4 => {
            let octets: [u8; 4] = rest.get(..4)?.try_into().ok()?;
            Some(NodeId::Ipv4(octets.into()))
        }
        node_id_type::IPV6 => {
            let octets: [u8; 16] = rest.get(..16)?.try_into().ok()?;
            Some(NodeId::Ipv6(octets.into()))
        }
        node_id_type::FQDN => {
            let mut labels = Vec::new();
            let mut rest = rest;
            while let Some((len, tail)) = rest.split_first() {
                let label = tail.get(..*len as usize)?;
                labels.push(std::str::from_utf8(label).ok()?);
                rest = &tail[*len as usize..];
            }
            Some(NodeId::Fqdn(labels.join(".")))
        }
        _ => None,
    }
}

/// Recovery time stamp for a wall-clock instant (NTP seconds, mod 2^32)
pub fn recovery_time_stamp(at: SystemTime) -> u32 {
    let unix = at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    (unix + NTP_UNIX_OFFSET) as u32
}

// ============================================================================
// Message Builder
// ============================================================================

/// PFCP message builder: header first, IEs appended, length patched last
pub struct PfcpMessageBuilder {
    buffer: BytesMut,
    header_len: usize,
}

impl PfcpMessageBuilder {
    pub fn new(header: PfcpHeader) -> Self {
        let mut buffer = BytesMut::with_capacity(64);
        let header_len = header.header_len();
        header.encode(&mut buffer);
        Self { buffer, header_len }
    }

    /// Add a TLV IE (Type-Length-Value)
    pub fn add_tlv(&mut self, ie_type: u16, value: &[u8]) -> &mut Self {
        self.buffer.put_u16(ie_type);
        self.buffer.put_u16(value.len() as u16);
        self.buffer.put_slice(value);
        self
    }

    pub fn add_u8(&mut self, ie_type: u16, value: u8) -> &mut Self {
        self.add_tlv(ie_type, &[value])
    }

    pub fn add_u32(&mut self, ie_type: u16, value: u32) -> &mut Self {
        self.add_tlv(ie_type, &value.to_be_bytes())
    }

    pub fn add_node_id(&mut self, node_id: &NodeId) -> &mut Self {
        self.add_tlv(pfcp_ie::NODE_ID, &node_id_value(node_id))
    }

    pub fn add_recovery_time_stamp(&mut self, recovery_time_stamp: u32) -> &mut Self {
        self.add_u32(pfcp_ie::RECOVERY_TIME_STAMP, recovery_time_stamp)
    }

    pub fn add_cause(&mut self, cause: PfcpCause) -> &mut Self {
        self.add_u8(pfcp_ie::CAUSE, cause as u8)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.len() <= self.header_len
    }

    /// Patch the length field and return the message bytes
    pub fn build(mut self) -> Vec<u8> {
        let length = (self.buffer.len() - 4) as u16;
        self.buffer[2..4].copy_from_slice(&length.to_be_bytes());
        self.buffer.to_vec()
    }
}

// ============================================================================
// Node Messages
// ============================================================================

pub fn build_heartbeat_request(sequence_number: u32, recovery_time_stamp: u32) -> Vec<u8> {
    let mut builder =
        PfcpMessageBuilder::new(PfcpHeader::new(PfcpMessageType::HeartbeatRequest, sequence_number));
    builder.add_recovery_time_stamp(recovery_time_stamp);
    builder.build()
}

pub fn build_heartbeat_response(sequence_number: u32, recovery_time_stamp: u32) -> Vec<u8> {
    let mut builder =
        PfcpMessageBuilder::new(PfcpHeader::new(PfcpMessageType::HeartbeatResponse, sequence_number));
    builder.add_recovery_time_stamp(recovery_time_stamp);
    builder.build()
}

pub fn build_association_setup_request(
    sequence_number: u32,
    node_id: &NodeId,
    recovery_time_stamp: u32,
) -> Vec<u8> {
    let mut builder = PfcpMessageBuilder::new(PfcpHeader::new(
        PfcpMessageType::AssociationSetupRequest,
        sequence_number,
    ));
    builder
        .add_node_id(node_id)
        .add_recovery_time_stamp(recovery_time_stamp);
    builder.build()
}

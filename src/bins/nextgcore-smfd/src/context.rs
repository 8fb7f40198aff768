//! SMF Context Management
//!
//! User-plane topology as seen by the SMF: the UPF peers reachable over N4,
//! their N3 interfaces, the slices they serve, and per-peer association state.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// PFCP well-known UDP port (TS 29.244)
pub const PFCP_UDP_PORT: u16 = 8805;

// ============================================================================
// Basic Types
// ============================================================================

/// PDU Session Type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PduSessionType {
    #[default]
    Ipv4,
    Ipv6,
    Ipv4v6,
    Unstructured,
    Ethernet,
}

/// S-NSSAI (Single Network Slice Selection Assistance Information)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct SNssai {
    pub sst: u8,
    #[serde(default)]
    pub sd: Option<u32>,
}

impl fmt::Display for SNssai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sd {
            Some(sd) => write!(f, "{}-{:06x}", self.sst, sd),
            None => write!(f, "{}", self.sst),
        }
    }
}

/// DNN served by a UPF within one slice
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DnnUpfInfoItem {
    pub dnn: String,
    #[serde(default)]
    pub dnai_list: Vec<String>,
    #[serde(default)]
    pub pdu_session_types: Vec<PduSessionType>,
}

impl DnnUpfInfoItem {
    /// An empty DNAI only matches an item that lists no DNAI at all.
    pub fn contains_dnai(&self, dnai: &str) -> bool {
        if dnai.is_empty() {
            return self.dnai_list.is_empty();
        }
        self.dnai_list.iter().any(|d| d == dnai)
    }
}

/// Slice served by a UPF together with its DNNs
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SnssaiUpfInfo {
    pub snssai: SNssai,
    #[serde(default)]
    pub dnn_list: Vec<DnnUpfInfoItem>,
}

// ============================================================================
// Node ID
// ============================================================================

/// PFCP Node ID: an IP address or an FQDN
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeId {
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Fqdn(String),
}

impl NodeId {
    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            NodeId::Ipv4(addr) => Some(IpAddr::V4(*addr)),
            NodeId::Ipv6(addr) => Some(IpAddr::V6(*addr)),
            NodeId::Fqdn(_) => None,
        }
    }
}

impl From<IpAddr> for NodeId {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => NodeId::Ipv4(v4),
            IpAddr::V6(v6) => NodeId::Ipv6(v6),
        }
    }
}

impl FromStr for NodeId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<IpAddr>() {
            Ok(addr) => addr.into(),
            Err(_) => NodeId::Fqdn(s.to_string()),
        })
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Ipv4(addr) => write!(f, "{addr}"),
            NodeId::Ipv6(addr) => write!(f, "{addr}"),
            NodeId::Fqdn(fqdn) => f.write_str(fqdn),
        }
    }
}

// ============================================================================
// N3 Interface
// ============================================================================

/// N3 address resolution failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressResolutionError {
    #[error("UPF {0} has no N3 interface")]
    NoN3Interface(String),
    #[error("N3 interface has no address for PDU session type {0:?}")]
    NoMatchingAddress(PduSessionType),
}

/// UPF user-plane interface facing the access network
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct N3Interface {
    pub network_instance: Option<String>,
    pub ipv4_endpoints: Vec<Ipv4Addr>,
    pub ipv6_endpoints: Vec<Ipv6Addr>,
}

impl N3Interface {
    /// Endpoint address for the session type, as raw network-order octets.
    pub fn ip(&self, pdu_session_type: PduSessionType) -> Result<Vec<u8>, AddressResolutionError> {
        let wants_v4 = matches!(pdu_session_type, PduSessionType::Ipv4 | PduSessionType::Ipv4v6);
        let wants_v6 = matches!(pdu_session_type, PduSessionType::Ipv6 | PduSessionType::Ipv4v6);

        if wants_v4 {
            if let Some(addr) = self.ipv4_endpoints.first() {
                return Ok(addr.octets().to_vec());
            }
        }
        if wants_v6 {
            if let Some(addr) = self.ipv6_endpoints.first() {
                return Ok(addr.octets().to_vec());
            }
        }
        Err(AddressResolutionError::NoMatchingAddress(pdu_session_type))
    }
}

// ============================================================================
// UPF Peer
// ============================================================================

/// N4 association status of a UPF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpfStatus {
    #[default]
    NotAssociated,
    Associated,
}

impl UpfStatus {
    pub fn name(&self) -> &'static str {
        match self {
            UpfStatus::NotAssociated => "NOT_ASSOCIATED",
            UpfStatus::Associated => "ASSOCIATED",
        }
    }
}

/// Mutable part of a UPF peer, only touched under the peer's lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpfState {
    pub status: UpfStatus,
    pub heartbeat_miss_count: u32,
}

impl UpfState {
    pub fn is_associated(&self) -> bool {
        self.status == UpfStatus::Associated
    }
}

/// UPF peer known to this SMF
#[derive(Debug)]
pub struct SmfUpf {
    node_id: NodeId,
    pfcp_addr: SocketAddr,
    n3_interfaces: Vec<N3Interface>,
    snssai_infos: Vec<SnssaiUpfInfo>,
    state: Mutex<UpfState>,
}

impl SmfUpf {
    pub fn new(node_id: NodeId, pfcp_addr: SocketAddr) -> Self {
        Self {
            node_id,
            pfcp_addr,
            n3_interfaces: Vec::new(),
            snssai_infos: Vec::new(),
            state: Mutex::new(UpfState::default()),
        }
    }

    pub fn with_n3_interface(mut self, interface: N3Interface) -> Self {
        self.n3_interfaces.push(interface);
        self
    }

    pub fn with_snssai_info(mut self, info: SnssaiUpfInfo) -> Self {
        self.snssai_infos.push(info);
        self
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn pfcp_addr(&self) -> SocketAddr {
        self.pfcp_addr
    }

    pub fn n3_interfaces(&self) -> &[N3Interface] {
        &self.n3_interfaces
    }

    pub fn snssai_infos(&self) -> &[SnssaiUpfInfo] {
        &self.snssai_infos
    }

    /// Acquire the peer lock. The guarded state is a status and a counter
    /// that stay consistent even if a holder panicked.
    pub fn lock(&self) -> MutexGuard<'_, UpfState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> UpfStatus {
        self.lock().status
    }

    pub fn heartbeat_miss_count(&self) -> u32 {
        self.lock().heartbeat_miss_count
    }

    /// Association Setup Response accepted
    pub fn mark_associated(&self) {
        let mut state = self.lock();
        if !state.is_associated() {
            log::info!("[{}] PFCP associated", self.node_id);
        }
        state.status = UpfStatus::Associated;
        state.heartbeat_miss_count = 0;
    }

    /// Heartbeat Response received
    pub fn record_heartbeat_response(&self) {
        let mut state = self.lock();
        state.heartbeat_miss_count = 0;
        log::trace!("[{}] heartbeat response", self.node_id);
    }

    /// Resolve the N3 address of the first interface
    pub fn n3_ip(&self, pdu_session_type: PduSessionType) -> Result<Vec<u8>, AddressResolutionError> {
        self.n3_interfaces
            .first()
            .ok_or_else(|| AddressResolutionError::NoN3Interface(self.node_id.to_string()))?
            .ip(pdu_session_type)
    }

    /// Whether this UPF serves the DNN within the slice
    pub fn serves(&self, snssai: &SNssai, dnn: &str) -> bool {
        self.snssai_infos
            .iter()
            .filter(|info| &info.snssai == snssai)
            .any(|info| info.dnn_list.iter().any(|item| item.dnn == dnn))
    }
}

// ============================================================================
// User Plane Information
// ============================================================================

/// Registry of all UPF peers. Peers are created at topology load time and
/// live for the whole process; each carries its own lock.
#[derive(Debug, Clone, Default)]
pub struct UserPlaneInformation {
    upfs: Vec<Arc<SmfUpf>>,
}

impl UserPlaneInformation {
    pub fn new(upfs: Vec<SmfUpf>) -> Self {
        Self {
            upfs: upfs.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn upfs(&self) -> &[Arc<SmfUpf>] {
        &self.upfs
    }

    pub fn len(&self) -> usize {
        self.upfs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upfs.is_empty()
    }

    pub fn find_by_node_id(&self, node_id: &NodeId) -> Option<Arc<SmfUpf>> {
        self.upfs.iter().find(|upf| upf.node_id() == node_id).cloned()
    }

    /// Match an inbound N4 datagram to its peer by source address
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<Arc<SmfUpf>> {
        self.upfs
            .iter()
            .find(|upf| upf.pfcp_addr() == addr)
            .or_else(|| self.upfs.iter().find(|upf| upf.pfcp_addr().ip() == addr.ip()))
            .cloned()
    }

    /// Associated peers serving the slice and DNN
    pub fn usable_upfs(&self, snssai: &SNssai, dnn: &str) -> Vec<Arc<SmfUpf>> {
        self.upfs
            .iter()
            .filter(|upf| upf.serves(snssai, dnn) && upf.lock().is_associated())
            .cloned()
            .collect()
    }
}

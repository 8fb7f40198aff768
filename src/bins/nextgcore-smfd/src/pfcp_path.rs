//! PFCP Path Management
//!
//! The N4 socket and the dispatch seam used by the heartbeat supervisor and
//! the association prober. Dispatch never waits on the network: a datagram
//! is either handed to the kernel immediately or the attempt fails.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::context::{NodeId, SmfUpf};
use crate::n4_build::{
    build_association_setup_request, build_heartbeat_request, build_heartbeat_response,
    recovery_time_stamp, PFCP_MAX_SEQUENCE,
};

#[derive(Debug, Error)]
pub enum PfcpSendError {
    #[error("N4 socket would block")]
    WouldBlock,
    #[error("peer {0} has no usable PFCP address")]
    Unresolved(String),
    #[error("short send: {sent} of {len} bytes")]
    Truncated { sent: usize, len: usize },
    #[error("N4 send failed: {0}")]
    Io(#[from] io::Error),
}

/// Outbound PFCP node procedures
pub trait PfcpSender: Send + Sync {
    fn send_heartbeat_request(&self, upf: &SmfUpf) -> Result<(), PfcpSendError>;

    fn send_association_setup_request(&self, upf: &SmfUpf) -> Result<(), PfcpSendError>;
}

/// UDP N4 path of this SMF
#[derive(Debug)]
pub struct PfcpPath {
    socket: Arc<UdpSocket>,
    node_id: NodeId,
    recovery_time_stamp: u32,
    sequence: AtomicU32,
}

impl PfcpPath {
    /// Open the N4 socket; the recovery time stamp is taken now.
    pub async fn bind(addr: SocketAddr, node_id: NodeId) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        log::info!("pfcp_server() [{}]", socket.local_addr()?);
        Ok(Self::from_socket(Arc::new(socket), node_id))
    }

    pub fn from_socket(socket: Arc<UdpSocket>, node_id: NodeId) -> Self {
        Self {
            socket,
            node_id,
            recovery_time_stamp: recovery_time_stamp(SystemTime::now()),
            sequence: AtomicU32::new(1),
        }
    }

    pub fn socket(&self) -> Arc<UdpSocket> {
        self.socket.clone()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn recovery_time_stamp(&self) -> u32 {
        self.recovery_time_stamp
    }

    /// Next 24-bit sequence number
    pub fn next_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::Relaxed) & PFCP_MAX_SEQUENCE
    }

    pub fn send_to(&self, addr: SocketAddr, data: &[u8]) -> Result<(), PfcpSendError> {
        if addr.ip().is_unspecified() || addr.port() == 0 {
            return Err(PfcpSendError::Unresolved(addr.to_string()));
        }
        match self.socket.try_send_to(data, addr) {
            Ok(sent) if sent == data.len() => Ok(()),
            Ok(sent) => Err(PfcpSendError::Truncated {
                sent,
                len: data.len(),
            }),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(PfcpSendError::WouldBlock),
            Err(e) => Err(PfcpSendError::Io(e)),
        }
    }

    /// Answer a Heartbeat Request received from a peer
    pub fn send_heartbeat_response(
        &self,
        addr: SocketAddr,
        sequence_number: u32,
    ) -> Result<(), PfcpSendError> {
        let msg = build_heartbeat_response(sequence_number, self.recovery_time_stamp);
        self.send_to(addr, &msg)
    }
}

impl PfcpSender for PfcpPath {
    fn send_heartbeat_request(&self, upf: &SmfUpf) -> Result<(), PfcpSendError> {
        let seq = self.next_sequence();
        let msg = build_heartbeat_request(seq, self.recovery_time_stamp);
        log::trace!("[{}] Heartbeat Request seq={}", upf.node_id(), seq);
        self.send_to(upf.pfcp_addr(), &msg)
    }

    fn send_association_setup_request(&self, upf: &SmfUpf) -> Result<(), PfcpSendError> {
        let seq = self.next_sequence();
        let msg = build_association_setup_request(seq, &self.node_id, self.recovery_time_stamp);
        log::debug!("[{}] Association Setup Request seq={}", upf.node_id(), seq);
        self.send_to(upf.pfcp_addr(), &msg)
    }
}

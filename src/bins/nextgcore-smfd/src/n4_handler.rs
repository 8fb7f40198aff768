//! N4 (PFCP) Message Handler
//!
//! Inbound node-level PFCP messages from UPFs, applied to the peer registry.
//! Response correlation is by peer: a setup response associates its sender
//! and any heartbeat response clears the sender's miss counter.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;

use crate::context::{SmfUpf, UserPlaneInformation};
use crate::metrics::{Direction, N4MsgStats};
use crate::n4_build::{
    build_heartbeat_response, find_ie, parse_ies, parse_node_id, pfcp_ie, PfcpCause, PfcpHeader,
    PfcpMessageType, PfcpParseError,
};
use crate::pfcp_path::PfcpPath;

/// Largest datagram accepted on N4
const MAX_PFCP_DATAGRAM: usize = 8192;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum N4HandleError {
    #[error(transparent)]
    Parse(#[from] PfcpParseError),
    #[error("message from unknown peer {0}")]
    UnknownPeer(SocketAddr),
    #[error("{0:?} without Cause IE")]
    MissingCause(PfcpMessageType),
}

/// What an inbound message did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum N4Outcome {
    Associated,
    AssociationRejected(u8),
    HeartbeatAcknowledged,
    /// Heartbeat Request answered with the encoded response
    Reply(Vec<u8>),
    Ignored(PfcpMessageType),
}

pub struct N4Handler {
    registry: UserPlaneInformation,
    stats: Arc<N4MsgStats>,
    smf_id: String,
    recovery_time_stamp: u32,
}

impl N4Handler {
    pub fn new(
        registry: UserPlaneInformation,
        stats: Arc<N4MsgStats>,
        smf_id: impl Into<String>,
        recovery_time_stamp: u32,
    ) -> Self {
        Self {
            registry,
            stats,
            smf_id: smf_id.into(),
            recovery_time_stamp,
        }
    }

    fn find_peer(&self, from: SocketAddr, ies: &[(u16, &[u8])]) -> Option<Arc<SmfUpf>> {
        self.registry.find_by_addr(from).or_else(|| {
            find_ie(ies, pfcp_ie::NODE_ID)
                .and_then(parse_node_id)
                .and_then(|node_id| self.registry.find_by_node_id(&node_id))
        })
    }

    /// Apply one datagram received from `from`.
    pub fn handle(&self, from: SocketAddr, data: &[u8]) -> Result<N4Outcome, N4HandleError> {
        let (header, body) = PfcpHeader::parse(data)?;
        let ies = parse_ies(body)?;
        self.stats
            .increment(&self.smf_id, header.message_type, Direction::In, "", "");

        match header.message_type {
            PfcpMessageType::AssociationSetupResponse => {
                let upf = self
                    .find_peer(from, &ies)
                    .ok_or(N4HandleError::UnknownPeer(from))?;
                let cause = find_ie(&ies, pfcp_ie::CAUSE)
                    .and_then(|v| v.first().copied())
                    .ok_or(N4HandleError::MissingCause(header.message_type))?;

                if PfcpCause::try_from(cause) == Ok(PfcpCause::RequestAccepted) {
                    upf.mark_associated();
                    Ok(N4Outcome::Associated)
                } else {
                    log::warn!(
                        "[{}] Association Setup rejected, cause {} ({:?})",
                        upf.node_id(),
                        cause,
                        PfcpCause::try_from(cause).ok()
                    );
                    Ok(N4Outcome::AssociationRejected(cause))
                }
            }
            PfcpMessageType::HeartbeatResponse => {
                let upf = self
                    .find_peer(from, &ies)
                    .ok_or(N4HandleError::UnknownPeer(from))?;
                upf.record_heartbeat_response();
                Ok(N4Outcome::HeartbeatAcknowledged)
            }
            PfcpMessageType::HeartbeatRequest => {
                log::trace!("Heartbeat Request from {} seq={}", from, header.sequence_number);
                Ok(N4Outcome::Reply(build_heartbeat_response(
                    header.sequence_number,
                    self.recovery_time_stamp,
                )))
            }
            other => {
                log::debug!("Ignoring {} from {}", other.name(), from);
                Ok(N4Outcome::Ignored(other))
            }
        }
    }

    /// Receive loop of the N4 socket.
    pub async fn run(self, path: Arc<PfcpPath>) {
        let socket = path.socket();
        let mut buf = vec![0u8; MAX_PFCP_DATAGRAM];

        loop {
            let (len, from) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    log::error!("N4 recv failed: {}", e);
                    continue;
                }
            };

            match self.handle(from, &buf[..len]) {
                Ok(N4Outcome::Reply(reply)) => {
                    if let Err(e) = path.send_to(from, &reply) {
                        log::error!("Heartbeat Response to {} failed: {}", from, e);
                    }
                }
                Ok(_) => {}
                Err(e) => log::warn!("Dropped N4 message from {}: {}", from, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::UpfStatus;
    use crate::n4_build::{PfcpHeader, PfcpMessageBuilder};

    const UPF_ADDR: &str = "10.0.0.1:8805";

    fn handler() -> (N4Handler, Arc<SmfUpf>, Arc<N4MsgStats>) {
        let registry = UserPlaneInformation::new(vec![SmfUpf::new(
            "10.0.0.1".parse().unwrap(),
            UPF_ADDR.parse().unwrap(),
        )]);
        let upf = registry.upfs()[0].clone();
        let stats = Arc::new(N4MsgStats::new());
        (N4Handler::new(registry, stats.clone(), "smf", 42), upf, stats)
    }

    fn setup_response(cause: PfcpCause) -> Vec<u8> {
        let mut builder = PfcpMessageBuilder::new(PfcpHeader::new(
            PfcpMessageType::AssociationSetupResponse,
            1,
        ));
        builder
            .add_node_id(&"10.0.0.1".parse().unwrap())
            .add_cause(cause)
            .add_recovery_time_stamp(7);
        builder.build()
    }

    #[test]
    fn test_setup_response_accepted() {
        let (handler, upf, stats) = handler();
        upf.lock().heartbeat_miss_count = 3;

        let outcome = handler
            .handle(UPF_ADDR.parse().unwrap(), &setup_response(PfcpCause::RequestAccepted))
            .unwrap();
        assert_eq!(outcome, N4Outcome::Associated);
        assert_eq!(upf.status(), UpfStatus::Associated);
        assert_eq!(upf.heartbeat_miss_count(), 0);
        assert_eq!(
            stats.total(PfcpMessageType::AssociationSetupResponse, Direction::In),
            1
        );
    }

    #[test]
    fn test_setup_response_rejected() {
        let (handler, upf, _) = handler();
        let outcome = handler
            .handle(UPF_ADDR.parse().unwrap(), &setup_response(PfcpCause::RequestRejected))
            .unwrap();
        assert_eq!(outcome, N4Outcome::AssociationRejected(64));
        assert_eq!(upf.status(), UpfStatus::NotAssociated);
    }

    #[test]
    fn test_setup_response_matched_by_node_id() {
        let (handler, upf, _) = handler();
        handler
            .handle("10.9.9.9:8805".parse().unwrap(), &setup_response(PfcpCause::RequestAccepted))
            .unwrap();
        assert_eq!(upf.status(), UpfStatus::Associated);
    }

    #[test]
    fn test_setup_response_without_cause() {
        let (handler, _, _) = handler();
        let msg = PfcpMessageBuilder::new(PfcpHeader::new(
            PfcpMessageType::AssociationSetupResponse,
            1,
        ))
        .build();
        assert_eq!(
            handler.handle(UPF_ADDR.parse().unwrap(), &msg),
            Err(N4HandleError::MissingCause(PfcpMessageType::AssociationSetupResponse))
        );
    }

    #[test]
    fn test_heartbeat_response_resets_counter() {
        let (handler, upf, _) = handler();
        upf.mark_associated();
        upf.lock().heartbeat_miss_count = 2;

        let msg = build_heartbeat_response(5, 7);
        assert_eq!(
            handler.handle(UPF_ADDR.parse().unwrap(), &msg),
            Ok(N4Outcome::HeartbeatAcknowledged)
        );
        assert_eq!(upf.heartbeat_miss_count(), 0);

        assert_eq!(
            handler.handle("10.0.0.2:8805".parse().unwrap(), &msg),
            Err(N4HandleError::UnknownPeer("10.0.0.2:8805".parse().unwrap()))
        );
    }

    #[test]
    fn test_heartbeat_request_is_answered() {
        let (handler, _, _) = handler();
        let request = crate::n4_build::build_heartbeat_request(0x77, 7);
        let Ok(N4Outcome::Reply(reply)) = handler.handle(UPF_ADDR.parse().unwrap(), &request) else {
            panic!("heartbeat request not answered");
        };
        let (header, body) = PfcpHeader::parse(&reply).unwrap();
        assert_eq!(header.message_type, PfcpMessageType::HeartbeatResponse);
        assert_eq!(header.sequence_number, 0x77);
        let ies = parse_ies(body).unwrap();
        assert_eq!(
            find_ie(&ies, pfcp_ie::RECOVERY_TIME_STAMP),
            Some(&42u32.to_be_bytes()[..])
        );
    }

    #[test]
    fn test_other_messages_ignored() {
        let (handler, _, _) = handler();
        let msg = PfcpMessageBuilder::new(PfcpHeader::new(PfcpMessageType::NodeReportRequest, 3))
            .build();
        assert_eq!(
            handler.handle(UPF_ADDR.parse().unwrap(), &msg),
            Ok(N4Outcome::Ignored(PfcpMessageType::NodeReportRequest))
        );
        assert!(matches!(
            handler.handle(UPF_ADDR.parse().unwrap(), &[0x20]),
            Err(N4HandleError::Parse(PfcpParseError::TooShort(1)))
        ));
    }
}

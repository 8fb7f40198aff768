//! NGAP Transfer Building
//!
//! N2 SM information: the PDU session resource transfers the SMF hands to
//! the AMF for setup, modify, release, path switch and handover procedures.
//! Every builder either returns the complete APER encoding or an error.

use ogs_asn1c::ngap::{
    Cause, CauseLookupError, CauseNas, CauseTransfer, ConfidentialityProtectionIndication,
    GtpTunnel, HandoverCommandTransfer, IntegrityProtectionIndication,
    MaximumIntegrityProtectedDataRate, PathSwitchRequestAcknowledgeTransfer,
    PduSessionAggregateMaximumBitRate, PduSessionResourceModifyRequestTransfer,
    PduSessionResourceSetupRequestTransfer, PduSessionType as NgapPduSessionType, QosFlowList,
    SecurityIndication, UpTransportLayerInformation,
};
use ogs_asn1c::{encode_to_bytes, AperEncode, PerError};
use thiserror::Error;

use crate::context::{AddressResolutionError, PduSessionType};
use crate::qos;
use crate::sm_context::{bit_rate_to_bps, BitRateError, SmContext};

// ============================================================================
// Constants
// ============================================================================

/// NGAP cause groups (Cause CHOICE index)
pub mod cause_group {
    pub const RADIO_NETWORK: u8 = 0;
    pub const TRANSPORT: u8 = 1;
    pub const NAS: u8 = 2;
    pub const PROTOCOL: u8 = 3;
    pub const MISC: u8 = 4;
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NgapBuildError {
    #[error("session AMBR is not authorized")]
    MissingSessionAmbr,
    #[error("default QoS is not authorized")]
    MissingDefaultQos,
    #[error("no default data path")]
    MissingDataPath,
    #[error("default data path has no uplink tunnel")]
    MissingUplinkTunnel,
    #[error(transparent)]
    AddressResolution(#[from] AddressResolutionError),
    #[error(transparent)]
    InvalidBitRate(#[from] BitRateError),
    #[error("unknown cause group {0}")]
    UnknownCauseCategory(u8),
    #[error("cause value {value} is not defined in cause group {group}")]
    InvalidCauseValue { group: u8, value: u8 },
    #[error("encode failed: {0}")]
    Codec(#[from] PerError),
}

impl From<CauseLookupError> for NgapBuildError {
    fn from(err: CauseLookupError) -> Self {
        match err {
            CauseLookupError::UnknownCategory(group) => NgapBuildError::UnknownCauseCategory(group),
            CauseLookupError::InvalidValue { category, value } => NgapBuildError::InvalidCauseValue {
                group: category as u8,
                value,
            },
        }
    }
}

pub type NgapBuildResult<T> = Result<T, NgapBuildError>;

// ============================================================================
// Common IEs
// ============================================================================

fn ngap_pdu_session_type(pdu_session_type: PduSessionType) -> NgapPduSessionType {
    match pdu_session_type {
        PduSessionType::Ipv4 => NgapPduSessionType::Ipv4,
        PduSessionType::Ipv6 => NgapPduSessionType::Ipv6,
        PduSessionType::Ipv4v6 => NgapPduSessionType::Ipv4v6,
        PduSessionType::Ethernet => NgapPduSessionType::Ethernet,
        PduSessionType::Unstructured => NgapPduSessionType::Unstructured,
    }
}

fn session_ambr(ctx: &SmContext) -> NgapBuildResult<PduSessionAggregateMaximumBitRate> {
    let ambr = ctx.session_ambr().ok_or(NgapBuildError::MissingSessionAmbr)?;
    Ok(PduSessionAggregateMaximumBitRate {
        downlink: bit_rate_to_bps(&ambr.downlink)?,
        uplink: bit_rate_to_bps(&ambr.uplink)?,
    })
}

/// GTP tunnel towards the UPF terminating N3 on the default path
fn an_upf_tunnel(ctx: &SmContext) -> NgapBuildResult<UpTransportLayerInformation> {
    let node = ctx
        .default_data_path
        .as_ref()
        .ok_or(NgapBuildError::MissingDataPath)?;
    let tunnel = node.ul_tunnel.ok_or(NgapBuildError::MissingUplinkTunnel)?;
    let n3_ip = node.upf.n3_ip(ctx.selected_pdu_session_type)?;

    Ok(UpTransportLayerInformation::GtpTunnel(GtpTunnel::new(
        n3_ip,
        tunnel.teid,
    )))
}

/// Security indication; a maximum UL integrity protected data rate is
/// present whenever integrity protection is required or preferred.
pub fn security_indication(
    integrity: IntegrityProtectionIndication,
    confidentiality: ConfidentialityProtectionIndication,
) -> SecurityIndication {
    let maximum_integrity_protected_data_rate_ul = match integrity {
        IntegrityProtectionIndication::Required | IntegrityProtectionIndication::Preferred => {
            Some(MaximumIntegrityProtectedDataRate::Bitrate64kbs)
        }
        IntegrityProtectionIndication::NotNeeded => None,
    };

    SecurityIndication {
        integrity_protection_indication: integrity,
        confidentiality_protection_indication: confidentiality,
        maximum_integrity_protected_data_rate_ul,
    }
}

fn encode<T: AperEncode>(ctx_ref: &str, name: &str, transfer: &T) -> NgapBuildResult<Vec<u8>> {
    encode_to_bytes(transfer).map(|bytes| bytes.to_vec()).map_err(|e| {
        log::error!("[{}] {} encode failed: {}", ctx_ref, name, e);
        NgapBuildError::Codec(e)
    })
}

fn log_failure<T>(ctx_ref: &str, name: &str, result: NgapBuildResult<T>) -> NgapBuildResult<T> {
    if let Err(e) = &result {
        log::error!("[{}] Cannot build {}: {}", ctx_ref, name, e);
    }
    result
}

// ============================================================================
// PDU Session Resource Setup
// ============================================================================

pub fn pdu_session_resource_setup_request_transfer(
    ctx: &SmContext,
) -> NgapBuildResult<PduSessionResourceSetupRequestTransfer> {
    let ambr = session_ambr(ctx)?;
    let ul_tunnel = an_upf_tunnel(ctx)?;

    let flows: Vec<_> = ctx
        .qos_flows_to_setup()
        .values()
        .map(qos::qos_flow_setup_request_item)
        .collect();

    Ok(PduSessionResourceSetupRequestTransfer {
        pdu_session_aggregate_maximum_bit_rate: Some(ambr),
        ul_ngu_up_tnl_information: ul_tunnel,
        pdu_session_type: ngap_pdu_session_type(ctx.selected_pdu_session_type),
        qos_flow_setup_request_list: (!flows.is_empty()).then(|| QosFlowList(flows)),
    })
}

pub fn build_pdu_session_resource_setup_request_transfer(ctx: &SmContext) -> NgapBuildResult<Vec<u8>> {
    const NAME: &str = "PDUSessionResourceSetupRequestTransfer";
    let transfer = log_failure(
        &ctx.sm_context_ref,
        NAME,
        pdu_session_resource_setup_request_transfer(ctx),
    )?;
    encode(&ctx.sm_context_ref, NAME, &transfer)
}

// ============================================================================
// PDU Session Resource Modify
// ============================================================================

pub fn pdu_session_resource_modify_request_transfer(
    ctx: &SmContext,
) -> NgapBuildResult<PduSessionResourceModifyRequestTransfer> {
    let ambr = session_ambr(ctx)?;
    let default_qos = ctx.default_qos().ok_or(NgapBuildError::MissingDefaultQos)?;

    // The default flow is identified by its 5QI
    let item = qos::qos_flow_add_or_modify_request_item(
        default_qos.var_5qi,
        default_qos.var_5qi,
        &default_qos.arp,
    );

    Ok(PduSessionResourceModifyRequestTransfer {
        pdu_session_aggregate_maximum_bit_rate: Some(ambr),
        qos_flow_add_or_modify_request_list: Some(QosFlowList(vec![item])),
    })
}

pub fn build_pdu_session_resource_modify_request_transfer(ctx: &SmContext) -> NgapBuildResult<Vec<u8>> {
    const NAME: &str = "PDUSessionResourceModifyRequestTransfer";
    let transfer = log_failure(
        &ctx.sm_context_ref,
        NAME,
        pdu_session_resource_modify_request_transfer(ctx),
    )?;
    encode(&ctx.sm_context_ref, NAME, &transfer)
}

// ============================================================================
// PDU Session Resource Release
// ============================================================================

pub fn build_pdu_session_resource_release_command_transfer(ctx: &SmContext) -> NgapBuildResult<Vec<u8>> {
    let transfer = CauseTransfer {
        cause: Cause::Nas(CauseNas::NormalRelease),
    };
    encode(&ctx.sm_context_ref, "PDUSessionResourceReleaseCommandTransfer", &transfer)
}

// ============================================================================
// Path Switch
// ============================================================================

pub fn path_switch_request_acknowledge_transfer(
    ctx: &SmContext,
) -> NgapBuildResult<PathSwitchRequestAcknowledgeTransfer> {
    let ul_tunnel = an_upf_tunnel(ctx)?;

    Ok(PathSwitchRequestAcknowledgeTransfer {
        ul_ngu_up_tnl_information: Some(ul_tunnel),
        security_indication: Some(security_indication(
            IntegrityProtectionIndication::NotNeeded,
            ConfidentialityProtectionIndication::NotNeeded,
        )),
    })
}

pub fn build_path_switch_request_acknowledge_transfer(ctx: &SmContext) -> NgapBuildResult<Vec<u8>> {
    const NAME: &str = "PathSwitchRequestAcknowledgeTransfer";
    let transfer = log_failure(
        &ctx.sm_context_ref,
        NAME,
        path_switch_request_acknowledge_transfer(ctx),
    )?;
    encode(&ctx.sm_context_ref, NAME, &transfer)
}

/// `cause_group` is one of [`cause_group`]; the value is interpreted within it.
pub fn build_path_switch_request_unsuccessful_transfer(
    cause_group: u8,
    cause_value: u8,
) -> NgapBuildResult<Vec<u8>> {
    let cause = Cause::from_parts(cause_group, cause_value).map_err(|e| {
        let e = NgapBuildError::from(e);
        log::error!("Cannot build PathSwitchRequestUnsuccessfulTransfer: {}", e);
        e
    })?;
    encode("-", "PathSwitchRequestUnsuccessfulTransfer", &CauseTransfer { cause })
}

// ============================================================================
// Handover
// ============================================================================

pub fn handover_command_transfer(ctx: &SmContext) -> NgapBuildResult<HandoverCommandTransfer> {
    Ok(HandoverCommandTransfer {
        dl_forwarding_up_tnl_information: Some(an_upf_tunnel(ctx)?),
    })
}

pub fn build_handover_command_transfer(ctx: &SmContext) -> NgapBuildResult<Vec<u8>> {
    const NAME: &str = "HandoverCommandTransfer";
    let transfer = log_failure(&ctx.sm_context_ref, NAME, handover_command_transfer(ctx))?;
    encode(&ctx.sm_context_ref, NAME, &transfer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{N3Interface, SmfUpf};
    use crate::sm_context::{
        Ambr, Arp, AuthorizedDefaultQos, DataPathNode, PreemptionCapability,
        PreemptionVulnerability, QosData, QosDataMap, QosFlowUpdate, SessionRule, SmPolicyUpdate,
        UpTunnel,
    };
    use ogs_asn1c::decode_from_bytes;
    use ogs_asn1c::ngap::{CauseCategory, CauseTransport, PduSessionResourceReleaseCommandTransfer};
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    fn arp() -> Arp {
        Arp::new(
            8,
            PreemptionCapability::NotPreempt,
            PreemptionVulnerability::Preemptable,
        )
    }

    fn upf() -> Arc<SmfUpf> {
        Arc::new(
            SmfUpf::new("10.0.0.1".parse().unwrap(), "10.0.0.1:8805".parse().unwrap())
                .with_n3_interface(N3Interface {
                    network_instance: None,
                    ipv4_endpoints: vec![Ipv4Addr::new(10, 200, 200, 101)],
                    ipv6_endpoints: Vec::new(),
                }),
        )
    }

    fn sm_context() -> SmContext {
        let mut ctx = SmContext::new("imsi-001010000000001-5");
        ctx.session_rule = Some(SessionRule {
            auth_sess_ambr: Some(Ambr::new("100 Mbps", "1 Gbps")),
            auth_def_qos: Some(AuthorizedDefaultQos { var_5qi: 9, arp: arp() }),
        });
        ctx.qos_data.insert("1".into(), QosData::new("1", 9, arp()));
        ctx.qos_data.insert("2".into(), QosData::new("2", 7, arp()));
        ctx.default_data_path = Some(DataPathNode {
            upf: upf(),
            ul_tunnel: Some(UpTunnel { teid: 0x0102_0304 }),
        });
        ctx
    }

    #[test]
    fn test_setup_request_transfer() {
        let ctx = sm_context();
        let bytes = build_pdu_session_resource_setup_request_transfer(&ctx).unwrap();
        let decoded: PduSessionResourceSetupRequestTransfer = decode_from_bytes(&bytes).unwrap();

        assert_eq!(
            decoded.pdu_session_aggregate_maximum_bit_rate,
            Some(PduSessionAggregateMaximumBitRate {
                downlink: 1_000_000_000,
                uplink: 100_000_000,
            })
        );
        let UpTransportLayerInformation::GtpTunnel(tunnel) = decoded.ul_ngu_up_tnl_information;
        assert_eq!(tunnel.transport_layer_address, vec![10, 200, 200, 101]);
        assert_eq!(tunnel.gtp_teid, [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(decoded.pdu_session_type, NgapPduSessionType::Ipv4);

        let flows = decoded.qos_flow_setup_request_list.unwrap();
        assert_eq!(
            flows.0.iter().map(|f| f.qos_flow_identifier).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_setup_request_transfer_is_deterministic() {
        let ctx = sm_context();
        assert_eq!(
            build_pdu_session_resource_setup_request_transfer(&ctx).unwrap(),
            build_pdu_session_resource_setup_request_transfer(&ctx).unwrap()
        );
    }

    #[test]
    fn test_setup_request_transfer_policy_update_replaces_flows() {
        let mut ctx = sm_context();
        let added: QosDataMap = [("5".to_string(), QosData::new("5", 5, arp()))].into();
        ctx.sm_policy_updates.push(SmPolicyUpdate {
            qos_flow_update: Some(QosFlowUpdate { add: Some(added) }),
        });

        let transfer = pdu_session_resource_setup_request_transfer(&ctx).unwrap();
        let flows = transfer.qos_flow_setup_request_list.unwrap();
        assert_eq!(flows.len(), 1);
        assert_eq!(flows.0[0].qos_flow_identifier, 5);
    }

    #[test]
    fn test_setup_request_transfer_without_flows() {
        let mut ctx = sm_context();
        ctx.qos_data.clear();
        let bytes = build_pdu_session_resource_setup_request_transfer(&ctx).unwrap();
        let decoded: PduSessionResourceSetupRequestTransfer = decode_from_bytes(&bytes).unwrap();
        assert!(decoded.qos_flow_setup_request_list.is_none());
    }

    #[test]
    fn test_setup_request_transfer_preconditions() {
        let mut ctx = sm_context();
        ctx.default_data_path = None;
        ctx.session_rule = None;
        assert_eq!(
            build_pdu_session_resource_setup_request_transfer(&ctx),
            Err(NgapBuildError::MissingSessionAmbr)
        );

        let ctx_no_path = SmContext {
            default_data_path: None,
            ..sm_context()
        };
        assert_eq!(
            build_pdu_session_resource_setup_request_transfer(&ctx_no_path),
            Err(NgapBuildError::MissingDataPath)
        );

        let mut ctx_no_tunnel = sm_context();
        if let Some(node) = ctx_no_tunnel.default_data_path.as_mut() {
            node.ul_tunnel = None;
        }
        assert_eq!(
            build_pdu_session_resource_setup_request_transfer(&ctx_no_tunnel),
            Err(NgapBuildError::MissingUplinkTunnel)
        );

        let ctx_v6 = SmContext {
            selected_pdu_session_type: PduSessionType::Ipv6,
            ..sm_context()
        };
        assert_eq!(
            build_pdu_session_resource_setup_request_transfer(&ctx_v6),
            Err(NgapBuildError::AddressResolution(
                AddressResolutionError::NoMatchingAddress(PduSessionType::Ipv6)
            ))
        );

        let mut ctx_bad_rate = sm_context();
        ctx_bad_rate.session_rule = Some(SessionRule {
            auth_sess_ambr: Some(Ambr::new("lots", "1 Gbps")),
            auth_def_qos: None,
        });
        assert!(matches!(
            build_pdu_session_resource_setup_request_transfer(&ctx_bad_rate),
            Err(NgapBuildError::InvalidBitRate(_))
        ));
    }

    #[test]
    fn test_modify_request_transfer() {
        let ctx = sm_context();
        let bytes = build_pdu_session_resource_modify_request_transfer(&ctx).unwrap();
        let decoded: PduSessionResourceModifyRequestTransfer = decode_from_bytes(&bytes).unwrap();

        let list = decoded.qos_flow_add_or_modify_request_list.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.0[0].qos_flow_identifier, 9);
        let params = list.0[0].qos_flow_level_qos_parameters.unwrap();
        assert_eq!(params.allocation_and_retention_priority.priority_level_arp, 8);
    }

    #[test]
    fn test_modify_request_transfer_preconditions() {
        let mut ctx = sm_context();
        ctx.session_rule = Some(SessionRule::default());
        assert_eq!(
            build_pdu_session_resource_modify_request_transfer(&ctx),
            Err(NgapBuildError::MissingSessionAmbr)
        );

        ctx.session_rule = Some(SessionRule {
            auth_sess_ambr: Some(Ambr::new("1 Mbps", "1 Mbps")),
            auth_def_qos: None,
        });
        assert_eq!(
            build_pdu_session_resource_modify_request_transfer(&ctx),
            Err(NgapBuildError::MissingDefaultQos)
        );

        ctx.session_rule = Some(SessionRule {
            auth_sess_ambr: Some(Ambr::new("1 Mbps", "1 Mbps")),
            auth_def_qos: Some(AuthorizedDefaultQos { var_5qi: 80, arp: arp() }),
        });
        assert!(matches!(
            build_pdu_session_resource_modify_request_transfer(&ctx),
            Err(NgapBuildError::Codec(_))
        ));
    }

    #[test]
    fn test_release_command_transfer() {
        let bytes = build_pdu_session_resource_release_command_transfer(&sm_context()).unwrap();
        let decoded: PduSessionResourceReleaseCommandTransfer = decode_from_bytes(&bytes).unwrap();
        assert_eq!(decoded.cause, Cause::Nas(CauseNas::NormalRelease));
    }

    #[test]
    fn test_path_switch_request_acknowledge_transfer() {
        let bytes = build_path_switch_request_acknowledge_transfer(&sm_context()).unwrap();
        let decoded: PathSwitchRequestAcknowledgeTransfer = decode_from_bytes(&bytes).unwrap();
        assert!(decoded.ul_ngu_up_tnl_information.is_some());

        let indication = decoded.security_indication.unwrap();
        assert_eq!(
            indication.integrity_protection_indication,
            IntegrityProtectionIndication::NotNeeded
        );
        assert_eq!(
            indication.confidentiality_protection_indication,
            ConfidentialityProtectionIndication::NotNeeded
        );
        assert!(indication.maximum_integrity_protected_data_rate_ul.is_none());
    }

    #[test]
    fn test_security_indication_rate_follows_integrity() {
        for integrity in [
            IntegrityProtectionIndication::Required,
            IntegrityProtectionIndication::Preferred,
        ] {
            let indication =
                security_indication(integrity, ConfidentialityProtectionIndication::NotNeeded);
            assert_eq!(
                indication.maximum_integrity_protected_data_rate_ul,
                Some(MaximumIntegrityProtectedDataRate::Bitrate64kbs)
            );
        }
        let indication = security_indication(
            IntegrityProtectionIndication::NotNeeded,
            ConfidentialityProtectionIndication::Required,
        );
        assert!(indication.maximum_integrity_protected_data_rate_ul.is_none());
    }

    #[test]
    fn test_path_switch_request_unsuccessful_transfer() {
        let bytes = build_path_switch_request_unsuccessful_transfer(cause_group::TRANSPORT, 0).unwrap();
        let decoded: CauseTransfer = decode_from_bytes(&bytes).unwrap();
        assert_eq!(
            decoded.cause,
            Cause::Transport(CauseTransport::TransportResourceUnavailable)
        );
        assert_eq!(decoded.cause.category(), CauseCategory::Transport);

        assert_eq!(
            build_path_switch_request_unsuccessful_transfer(7, 0),
            Err(NgapBuildError::UnknownCauseCategory(7))
        );
        assert_eq!(
            build_path_switch_request_unsuccessful_transfer(cause_group::NAS, 9),
            Err(NgapBuildError::InvalidCauseValue {
                group: cause_group::NAS,
                value: 9
            })
        );
    }

    #[test]
    fn test_handover_command_transfer() {
        let bytes = build_handover_command_transfer(&sm_context()).unwrap();
        let decoded: HandoverCommandTransfer = decode_from_bytes(&bytes).unwrap();
        let Some(UpTransportLayerInformation::GtpTunnel(tunnel)) =
            decoded.dl_forwarding_up_tnl_information
        else {
            panic!("missing DL forwarding tunnel");
        };
        assert_eq!(tunnel.teid(), 0x0102_0304);

        let ctx = SmContext {
            default_data_path: None,
            ..sm_context()
        };
        assert_eq!(
            build_handover_command_transfer(&ctx),
            Err(NgapBuildError::MissingDataPath)
        );
    }
}

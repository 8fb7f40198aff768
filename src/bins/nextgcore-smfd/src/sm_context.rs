//! SM Context
//!
//! The already-decided session facts the N2 transfer builders read: session
//! rule (AMBR, default QoS), per-session QoS flows, pending policy updates and
//! the default data path.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::context::{PduSessionType, SmfUpf};

// ============================================================================
// Bit Rate
// ============================================================================

/// Bit-rate string that is not `"<number> <unit>"`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid bit rate: {0:?}")]
pub struct BitRateError(pub String);

/// Convert `"100 Mbps"` style strings to bits per second.
pub fn bit_rate_to_bps(bit_rate: &str) -> Result<u64, BitRateError> {
    let invalid = || BitRateError(bit_rate.to_string());

    let mut parts = bit_rate.split_whitespace();
    let (Some(value), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };

    let multiplier: u64 = match unit {
        "bps" => 1,
        "Kbps" => 1_000,
        "Mbps" => 1_000_000,
        "Gbps" => 1_000_000_000,
        "Tbps" => 1_000_000_000_000,
        _ => return Err(invalid()),
    };

    if let Ok(whole) = value.parse::<u64>() {
        return whole.checked_mul(multiplier).ok_or_else(invalid);
    }

    // Fractional rates such as "1.5 Gbps"
    let value: f64 = value.parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    let bps = value * multiplier as f64;
    if bps > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(bps.round() as u64)
}

// ============================================================================
// QoS Types
// ============================================================================

/// Session AMBR as authorized by policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ambr {
    pub uplink: String,
    pub downlink: String,
}

impl Ambr {
    pub fn new(uplink: impl Into<String>, downlink: impl Into<String>) -> Self {
        Self {
            uplink: uplink.into(),
            downlink: downlink.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreemptionCapability {
    NotPreempt,
    MayPreempt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreemptionVulnerability {
    NotPreemptable,
    Preemptable,
}

/// Allocation and Retention Priority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arp {
    pub priority_level: u8,
    pub preempt_cap: Option<PreemptionCapability>,
    pub preempt_vuln: Option<PreemptionVulnerability>,
}

impl Arp {
    pub fn new(
        priority_level: u8,
        preempt_cap: PreemptionCapability,
        preempt_vuln: PreemptionVulnerability,
    ) -> Self {
        Self {
            priority_level,
            preempt_cap: Some(preempt_cap),
            preempt_vuln: Some(preempt_vuln),
        }
    }
}

/// Default QoS of the session rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizedDefaultQos {
    pub var_5qi: u8,
    pub arp: Arp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRule {
    pub auth_sess_ambr: Option<Ambr>,
    pub auth_def_qos: Option<AuthorizedDefaultQos>,
}

/// QoS flow descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QosData {
    pub qos_id: String,
    pub var_5qi: u8,
    pub arp: Arp,
}

impl QosData {
    pub fn new(qos_id: impl Into<String>, var_5qi: u8, arp: Arp) -> Self {
        Self {
            qos_id: qos_id.into(),
            var_5qi,
            arp,
        }
    }
}

/// Flows keyed by QoS id
pub type QosDataMap = BTreeMap<String, QosData>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QosFlowUpdate {
    pub add: Option<QosDataMap>,
}

/// Policy update not yet applied to the session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmPolicyUpdate {
    pub qos_flow_update: Option<QosFlowUpdate>,
}

// ============================================================================
// Data Path
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpTunnel {
    pub teid: u32,
}

/// First node of the default data path: the UPF terminating N3
#[derive(Debug, Clone)]
pub struct DataPathNode {
    pub upf: Arc<SmfUpf>,
    pub ul_tunnel: Option<UpTunnel>,
}

// ============================================================================
// SM Context
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct SmContext {
    pub sm_context_ref: String,
    pub selected_pdu_session_type: PduSessionType,
    pub session_rule: Option<SessionRule>,
    pub qos_data: QosDataMap,
    pub sm_policy_updates: Vec<SmPolicyUpdate>,
    pub default_data_path: Option<DataPathNode>,
}

impl SmContext {
    pub fn new(sm_context_ref: impl Into<String>) -> Self {
        Self {
            sm_context_ref: sm_context_ref.into(),
            ..Default::default()
        }
    }

    pub fn session_ambr(&self) -> Option<&Ambr> {
        self.session_rule.as_ref()?.auth_sess_ambr.as_ref()
    }

    pub fn default_qos(&self) -> Option<&AuthorizedDefaultQos> {
        self.session_rule.as_ref()?.auth_def_qos.as_ref()
    }

    /// Flows to set up: the added set of the first pending policy update
    /// replaces the session's own flows when present.
    pub fn qos_flows_to_setup(&self) -> &QosDataMap {
        self.sm_policy_updates
            .first()
            .and_then(|update| update.qos_flow_update.as_ref())
            .and_then(|flow_update| flow_update.add.as_ref())
            .unwrap_or(&self.qos_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arp() -> Arp {
        Arp::new(
            8,
            PreemptionCapability::MayPreempt,
            PreemptionVulnerability::NotPreemptable,
        )
    }

    #[test]
    fn test_bit_rate_units() {
        assert_eq!(bit_rate_to_bps("1 Gbps"), Ok(1_000_000_000));
        assert_eq!(bit_rate_to_bps("100 Mbps"), Ok(100_000_000));
        assert_eq!(bit_rate_to_bps("64 Kbps"), Ok(64_000));
        assert_eq!(bit_rate_to_bps("512 bps"), Ok(512));
        assert_eq!(bit_rate_to_bps("2 Tbps"), Ok(2_000_000_000_000));
        assert_eq!(bit_rate_to_bps("1.5 Gbps"), Ok(1_500_000_000));
    }

    #[test]
    fn test_bit_rate_malformed() {
        for s in ["", "1Gbps", "1 gbps", "fast Mbps", "1 Mbps extra", "-1 Mbps"] {
            assert_eq!(bit_rate_to_bps(s), Err(BitRateError(s.to_string())), "{s}");
        }
    }

    #[test]
    fn test_qos_flows_to_setup_prefers_first_policy_update() {
        let mut ctx = SmContext::new("ref-1");
        ctx.qos_data.insert("1".into(), QosData::new("1", 9, arp()));
        ctx.qos_data.insert("2".into(), QosData::new("2", 8, arp()));
        assert_eq!(ctx.qos_flows_to_setup().len(), 2);

        let added: QosDataMap = [("5".to_string(), QosData::new("5", 5, arp()))].into();
        ctx.sm_policy_updates.push(SmPolicyUpdate {
            qos_flow_update: Some(QosFlowUpdate { add: Some(added) }),
        });
        ctx.sm_policy_updates.push(SmPolicyUpdate {
            qos_flow_update: Some(QosFlowUpdate {
                add: Some(QosDataMap::new()),
            }),
        });

        let flows = ctx.qos_flows_to_setup();
        assert_eq!(flows.keys().collect::<Vec<_>>(), vec!["5"]);
    }

    #[test]
    fn test_qos_flows_to_setup_update_without_additions() {
        let mut ctx = SmContext::new("ref-1");
        ctx.qos_data.insert("1".into(), QosData::new("1", 9, arp()));
        ctx.sm_policy_updates.push(SmPolicyUpdate::default());
        assert_eq!(ctx.qos_flows_to_setup().len(), 1);
    }
}

//! SMF Metrics
//!
//! N4 message statistics, labelled the way the SMF reports PFCP traffic:
//! node id, message type, direction, outcome and failure detail.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use crate::n4_build::PfcpMessageType;

/// Outcome label of a failed exchange
pub const OUTCOME_FAILURE: &str = "Failure";
/// Detail label of a heartbeat demotion
pub const DETAIL_TIMEOUT: &str = "Timeout";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::In => "In",
            Direction::Out => "Out",
        })
    }
}

/// Counter labels
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct N4MsgKey {
    pub node_id: String,
    pub msg_type: PfcpMessageType,
    pub direction: Direction,
    pub outcome: String,
    pub detail: String,
}

impl N4MsgKey {
    pub fn new(
        node_id: impl Into<String>,
        msg_type: PfcpMessageType,
        direction: Direction,
        outcome: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            msg_type,
            direction,
            outcome: outcome.into(),
            detail: detail.into(),
        }
    }
}

/// N4 message counters
#[derive(Debug, Default)]
pub struct N4MsgStats {
    counters: RwLock<HashMap<N4MsgKey, u64>>,
}

impl N4MsgStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(
        &self,
        node_id: &str,
        msg_type: PfcpMessageType,
        direction: Direction,
        outcome: &str,
        detail: &str,
    ) {
        let key = N4MsgKey::new(node_id, msg_type, direction, outcome, detail);
        log::trace!(
            "n4_messages_total{{node={},type={},dir={},outcome={},detail={}}} += 1",
            key.node_id,
            key.msg_type.name(),
            key.direction,
            key.outcome,
            key.detail
        );
        if let Ok(mut counters) = self.counters.write() {
            let entry = counters.entry(key).or_insert(0);
            *entry = entry.saturating_add(1);
        }
    }

    /// Current value of one counter
    pub fn get(&self, key: &N4MsgKey) -> u64 {
        self.counters
            .read()
            .ok()
            .and_then(|counters| counters.get(key).copied())
            .unwrap_or(0)
    }

    /// Sum of all counters for a message type and direction
    pub fn total(&self, msg_type: PfcpMessageType, direction: Direction) -> u64 {
        self.counters
            .read()
            .map(|counters| {
                counters
                    .iter()
                    .filter(|(k, _)| k.msg_type == msg_type && k.direction == direction)
                    .map(|(_, v)| *v)
                    .sum()
            })
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> Vec<(N4MsgKey, u64)> {
        self.counters
            .read()
            .map(|counters| counters.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default()
    }
}

//! PFCP association state machine
//!
//! Two independent periodic loops drive UPF peer status:
//! - the heartbeat supervisor pings associated peers and demotes a peer
//!   after `max_retry` consecutive dispatch failures;
//! - the association prober retries association setup with every peer that
//!   is not associated.
//!
//! Each peer is inspected and updated under its own lock. A wake never
//! waits on the network, so no lock is held across an await point.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::context::{NodeId, SmfUpf, UpfStatus, UserPlaneInformation};
use crate::metrics::{Direction, N4MsgStats, DETAIL_TIMEOUT, OUTCOME_FAILURE};
use crate::n4_build::PfcpMessageType;
use crate::pfcp_path::PfcpSender;

/// Consecutive heartbeat misses before a peer is demoted
pub const MAX_HEARTBEAT_RETRY: u32 = 3;
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
pub const ASSOCIATION_PROBE_INTERVAL: Duration = Duration::from_secs(10);

/// What one supervisor wake did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartbeatReport {
    pub sent: usize,
    pub failed: usize,
    pub demoted: Vec<NodeId>,
}

/// What one prober wake did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    pub sent: usize,
    pub failed: usize,
}

/// Fixed-period ticker whose first wake is one full period out
async fn run_every<F: FnMut()>(period: Duration, mut wake: F) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        wake();
    }
}

fn log_transition(upf: &SmfUpf, from: UpfStatus, to: UpfStatus) {
    log::debug!("[{}] {} -> {}", upf.node_id(), from.name(), to.name());
}

// ============================================================================
// Heartbeat Supervisor
// ============================================================================

pub struct HeartbeatSupervisor {
    registry: UserPlaneInformation,
    sender: Arc<dyn PfcpSender>,
    stats: Arc<N4MsgStats>,
    smf_id: String,
    interval: Duration,
    max_retry: u32,
}

impl HeartbeatSupervisor {
    pub fn new(
        registry: UserPlaneInformation,
        sender: Arc<dyn PfcpSender>,
        stats: Arc<N4MsgStats>,
        smf_id: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            sender,
            stats,
            smf_id: smf_id.into(),
            interval: HEARTBEAT_INTERVAL,
            max_retry: MAX_HEARTBEAT_RETRY,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// One wake over every peer.
    pub fn tick(&self) -> HeartbeatReport {
        let mut report = HeartbeatReport::default();

        for upf in self.registry.upfs() {
            let mut state = upf.lock();

            if state.is_associated() && state.heartbeat_miss_count < self.max_retry {
                self.stats.increment(
                    &self.smf_id,
                    PfcpMessageType::HeartbeatRequest,
                    Direction::Out,
                    "",
                    "",
                );
                match self.sender.send_heartbeat_request(upf) {
                    Ok(()) => {
                        state.heartbeat_miss_count = 0;
                        report.sent += 1;
                    }
                    Err(e) => {
                        state.heartbeat_miss_count += 1;
                        report.failed += 1;
                        log::error!(
                            "[{}] Heartbeat Request failed ({}/{}): {}",
                            upf.node_id(),
                            state.heartbeat_miss_count,
                            self.max_retry,
                            e
                        );
                        self.stats.increment(
                            &self.smf_id,
                            PfcpMessageType::HeartbeatRequest,
                            Direction::Out,
                            OUTCOME_FAILURE,
                            &e.to_string(),
                        );
                    }
                }
            }

            if state.is_associated() && state.heartbeat_miss_count >= self.max_retry {
                log::warn!(
                    "[{}] No Heartbeat Response after {} attempts, association lost",
                    upf.node_id(),
                    state.heartbeat_miss_count
                );
                log_transition(upf, state.status, UpfStatus::NotAssociated);
                state.status = UpfStatus::NotAssociated;
                self.stats.increment(
                    &self.smf_id,
                    PfcpMessageType::HeartbeatRequest,
                    Direction::Out,
                    OUTCOME_FAILURE,
                    DETAIL_TIMEOUT,
                );
                report.demoted.push(upf.node_id().clone());
            }
        }

        report
    }

    /// Wake every interval for the life of the task.
    pub async fn run(self) {
        log::info!(
            "Heartbeat supervisor started (interval {:?}, max retry {})",
            self.interval,
            self.max_retry
        );
        let interval = self.interval;
        run_every(interval, || {
            self.tick();
        })
        .await;
    }
}

// ============================================================================
// Association Prober
// ============================================================================

pub struct AssociationProber {
    registry: UserPlaneInformation,
    sender: Arc<dyn PfcpSender>,
    stats: Arc<N4MsgStats>,
    smf_id: String,
    interval: Duration,
}

impl AssociationProber {
    pub fn new(
        registry: UserPlaneInformation,
        sender: Arc<dyn PfcpSender>,
        stats: Arc<N4MsgStats>,
        smf_id: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            sender,
            stats,
            smf_id: smf_id.into(),
            interval: ASSOCIATION_PROBE_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// One wake: a setup request to every peer not associated.
    pub fn tick(&self) -> ProbeReport {
        let mut report = ProbeReport::default();

        for upf in self.registry.upfs() {
            let state = upf.lock();
            if state.is_associated() {
                continue;
            }

            self.stats.increment(
                &self.smf_id,
                PfcpMessageType::AssociationSetupRequest,
                Direction::Out,
                "",
                "",
            );
            match self.sender.send_association_setup_request(upf) {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    log::error!("[{}] Association Setup Request failed: {}", upf.node_id(), e);
                    self.stats.increment(
                        &self.smf_id,
                        PfcpMessageType::AssociationSetupRequest,
                        Direction::Out,
                        OUTCOME_FAILURE,
                        &e.to_string(),
                    );
                }
            }
        }

        report
    }

    pub async fn run(self) {
        log::info!("Association prober started (interval {:?})", self.interval);
        let interval = self.interval;
        run_every(interval, || {
            self.tick();
        })
        .await;
    }
}

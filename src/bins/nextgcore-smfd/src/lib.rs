//! NextGCore SMF signaling core
//!
//! Two independent parts of the Session Management Function:
//!
//! - N2 SM transfer encoding: the NGAP transfer containers the SMF hands to
//!   the AMF (PDU Session Resource Setup/Modify/Release, Path Switch and
//!   Handover), built from a session context and APER-encoded.
//! - UPF peer lifecycle: the registry of configured UPFs, the PFCP heartbeat
//!   supervisor that demotes silent peers and the association prober that
//!   re-establishes them.

pub mod config;
pub mod context;
pub mod metrics;
pub mod n4_build;
pub mod n4_handler;
pub mod ngap_build;
pub mod pfcp_path;
pub mod pfcp_sm;
pub mod qos;
pub mod sm_context;


pub use config::{ConfigError, SmfConfig};
pub use context::{NodeId, SmfUpf, UpfStatus, UserPlaneInformation};
pub use metrics::N4MsgStats;
pub use n4_handler::N4Handler;
pub use ngap_build::{NgapBuildError, NgapBuildResult};
pub use pfcp_path::{PfcpPath, PfcpSender};
pub use pfcp_sm::{AssociationProber, HeartbeatSupervisor};
pub use sm_context::SmContext;

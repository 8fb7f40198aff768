//! SMF Configuration
//!
//! YAML configuration of the N4 endpoint, peer supervision timers and the
//! UPF topology.
//!
//! ```yaml
//! smf:
//!   instance_id: smf
//!   pfcp:
//!     address: 127.0.0.3
//!     port: 8805
//!   heartbeat:
//!     interval: 10
//!     max_retry: 3
//!   association:
//!     probe_interval: 10
//! upfs:
//!   - node_id: 127.0.0.7
//!     n3:
//!       - ipv4: [10.200.200.101]
//!     snssai_infos:
//!       - snssai: { sst: 1, sd: 66051 }
//!         dnn_list:
//!           - dnn: internet
//! ```

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::context::{
    N3Interface, NodeId, SmfUpf, SnssaiUpfInfo, UserPlaneInformation, PFCP_UDP_PORT,
};
use crate::pfcp_sm::{ASSOCIATION_PROBE_INTERVAL, HEARTBEAT_INTERVAL, MAX_HEARTBEAT_RETRY};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Cannot resolve {host}: {reason}")]
    Resolve { host: String, reason: String },
    #[error("Configuration validation error: {0}")]
    Validation(String),
}

// ============================================================================
// SMF Section
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PfcpServerConf {
    pub address: IpAddr,
    pub port: u16,
}

impl Default for PfcpServerConf {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 3)),
            port: PFCP_UDP_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeartbeatConf {
    /// Seconds between heartbeat wakes
    pub interval: u64,
    pub max_retry: u32,
}

impl Default for HeartbeatConf {
    fn default() -> Self {
        Self {
            interval: HEARTBEAT_INTERVAL.as_secs(),
            max_retry: MAX_HEARTBEAT_RETRY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AssociationConf {
    /// Seconds between association probes
    pub probe_interval: u64,
}

impl Default for AssociationConf {
    fn default() -> Self {
        Self {
            probe_interval: ASSOCIATION_PROBE_INTERVAL.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SmfConf {
    pub instance_id: String,
    pub pfcp: PfcpServerConf,
    pub heartbeat: HeartbeatConf,
    pub association: AssociationConf,
}

impl Default for SmfConf {
    fn default() -> Self {
        Self {
            instance_id: "smf".to_string(),
            pfcp: PfcpServerConf::default(),
            heartbeat: HeartbeatConf::default(),
            association: AssociationConf::default(),
        }
    }
}

// ============================================================================
// UPF Section
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct N3Conf {
    pub ipv4: Vec<Ipv4Addr>,
    pub ipv6: Vec<Ipv6Addr>,
    pub network_instance: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UpfConf {
    pub node_id: String,
    /// PFCP peer address, `host:port`
    pub address: Option<String>,
    pub n3: Vec<N3Conf>,
    pub snssai_infos: Vec<SnssaiUpfInfo>,
}

fn resolve(host_port: &str) -> Result<SocketAddr, ConfigError> {
    if let Ok(addr) = host_port.parse::<SocketAddr>() {
        return Ok(addr);
    }
    let resolve_error = |reason: String| ConfigError::Resolve {
        host: host_port.to_string(),
        reason,
    };
    host_port
        .to_socket_addrs()
        .map_err(|e| resolve_error(e.to_string()))?
        .next()
        .ok_or_else(|| resolve_error("no address".to_string()))
}

impl UpfConf {
    pub fn node_id(&self) -> Result<NodeId, ConfigError> {
        if self.node_id.is_empty() {
            return Err(ConfigError::Validation("UPF without node_id".to_string()));
        }
        self.node_id
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.node_id.clone()))
    }

    /// PFCP address: explicit `address`, else the node id on the PFCP port
    pub fn pfcp_addr(&self) -> Result<SocketAddr, ConfigError> {
        if let Some(address) = &self.address {
            return resolve(address);
        }
        match self.node_id()? {
            NodeId::Fqdn(fqdn) => resolve(&format!("{}:{}", fqdn, PFCP_UDP_PORT)),
            node_id => node_id
                .ip()
                .map(|ip| SocketAddr::new(ip, PFCP_UDP_PORT))
                .ok_or_else(|| ConfigError::InvalidAddress(self.node_id.clone())),
        }
    }

    pub fn to_upf(&self) -> Result<SmfUpf, ConfigError> {
        let mut upf = SmfUpf::new(self.node_id()?, self.pfcp_addr()?);
        for n3 in &self.n3 {
            upf = upf.with_n3_interface(N3Interface {
                network_instance: n3.network_instance.clone(),
                ipv4_endpoints: n3.ipv4.clone(),
                ipv6_endpoints: n3.ipv6.clone(),
            });
        }
        for info in &self.snssai_infos {
            upf = upf.with_snssai_info(info.clone());
        }
        Ok(upf)
    }
}

// ============================================================================
// Top Level
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SmfConfig {
    pub smf: SmfConf,
    pub upfs: Vec<UpfConf>,
}

impl SmfConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document is the default configuration
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.smf.heartbeat.interval == 0 || self.smf.association.probe_interval == 0 {
            return Err(ConfigError::Validation(
                "heartbeat and probe intervals must be at least 1 second".to_string(),
            ));
        }
        if self.smf.heartbeat.max_retry == 0 {
            return Err(ConfigError::Validation(
                "heartbeat max_retry must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn pfcp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.smf.pfcp.address, self.smf.pfcp.port)
    }

    /// PFCP Node ID of this SMF
    pub fn node_id(&self) -> NodeId {
        self.smf.pfcp.address.into()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.smf.heartbeat.interval)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.smf.association.probe_interval)
    }

    /// Build the peer registry; every peer starts not associated.
    pub fn user_plane_information(&self) -> Result<UserPlaneInformation, ConfigError> {
        let upfs = self
            .upfs
            .iter()
            .map(UpfConf::to_upf)
            .collect::<Result<Vec<_>, _>>()?;
        for upf in &upfs {
            log::info!("[Added] UPF {} (pfcp {})", upf.node_id(), upf.pfcp_addr());
        }
        Ok(UserPlaneInformation::new(upfs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{PduSessionType, SNssai, UpfStatus};

    const SAMPLE: &str = r#"
smf:
  instance_id: smf-1
  pfcp:
    address: 127.0.0.4
  heartbeat:
    interval: 5
upfs:
  - node_id: 127.0.0.7
    n3:
      - ipv4: [10.200.200.101]
        network_instance: internet
    snssai_infos:
      - snssai: { sst: 1, sd: 66051 }
        dnn_list:
          - dnn: internet
            pdu_session_types: [IPV4, IPV4V6]
  - node_id: 10.0.0.9
    address: 10.0.0.9:18805
"#;

    #[test]
    fn test_defaults() {
        let config = SmfConfig::from_yaml("").unwrap();
        assert_eq!(config.smf.instance_id, "smf");
        assert_eq!(config.pfcp_addr(), "127.0.0.3:8805".parse().unwrap());
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(10));
        assert_eq!(config.probe_interval(), Duration::from_secs(10));
        assert_eq!(config.smf.heartbeat.max_retry, 3);
        assert!(config.upfs.is_empty());
    }

    #[test]
    fn test_sample() {
        let config = SmfConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.smf.instance_id, "smf-1");
        assert_eq!(config.pfcp_addr(), "127.0.0.4:8805".parse().unwrap());
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(5));
        assert_eq!(config.smf.heartbeat.max_retry, 3);

        let registry = config.user_plane_information().unwrap();
        assert_eq!(registry.len(), 2);

        let upf = &registry.upfs()[0];
        assert_eq!(upf.pfcp_addr(), "127.0.0.7:8805".parse().unwrap());
        assert_eq!(upf.status(), UpfStatus::NotAssociated);
        assert_eq!(upf.n3_ip(PduSessionType::Ipv4).unwrap(), vec![10, 200, 200, 101]);
        assert!(upf.serves(&SNssai { sst: 1, sd: Some(0x010203) }, "internet"));
        assert_eq!(
            upf.snssai_infos()[0].dnn_list[0].pdu_session_types,
            vec![PduSessionType::Ipv4, PduSessionType::Ipv4v6]
        );

        assert_eq!(registry.upfs()[1].pfcp_addr(), "10.0.0.9:18805".parse().unwrap());
    }

    #[test]
    fn test_invalid() {
        assert!(matches!(
            SmfConfig::from_yaml("smf:\n  heartbeat:\n    max_retry: 0\n"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            SmfConfig::from_yaml("smf: [1, 2]"),
            Err(ConfigError::Parse(_))
        ));

        let config = SmfConfig::from_yaml("upfs:\n  - address: 10.0.0.1:8805\n").unwrap();
        assert!(matches!(
            config.user_plane_information(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            SmfConfig::from_file("/nonexistent/smf.yaml"),
            Err(ConfigError::Io { .. })
        ));
    }
}

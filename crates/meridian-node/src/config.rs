//! TOML-based configuration for Meridian nodes.

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use meridian_core::MTU_CLASSIC;
use meridian_media::UdpConfig;

use crate::error::NodeError;

/// Top-level node configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub media: MediaSection,
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))
    }
}

/// The `[node]` section.
#[derive(Debug, Deserialize)]
pub struct NodeSection {
    /// Local 7-bit node id.
    #[serde(default = "default_node_id")]
    pub id: u8,
    /// Product name served by the node information query.
    #[serde(default = "default_product_name")]
    pub product_name: String,
    /// Byte budget shared by all TX and RX payload buffers.
    #[serde(default = "default_arena_bytes")]
    pub arena_bytes: usize,
    /// Maximum number of queued outbound frames.
    #[serde(default = "default_tx_queue_capacity")]
    pub tx_queue_capacity: usize,
    /// Frame payload budget including the tail byte.
    #[serde(default = "default_mtu")]
    pub mtu: usize,
    /// Maximum concurrent reassembly sessions.
    #[serde(default = "default_max_rx_sessions")]
    pub max_rx_sessions: usize,
}

fn default_node_id() -> u8 {
    46
}

fn default_product_name() -> String {
    "meridian.test.node".to_string()
}

fn default_arena_bytes() -> usize {
    20 * 1024
}

fn default_tx_queue_capacity() -> usize {
    100
}

fn default_mtu() -> usize {
    MTU_CLASSIC
}

fn default_max_rx_sessions() -> usize {
    16
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            id: default_node_id(),
            product_name: default_product_name(),
            arena_bytes: default_arena_bytes(),
            tx_queue_capacity: default_tx_queue_capacity(),
            mtu: default_mtu(),
            max_rx_sessions: default_max_rx_sessions(),
        }
    }
}

/// The `[logging]` section.
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// The `[media]` section.
#[derive(Debug, Default, Deserialize)]
pub struct MediaSection {
    pub udp: Option<UdpEntry>,
}

/// A `[media.udp]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct UdpEntry {
    #[serde(default = "default_media_name")]
    pub name: String,
    pub bind: String,
    /// Peer or broadcast address; omit for a listen-only link.
    pub target: Option<String>,
    #[serde(default)]
    pub broadcast: bool,
}

fn default_media_name() -> String {
    "bus".to_string()
}

impl UdpEntry {
    /// Resolve the entry into a media configuration.
    pub fn to_media_config(&self, mtu: usize) -> Result<UdpConfig, NodeError> {
        let bind = parse_socket_addr(&self.bind)?;
        let mut config = match &self.target {
            Some(target) if self.broadcast => {
                UdpConfig::broadcast(&self.name, bind, parse_socket_addr(target)?)
            }
            Some(target) => UdpConfig::unicast(&self.name, bind, parse_socket_addr(target)?),
            None => UdpConfig::receive_only(&self.name, bind),
        };
        config.mtu = mtu;
        Ok(config)
    }
}

/// Parse a socket address string with a config-flavored error.
pub fn parse_socket_addr(s: &str) -> Result<SocketAddr, NodeError> {
    s.parse()
        .map_err(|e| NodeError::Config(format!("invalid socket address '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = NodeConfig::parse("").unwrap();
        assert_eq!(config.node.id, 46);
        assert_eq!(config.node.product_name, "meridian.test.node");
        assert_eq!(config.node.arena_bytes, 20 * 1024);
        assert_eq!(config.node.tx_queue_capacity, 100);
        assert_eq!(config.node.mtu, MTU_CLASSIC);
        assert!(config.media.udp.is_none());
    }

    #[test]
    fn test_full_config_parses() {
        let config = NodeConfig::parse(
            r#"
[node]
id = 12
product_name = "meridian.bench.node"
arena_bytes = 4096

[logging]
level = "debug"

[media.udp]
bind = "0.0.0.0:29460"
target = "255.255.255.255:29460"
broadcast = true
"#,
        )
        .unwrap();
        assert_eq!(config.node.id, 12);
        assert_eq!(config.node.arena_bytes, 4096);
        assert_eq!(config.logging.level, "debug");

        let udp = config.media.udp.unwrap();
        assert!(udp.broadcast);
        let media_config = udp.to_media_config(MTU_CLASSIC).unwrap();
        assert_eq!(media_config.mtu, MTU_CLASSIC);
        assert!(media_config.target.is_some());
    }

    #[test]
    fn test_bad_address_is_config_error() {
        let udp = UdpEntry {
            name: "bus".into(),
            bind: "not-an-address".into(),
            target: None,
            broadcast: false,
        };
        assert!(matches!(
            udp.to_media_config(MTU_CLASSIC),
            Err(NodeError::Config(_))
        ));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        assert!(matches!(
            NodeConfig::parse("[node\nid = 1"),
            Err(NodeError::Config(_))
        ));
    }
}

//! Controller configuration.
//!
//! Loaded from a TOML file; every field has a default so an empty or
//! missing file yields a working configuration for a local software switch.
//!
//! ```toml
//! [connection]
//! base_address = "127.0.0.1"
//! base_port = 50050
//!
//! [session]
//! max_retry = 3
//!
//! [sampler]
//! enabled = true
//! ```

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sonic_p4rt::{DigestConfig, ElectionId};

use crate::error::ConfigError;

/// How switches are reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Address shared by all switches.
    #[serde(default = "default_base_address")]
    pub base_address: IpAddr,

    /// Port of device 0; device `n` listens on `base_port + n`.
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// PEM file holding the CA certificate.
    #[serde(default = "default_cert_path")]
    pub cert_path: PathBuf,

    /// High half of the election id.
    #[serde(default)]
    pub election_id_high: u64,

    /// Low half of the election id.
    #[serde(default = "default_election_id_low")]
    pub election_id_low: u64,
}

/// Session lifecycle timing and retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Reconnection attempts allowed after a runtime fault.
    #[serde(default)]
    pub max_retry: u32,

    /// Delay between winning arbitration and pushing the pipeline.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Delay between failed reconnection attempts.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,

    /// Time given to in-flight dispatch work after the stream ends.
    #[serde(default = "default_grace_period")]
    pub grace_period_ms: u64,

    /// Number of front-panel ports per switch.
    #[serde(default = "default_ports")]
    pub ports: u32,
}

/// Digest delivery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestSettings {
    /// Digest name in P4Info.
    #[serde(default = "default_digest_name")]
    pub name: String,

    /// Coalescing timeout (0 disables coalescing).
    #[serde(default)]
    pub max_timeout_ns: i64,

    /// Digests per list.
    #[serde(default = "default_max_list_size")]
    pub max_list_size: i32,

    /// Acknowledgement timeout.
    #[serde(default = "default_ack_timeout")]
    pub ack_timeout_ns: i64,
}

/// Periodic port counter sampling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Run the sampler on every tick.
    #[serde(default)]
    pub enabled: bool,

    /// Tick interval of the supervisory loop.
    #[serde(default = "default_sample_interval")]
    pub interval_ms: u64,

    /// Indirect packet counter indexed by port.
    #[serde(default = "default_packet_counter")]
    pub counter: String,

    /// Packet count above which a warning is logged.
    #[serde(default = "default_packet_count_warn")]
    pub packet_count_warn: i64,
}

/// Static forwarding rule installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// LPM table receiving the routes.
    #[serde(default = "default_table")]
    pub table: String,

    /// Direct action taking (dst MAC, egress port).
    #[serde(default = "default_action")]
    pub action: String,

    /// Prefix length of every installed route.
    #[serde(default = "default_prefix_len")]
    pub prefix_len: i32,
}

/// Complete controller configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Digest settings
    #[serde(default)]
    pub digest: DigestSettings,

    /// Sampler settings
    #[serde(default)]
    pub sampler: SamplerConfig,

    /// Provisioning settings
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
}

fn default_base_address() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_base_port() -> u16 {
    50050
}

fn default_cert_path() -> PathBuf {
    PathBuf::from("/tmp/cert.pem")
}

fn default_election_id_low() -> u64 {
    1
}

fn default_settle_delay() -> u64 {
    250
}

fn default_reconnect_delay() -> u64 {
    5000
}

fn default_grace_period() -> u64 {
    250
}

fn default_ports() -> u32 {
    3
}

fn default_digest_name() -> String {
    "digest_t".to_string()
}

fn default_max_list_size() -> i32 {
    1
}

fn default_ack_timeout() -> i64 {
    // 1000 seconds
    1_000_000_000_000
}

fn default_sample_interval() -> u64 {
    5000
}

fn default_packet_counter() -> String {
    "MyIngress.port_packets_in".to_string()
}

fn default_packet_count_warn() -> i64 {
    20
}

fn default_table() -> String {
    "MyIngress.ipv4_lpm".to_string()
}

fn default_action() -> String {
    "MyIngress.ipv4_forward".to_string()
}

fn default_prefix_len() -> i32 {
    32
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_address: default_base_address(),
            base_port: default_base_port(),
            cert_path: default_cert_path(),
            election_id_high: 0,
            election_id_low: default_election_id_low(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_retry: 0,
            settle_delay_ms: default_settle_delay(),
            reconnect_delay_ms: default_reconnect_delay(),
            grace_period_ms: default_grace_period(),
            ports: default_ports(),
        }
    }
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            name: default_digest_name(),
            max_timeout_ns: 0,
            max_list_size: default_max_list_size(),
            ack_timeout_ns: default_ack_timeout(),
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: default_sample_interval(),
            counter: default_packet_counter(),
            packet_count_warn: default_packet_count_warn(),
        }
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            action: default_action(),
            prefix_len: default_prefix_len(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.base_port == 0 {
            return Err(ConfigError::invalid("connection.base_port", "must be > 0"));
        }

        if self.digest.name.is_empty() {
            return Err(ConfigError::invalid("digest.name", "must not be empty"));
        }

        if self.digest.max_list_size < 1 {
            return Err(ConfigError::invalid("digest.max_list_size", "must be >= 1"));
        }

        if self.sampler.interval_ms == 0 {
            return Err(ConfigError::invalid("sampler.interval_ms", "must be > 0"));
        }

        if self.sampler.counter.is_empty() {
            return Err(ConfigError::invalid("sampler.counter", "must not be empty"));
        }

        if self.provisioning.table.is_empty() || self.provisioning.action.is_empty() {
            return Err(ConfigError::invalid(
                "provisioning",
                "table and action must not be empty",
            ));
        }

        if !(1..=32).contains(&self.provisioning.prefix_len) {
            return Err(ConfigError::invalid(
                "provisioning.prefix_len",
                "must be 1-32",
            ));
        }

        Ok(())
    }

    /// Election id used for every session.
    pub fn election_id(&self) -> ElectionId {
        ElectionId::new(
            self.connection.election_id_high,
            self.connection.election_id_low,
        )
    }

    /// Digest delivery configuration sent to the switch.
    pub fn digest_config(&self) -> DigestConfig {
        DigestConfig {
            max_timeout_ns: self.digest.max_timeout_ns,
            max_list_size: self.digest.max_list_size,
            ack_timeout_ns: self.digest.ack_timeout_ns,
        }
    }

    /// Get settle delay as Duration
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.session.settle_delay_ms)
    }

    /// Get reconnect delay as Duration
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.session.reconnect_delay_ms)
    }

    /// Get grace period as Duration
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.session.grace_period_ms)
    }

    /// Get sampler tick interval as Duration
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sampler.interval_ms)
    }
}

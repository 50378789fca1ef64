//! Error types for the P4 controller.
//!
//! Errors are split by how they travel:
//!
//! - [`SetupError`]: returned synchronously by a session establishment
//!   attempt. Never retried by the attempt itself.
//! - [`Fault`]: detected after a session is up, delivered through the
//!   session's fault slot and answered by the reconnection procedure.
//! - [`ConfigError`], [`LinkError`], [`DigestError`]: input validation.

use std::io;
use std::path::PathBuf;

use sonic_p4rt::ClientError;
use thiserror::Error;

/// Result type alias for controller operations.
pub type Result<T> = std::result::Result<T, P4ctlError>;

/// Failure of one session establishment attempt.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The switch address could not be derived from the base address.
    #[error("Cannot derive address for device {device_id}: base port {base_port} overflows")]
    Address {
        /// Device identifier.
        device_id: u64,
        /// Configured base port.
        base_port: u16,
    },

    /// TLS certificate material could not be loaded.
    #[error("Failed to load TLS credentials from {}: {source}", path.display())]
    Credentials {
        /// Certificate path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The RPC channel could not be opened.
    #[error("Failed to dial {addr}: {source}")]
    Dial {
        /// Target address.
        addr: String,
        /// Client error.
        #[source]
        source: ClientError,
    },

    /// The capabilities query failed.
    #[error("Capabilities query failed: {0}")]
    Capabilities(#[source] ClientError),

    /// The stream session could not be started.
    #[error("Failed to start stream session: {0}")]
    Session(#[source] ClientError),

    /// Another controller holds mastership.
    #[error("We are not the primary client")]
    NotPrimary,

    /// The arbitration stream ended without an answer.
    #[error("Arbitration stream closed before mastership was decided")]
    ArbitrationClosed,

    /// Process shutdown interrupted the attempt.
    #[error("Session setup cancelled")]
    Cancelled,

    /// The forwarding pipeline push failed.
    #[error("Failed to set forwarding pipeline: {0}")]
    Pipeline(#[source] ClientError),

    /// Digest delivery could not be enabled.
    #[error("Cannot enable digest {name}: {source}")]
    Digest {
        /// Digest name.
        name: String,
        /// Client error.
        #[source]
        source: ClientError,
    },
}

impl SetupError {
    /// Returns the setup stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            SetupError::Address { .. } => "address",
            SetupError::Credentials { .. } => "credentials",
            SetupError::Dial { .. } => "dial",
            SetupError::Capabilities(_) => "capabilities",
            SetupError::Session(_) => "session",
            SetupError::NotPrimary | SetupError::ArbitrationClosed => "arbitration",
            SetupError::Cancelled => "cancelled",
            SetupError::Pipeline(_) => "pipeline",
            SetupError::Digest { .. } => "digest",
        }
    }
}

/// Runtime fault reported after a successful setup.
#[derive(Debug, Error)]
pub enum Fault {
    /// The switch reported an error on the stream channel.
    #[error("StreamError: {0}")]
    Stream(String),

    /// A digest list could not be acknowledged.
    #[error("Digest acknowledgement failed: {0}")]
    DigestAck(#[source] ClientError),

    /// A port counter could not be read.
    #[error("Counter read failed on port {port}: {source}")]
    CounterRead {
        /// Port (counter index).
        port: u32,
        /// Client error.
        #[source]
        source: ClientError,
    },

    /// A port counter could not be reset.
    #[error("Counter reset failed on port {port}: {source}")]
    CounterWrite {
        /// Port (counter index).
        port: u32,
        /// Client error.
        #[source]
        source: ClientError,
    },

    /// A table entry could not be installed.
    #[error("Table entry insert into {table} failed: {source}")]
    TableInsert {
        /// Table name.
        table: String,
        /// Client error.
        #[source]
        source: ClientError,
    },
}

/// Configuration load or validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        /// Config file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("Failed to parse config file {}: {message}", path.display())]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A field holds an unusable value.
    #[error("Invalid configuration for {field}: {message}")]
    Invalid {
        /// Offending field.
        field: String,
        /// Error message.
        message: String,
    },
}

impl ConfigError {
    /// Creates an invalid field error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Route file load or parse error.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Reading the route file failed.
    #[error("Failed to read route file {}: {source}", path.display())]
    Io {
        /// Route file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The route file is not valid JSON for this schema.
    #[error("Failed to parse route file: {0}")]
    Parse(#[from] serde_json::Error),

    /// A device key is not a number.
    #[error("Invalid device id '{0}' in route file")]
    InvalidDevice(String),

    /// An address is not a dotted IPv4 address.
    #[error("Invalid IPv4 address '{0}'")]
    InvalidAddress(String),

    /// A hardware address is not a 6-octet MAC.
    #[error("Invalid MAC address '{0}'")]
    InvalidMac(String),
}

/// Digest entry decode error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestError {
    /// The digest struct lacks a member.
    #[error("Digest entry has no member {index}")]
    MissingMember {
        /// Zero-based member index.
        index: usize,
    },

    /// The threshold field is neither 1 nor 2 bytes wide.
    #[error("Threshold field is {len} bytes wide, expected 1 or 2")]
    ThresholdWidth {
        /// Actual width in bytes.
        len: usize,
    },
}

/// Top-level controller error.
#[derive(Debug, Error)]
pub enum P4ctlError {
    /// Session setup failed.
    #[error(transparent)]
    Setup(#[from] SetupError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Route file error.
    #[error(transparent)]
    Links(#[from] LinkError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Logging could not be initialized.
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_error_display() {
        assert_eq!(
            SetupError::NotPrimary.to_string(),
            "We are not the primary client"
        );

        let err = SetupError::Digest {
            name: "digest_t".to_string(),
            source: ClientError::not_found("digest", "digest_t"),
        };
        assert!(err.to_string().starts_with("Cannot enable digest digest_t"));
    }

    #[test]
    fn test_setup_error_stage() {
        assert_eq!(SetupError::NotPrimary.stage(), "arbitration");
        assert_eq!(SetupError::ArbitrationClosed.stage(), "arbitration");
        assert_eq!(
            SetupError::Pipeline(ClientError::SessionClosed).stage(),
            "pipeline"
        );
        assert_eq!(
            SetupError::Credentials {
                path: PathBuf::from("/tmp/cert.pem"),
                source: io::Error::from(io::ErrorKind::NotFound),
            }
            .stage(),
            "credentials"
        );
    }

    #[test]
    fn test_fault_display() {
        let fault = Fault::Stream("code 3: bad packet-out".to_string());
        assert_eq!(fault.to_string(), "StreamError: code 3: bad packet-out");

        let fault = Fault::CounterRead {
            port: 2,
            source: ClientError::rpc("Read", "UNAVAILABLE"),
        };
        assert_eq!(
            fault.to_string(),
            "Counter read failed on port 2: RPC Read failed: UNAVAILABLE"
        );
    }

    #[test]
    fn test_digest_error_display() {
        assert_eq!(
            DigestError::ThresholdWidth { len: 3 }.to_string(),
            "Threshold field is 3 bytes wide, expected 1 or 2"
        );
    }

    #[test]
    fn test_transparent_conversion() {
        let err: P4ctlError = ConfigError::invalid("base_port", "must be > 0").into();
        assert_eq!(
            err.to_string(),
            "Invalid configuration for base_port: must be > 0"
        );
    }
}

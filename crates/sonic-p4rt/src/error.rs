//! Error types for P4Runtime client operations.

use thiserror::Error;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned by a [`P4RuntimeClient`](crate::P4RuntimeClient) or
/// [`P4RuntimeConnector`](crate::P4RuntimeConnector).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The remote end rejected an RPC.
    #[error("RPC {operation} failed: {message}")]
    Rpc {
        /// The operation that failed (e.g., "Write", "SetForwardingPipelineConfig").
        operation: String,
        /// Status message from the target.
        message: String,
    },

    /// The target could not be reached.
    #[error("Target unavailable: {0}")]
    Unavailable(String),

    /// A named P4 object is not present in the loaded P4Info.
    #[error("{kind} '{name}' not found in P4Info")]
    NotFound {
        /// Object kind (table, action, counter, digest).
        kind: String,
        /// Fully qualified object name.
        name: String,
    },

    /// The stream channel has been closed.
    #[error("Stream session closed")]
    SessionClosed,
}

impl ClientError {
    /// Creates an RPC error.
    pub fn rpc(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rpc {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a not-found error for a P4Info object.
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_display() {
        let err = ClientError::rpc("Write", "ALREADY_EXISTS");
        assert_eq!(err.to_string(), "RPC Write failed: ALREADY_EXISTS");
    }

    #[test]
    fn test_not_found_display() {
        let err = ClientError::not_found("table", "MyIngress.ipv4_lpm");
        assert_eq!(
            err.to_string(),
            "table 'MyIngress.ipv4_lpm' not found in P4Info"
        );
    }
}

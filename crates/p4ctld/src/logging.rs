//! Tracing subscriber setup.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::P4ctlError;

/// Log verbosity requested by the operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Connection milestones and faults.
    #[default]
    Normal,
    /// Adds pipeline, digest and provisioning detail.
    Verbose,
    /// Adds per-message dispatch.
    Trace,
}

impl Verbosity {
    /// Builds a verbosity from the two operator flags. Trace wins.
    pub fn from_flags(verbose: bool, trace: bool) -> Self {
        match (verbose, trace) {
            (_, true) => Verbosity::Trace,
            (true, false) => Verbosity::Verbose,
            (false, false) => Verbosity::Normal,
        }
    }

    /// Default filter directive for this verbosity.
    pub fn directive(self) -> &'static str {
        match self {
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
            Verbosity::Trace => "trace",
        }
    }
}

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` overrides the verbosity when set. Fails if a global
/// subscriber is already installed.
pub fn init(verbosity: Verbosity) -> Result<(), P4ctlError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(true))
        .try_init()
        .map_err(|e| P4ctlError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_wins() {
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(true, false), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Trace);
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Trace);
    }

    #[test]
    fn test_directives() {
        assert_eq!(Verbosity::default().directive(), "info");
        assert_eq!(Verbosity::Verbose.directive(), "debug");
        assert_eq!(Verbosity::Trace.directive(), "trace");
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init(Verbosity::Normal);
        assert!(matches!(init(Verbosity::Trace), Err(P4ctlError::Logging(_))));
    }
}

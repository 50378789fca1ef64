//! P4Runtime switch session controller.
//!
//! For each managed switch the controller opens a secured session, wins
//! mastership, pushes the forwarding pipeline and digest configuration,
//! installs static routes, then supervises the session and reconnects a
//! bounded number of times after runtime faults.
//!
//! The wire protocol lives behind the [`sonic_p4rt`] traits; this crate
//! only drives them.

pub mod config;
pub mod controller;
pub mod digest;
pub mod dispatcher;
pub mod error;
pub mod fault;
pub mod links;
pub mod logging;
pub mod pipeline;
pub mod provisioner;
pub mod sampler;
pub mod session;

pub use config::ControllerConfig;
pub use controller::Controller;
pub use digest::{decode, decode_threshold, FlowDigest};
pub use dispatcher::{DispatchStats, StreamDispatcher};
pub use error::{ConfigError, DigestError, Fault, LinkError, P4ctlError, Result, SetupError};
pub use fault::{fault_slot, FaultReporter, FaultSlot};
pub use links::{LinkConfig, LinkSource, RouteFile, StaticLinks};
pub use logging::Verbosity;
pub use pipeline::ForwardingPipeline;
pub use provisioner::ConfigProvisioner;
pub use sampler::PeriodicSampler;
pub use session::{session_address, SessionContext, SessionStatus, SwitchSession};

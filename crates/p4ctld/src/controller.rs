//! Multi-switch controller.

use std::sync::Arc;

use sonic_p4rt::P4RuntimeConnector;
use tracing::{error, info};

use crate::config::ControllerConfig;
use crate::error::ConfigError;
use crate::links::LinkSource;
use crate::pipeline::ForwardingPipeline;
use crate::session::{SessionContext, SwitchSession};

/// Owns the sessions of every managed switch.
pub struct Controller {
    ctx: SessionContext,
    pipeline: Arc<ForwardingPipeline>,
    links: Arc<dyn LinkSource>,
    sessions: Vec<SwitchSession>,
}

impl Controller {
    /// Creates a controller after validating `config`.
    pub fn new(
        config: ControllerConfig,
        connector: Arc<dyn P4RuntimeConnector>,
        pipeline: ForwardingPipeline,
        links: Arc<dyn LinkSource>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            ctx: SessionContext::new(Arc::new(config), connector)?,
            pipeline: Arc::new(pipeline),
            links,
            sessions: Vec::new(),
        })
    }

    /// Starts sessions for device ids `1..=devices`.
    ///
    /// A switch that cannot be set up is logged and left idle; the others
    /// are unaffected. Returns the number of sessions established.
    pub async fn start(&mut self, devices: u64) -> usize {
        let mut started = 0;

        for device_id in 1..=devices {
            let session = match SwitchSession::new(
                device_id,
                self.pipeline.clone(),
                self.links.clone(),
                self.ctx.clone(),
            ) {
                Ok(session) => session,
                Err(e) => {
                    error!(device_id, error = %e, "Cannot start");
                    continue;
                }
            };

            match session.establish().await {
                Ok(()) => started += 1,
                Err(e) => error!(device_id, stage = e.stage(), error = %e, "Cannot start"),
            }
            self.sessions.push(session);
        }

        info!(started, devices, "Switches started");
        started
    }

    /// Sessions created so far, in device order.
    pub fn sessions(&self) -> &[SwitchSession] {
        &self.sessions
    }

    /// Swaps the link source of every session and re-provisions the active
    /// ones. Returns the number of sessions re-provisioned.
    pub async fn apply_links(&mut self, links: Arc<dyn LinkSource>) -> usize {
        self.links = links.clone();

        let mut updated = 0;
        for session in &self.sessions {
            if session.apply_links(links.clone()).await.is_some() {
                updated += 1;
            }
        }

        info!(updated, "Switch configuration updated");
        updated
    }

    /// Stops every session and waits for all of their tasks to finish.
    pub async fn shutdown(&self) {
        self.ctx.shutdown.cancel();
        self.ctx.tracker.close();
        self.ctx.tracker.wait().await;
        info!("All switches stopped");
    }
}

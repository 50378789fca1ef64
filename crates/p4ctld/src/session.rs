//! Per-switch session supervision.
//!
//! A [`SwitchSession`] drives one switch through
//! connect → arbitrate → configure → provision → run.
//!
//! [`SwitchSession::establish`] performs the setup once and never retries.
//! After a successful setup three detached tasks run for the session: the
//! client's own stream task, the [`StreamDispatcher`] and the supervisory
//! run loop. The run loop waits on shutdown, the session's fault slot and a
//! periodic tick. The first fault tears the session down and hands over to
//! the reconnection loop, which re-runs the setup until it succeeds or the
//! restart counter reaches `session.max_retry`.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sonic_p4rt::{
    InboundEvent, P4RuntimeClient, P4RuntimeConnector, SessionStreams, TlsMaterial,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, trace, Instrument, Span};

use crate::config::ControllerConfig;
use crate::dispatcher::StreamDispatcher;
use crate::error::{ConfigError, SetupError};
use crate::fault::{fault_slot, FaultReporter, FaultSlot};
use crate::links::LinkSource;
use crate::pipeline::ForwardingPipeline;
use crate::provisioner::ConfigProvisioner;
use crate::sampler::PeriodicSampler;

/// Derives the address of a switch: the base port plus the device id.
pub fn session_address(
    base_address: IpAddr,
    base_port: u16,
    device_id: u64,
) -> Result<SocketAddr, SetupError> {
    u16::try_from(device_id)
        .ok()
        .and_then(|offset| base_port.checked_add(offset))
        .map(|port| SocketAddr::new(base_address, port))
        .ok_or(SetupError::Address {
            device_id,
            base_port,
        })
}

/// Lifecycle of a switch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Never established.
    Idle,
    /// Established and supervised.
    Running,
    /// Torn down after a fault, re-establishment in progress.
    Reconnecting {
        /// Current value of the restart counter.
        attempt: u32,
    },
    /// Retries exhausted. The session is never re-armed.
    Abandoned,
    /// Stopped by process shutdown.
    Stopped,
}

/// Process-wide collaborators shared by every session.
#[derive(Clone)]
pub struct SessionContext {
    /// Validated controller configuration.
    pub config: Arc<ControllerConfig>,
    /// Opens a fresh channel for every setup attempt.
    pub connector: Arc<dyn P4RuntimeConnector>,
    /// Process-wide shutdown signal.
    pub shutdown: CancellationToken,
    /// Tracks every detached task so shutdown can wait for them.
    pub tracker: TaskTracker,
}

impl SessionContext {
    /// Validates `config` and creates a context with a fresh shutdown
    /// token and tracker.
    pub fn new(
        config: Arc<ControllerConfig>,
        connector: Arc<dyn P4RuntimeConnector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            config,
            connector,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        })
    }
}

/// The running session, cleared on teardown.
struct ActiveSession {
    client: Arc<dyn P4RuntimeClient>,
    faults: FaultReporter,
    token: CancellationToken,
}

/// Output of a successful setup, not yet started.
struct Established {
    client: Arc<dyn P4RuntimeClient>,
    faults: FaultReporter,
    slot: FaultSlot,
    events: mpsc::Receiver<InboundEvent>,
    token: CancellationToken,
}

struct Shared {
    device_id: u64,
    addr: SocketAddr,
    pipeline: Arc<ForwardingPipeline>,
    restarts: AtomicU32,
    links: RwLock<Arc<dyn LinkSource>>,
    active: Mutex<Option<ActiveSession>>,
    status: watch::Sender<SessionStatus>,
    provisioner: ConfigProvisioner,
    sampler: PeriodicSampler,
    ctx: SessionContext,
    span: Span,
}

/// Supervisor of one switch.
///
/// Cloning is cheap; clones refer to the same session.
#[derive(Clone)]
pub struct SwitchSession {
    shared: Arc<Shared>,
}

impl SwitchSession {
    /// Creates an idle session for `device_id`.
    pub fn new(
        device_id: u64,
        pipeline: Arc<ForwardingPipeline>,
        links: Arc<dyn LinkSource>,
        ctx: SessionContext,
    ) -> Result<Self, SetupError> {
        let config = &ctx.config;
        let addr = session_address(
            config.connection.base_address,
            config.connection.base_port,
            device_id,
        )?;
        let (status, _) = watch::channel(SessionStatus::Idle);

        Ok(Self {
            shared: Arc::new(Shared {
                device_id,
                addr,
                pipeline,
                restarts: AtomicU32::new(0),
                links: RwLock::new(links),
                active: Mutex::new(None),
                status,
                provisioner: ConfigProvisioner::new(&config.provisioning),
                sampler: PeriodicSampler::new(&config.sampler, config.session.ports),
                span: info_span!("switch", device_id),
                ctx,
            }),
        })
    }

    /// Device identifier.
    pub fn device_id(&self) -> u64 {
        self.shared.device_id
    }

    /// Address the session dials.
    pub fn address(&self) -> SocketAddr {
        self.shared.addr
    }

    /// Current restart counter.
    pub fn restarts(&self) -> u32 {
        self.shared.restarts.load(Ordering::SeqCst)
    }

    /// Subscribes to status changes.
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.shared.status.subscribe()
    }

    /// Returns true while a session is established.
    pub fn is_active(&self) -> bool {
        self.shared.active.lock().is_some()
    }

    /// Runs the setup sequence once and starts supervision.
    ///
    /// A failure is returned to the caller and schedules nothing: only
    /// faults seen after a successful call lead to reconnection.
    pub async fn establish(&self) -> Result<(), SetupError> {
        let established = self
            .configure()
            .instrument(self.shared.span.clone())
            .await?;
        self.start(established);
        Ok(())
    }

    /// Replaces the link source and re-provisions the active session.
    ///
    /// Later reconnections provision from the new source too. Returns the
    /// number of entries installed, or `None` when no session is active.
    pub async fn apply_links(&self, links: Arc<dyn LinkSource>) -> Option<usize> {
        *self.shared.links.write() = links.clone();

        let (client, faults) = {
            let active = self.shared.active.lock();
            let active = active.as_ref()?;
            (active.client.clone(), active.faults.clone())
        };

        let installed = self
            .shared
            .provisioner
            .provision(
                self.shared.device_id,
                links.as_ref(),
                client.as_ref(),
                &faults,
            )
            .instrument(self.shared.span.clone())
            .await;
        Some(installed)
    }

    async fn configure(&self) -> Result<Established, SetupError> {
        let shared = &self.shared;
        let config = &shared.ctx.config;

        info!(addr = %shared.addr, "Connecting to server");
        let cert_path = &config.connection.cert_path;
        let tls = TlsMaterial::load(cert_path).map_err(|e| SetupError::Credentials {
            path: cert_path.clone(),
            source: e,
        })?;

        let client = shared
            .ctx
            .connector
            .dial(shared.addr, shared.device_id, &tls)
            .await
            .map_err(|e| SetupError::Dial {
                addr: shared.addr.to_string(),
                source: e,
            })?;

        let version = client
            .capabilities()
            .await
            .map_err(SetupError::Capabilities)?;
        info!(%version, "Connected, runtime version");

        // Cancelled on every early return below.
        let token = shared.ctx.shutdown.child_token();
        let guard = token.clone().drop_guard();

        let SessionStreams {
            mut arbitration,
            events,
        } = client
            .start_session(config.election_id(), token.clone())
            .await
            .map_err(SetupError::Session)?;

        let mastership = tokio::select! {
            biased;
            _ = shared.ctx.shutdown.cancelled() => return Err(SetupError::Cancelled),
            status = arbitration.recv() => status,
        };
        match mastership {
            Some(status) if status.is_primary() => debug!("We are the primary client"),
            Some(_) => return Err(SetupError::NotPrimary),
            None => return Err(SetupError::ArbitrationClosed),
        }

        tokio::select! {
            biased;
            _ = shared.ctx.shutdown.cancelled() => return Err(SetupError::Cancelled),
            _ = tokio::time::sleep(config.settle_delay()) => {}
        }
        client
            .set_forwarding_pipeline(&shared.pipeline.device_config, &shared.pipeline.p4info, 0)
            .await
            .map_err(SetupError::Pipeline)?;
        debug!("Forwarding pipeline set");
        self.check_shutdown()?;

        let digest = &config.digest.name;
        client
            .enable_digest(digest, config.digest_config())
            .await
            .map_err(|e| SetupError::Digest {
                name: digest.clone(),
                source: e,
            })?;
        debug!(%digest, "Enabled digest");
        self.check_shutdown()?;

        let (faults, slot) = fault_slot();
        let links = shared.links.read().clone();
        let installed = shared
            .provisioner
            .provision(shared.device_id, links.as_ref(), client.as_ref(), &faults)
            .await;
        debug!(installed, "Switch configured");

        Ok(Established {
            client,
            faults,
            slot,
            events,
            token: guard.disarm(),
        })
    }

    fn check_shutdown(&self) -> Result<(), SetupError> {
        if self.shared.ctx.shutdown.is_cancelled() {
            return Err(SetupError::Cancelled);
        }
        Ok(())
    }

    fn start(&self, established: Established) {
        let Established {
            client,
            faults,
            slot,
            events,
            token,
        } = established;
        let shared = &self.shared;

        let previous = shared.active.lock().replace(ActiveSession {
            client: client.clone(),
            faults: faults.clone(),
            token: token.clone(),
        });
        if let Some(previous) = previous {
            previous.token.cancel();
        }
        shared.status.send_replace(SessionStatus::Running);

        let dispatcher =
            StreamDispatcher::new(client.clone(), faults.clone(), shared.ctx.config.grace_period());
        shared.ctx.tracker.spawn(
            dispatcher
                .run(events, token.clone())
                .instrument(shared.span.clone()),
        );

        let session = self.clone();
        shared.ctx.tracker.spawn(
            session
                .run(client, faults, slot, token)
                .instrument(shared.span.clone()),
        );
    }

    /// Supervisory loop: shutdown, then fault, then periodic tick.
    ///
    /// At most one sample runs at a time, and it stops with the session.
    async fn run(
        self,
        client: Arc<dyn P4RuntimeClient>,
        faults: FaultReporter,
        mut slot: FaultSlot,
        token: CancellationToken,
    ) {
        let shared = &self.shared;
        let period = shared.ctx.config.sample_interval();
        let mut ticker = (shared.ctx.config.sampler.enabled && !period.is_zero()).then(|| {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        let mut sampling: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                biased;
                _ = shared.ctx.shutdown.cancelled() => {
                    self.teardown(&token);
                    shared.status.send_replace(SessionStatus::Stopped);
                    info!("Stopping");
                    return;
                }
                _ = token.cancelled() => {
                    debug!("Session replaced, stopping supervision");
                    return;
                }
                Some(fault) = slot.wait() => {
                    error!(error = %fault, "Session fault");
                    self.teardown(&token);
                    let session = self.clone();
                    shared
                        .ctx
                        .tracker
                        .spawn(session.reconnect().instrument(shared.span.clone()));
                    return;
                }
                _ = next_tick(&mut ticker) => {
                    if sampling.as_ref().is_some_and(|task| !task.is_finished()) {
                        debug!("Previous sample still running, skipping tick");
                        continue;
                    }

                    let session = self.clone();
                    let client = client.clone();
                    let faults = faults.clone();
                    let token = token.clone();
                    sampling = Some(shared.ctx.tracker.spawn(
                        async move {
                            tokio::select! {
                                biased;
                                _ = token.cancelled() => debug!("Sample interrupted by teardown"),
                                ports = session.shared.sampler.sample(client.as_ref(), &faults) => {
                                    trace!(ports, "Sample done");
                                }
                            }
                        }
                        .instrument(shared.span.clone()),
                    ));
                }
            }
        }
    }

    fn teardown(&self, token: &CancellationToken) {
        token.cancel();
        self.shared.active.lock().take();
    }

    /// Re-runs the setup until it succeeds or the retry ceiling is reached.
    async fn reconnect(self) {
        let shared = &self.shared;
        let max_retry = shared.ctx.config.session.max_retry;

        loop {
            if shared.ctx.shutdown.is_cancelled() {
                shared.status.send_replace(SessionStatus::Stopped);
                return;
            }

            let restarts = shared.restarts.load(Ordering::SeqCst);
            if restarts >= max_retry {
                error!(restarts, max_retry, "Max retry attempt, abandoning switch");
                shared.status.send_replace(SessionStatus::Abandoned);
                return;
            }

            let attempt = restarts + 1;
            shared.restarts.store(attempt, Ordering::SeqCst);
            shared
                .status
                .send_replace(SessionStatus::Reconnecting { attempt });
            info!(attempt, "Reconnect attempt");

            match self.configure().await {
                Ok(established) => {
                    shared.restarts.store(0, Ordering::SeqCst);
                    self.start(established);
                    info!(attempt, "Reconnected");
                    return;
                }
                Err(e) => {
                    error!(attempt, stage = e.stage(), error = %e, "Reconnect attempt failed");
                    tokio::select! {
                        biased;
                        _ = shared.ctx.shutdown.cancelled() => {}
                        _ = tokio::time::sleep(shared.ctx.config.reconnect_delay()) => {}
                    }
                }
            }
        }
    }
}

/// Waits for the next sampler tick, forever when sampling is off.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

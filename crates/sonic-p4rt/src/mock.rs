//! Scriptable in-memory connector and client.
//!
//! Each dial consumes the next queued [`MockBehavior`] (falling back to the
//! connector default) and produces a [`MockClient`] that records every call
//! it receives. Tests push stream events through [`MockClient::push_event`].

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::{P4RuntimeClient, P4RuntimeConnector, SessionStreams};
use crate::error::{ClientError, ClientResult};
use crate::tls::TlsMaterial;
use crate::types::{
    CounterData, DigestConfig, DigestList, ElectionId, InboundEvent, MastershipStatus, TableEntry,
};

/// Depth of the inbound event queue of a mock session.
const EVENT_QUEUE_DEPTH: usize = 1000;

/// How a mock client answers each primitive.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// Fail the dial itself.
    pub fail_dial: bool,
    /// Fail the capabilities query.
    pub fail_capabilities: bool,
    /// First arbitration update; `None` closes the arbitration stream unanswered.
    pub mastership: Option<MastershipStatus>,
    /// Fail the pipeline push.
    pub fail_pipeline: bool,
    /// Fail enabling the digest.
    pub fail_digest: bool,
    /// Zero-based index of the table insert that fails.
    pub fail_insert_at: Option<usize>,
    /// Fail digest acknowledgements.
    pub fail_ack: bool,
    /// Digest acknowledgements never complete.
    pub stall_ack: bool,
    /// Counter index whose read fails.
    pub fail_counter_read: Option<i64>,
    /// Counter index whose write fails.
    pub fail_counter_write: Option<i64>,
    /// Counter reads never complete.
    pub stall_counter_read: bool,
    /// Packet count returned by counter reads.
    pub packet_count: i64,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            fail_dial: false,
            fail_capabilities: false,
            mastership: Some(MastershipStatus::Primary),
            fail_pipeline: false,
            fail_digest: false,
            fail_insert_at: None,
            fail_ack: false,
            stall_ack: false,
            fail_counter_read: None,
            fail_counter_write: None,
            stall_counter_read: false,
            packet_count: 0,
        }
    }
}

impl MockBehavior {
    /// A behavior whose dial fails.
    pub fn unreachable() -> Self {
        Self {
            fail_dial: true,
            ..Self::default()
        }
    }

    /// A behavior that loses arbitration.
    pub fn backup() -> Self {
        Self {
            mastership: Some(MastershipStatus::Backup),
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct ConnectorState {
    plans: VecDeque<MockBehavior>,
    dials: Vec<SocketAddr>,
    certificates: Vec<usize>,
    clients: Vec<Arc<MockClient>>,
}

/// Connector producing [`MockClient`]s.
pub struct MockConnector {
    default: MockBehavior,
    state: Mutex<ConnectorState>,
}

impl MockConnector {
    /// Creates a connector whose dials use `default` unless a plan is queued.
    pub fn new(default: MockBehavior) -> Self {
        Self {
            default,
            state: Mutex::new(ConnectorState::default()),
        }
    }

    /// Queues the behavior for the next unplanned dial.
    pub fn push_plan(&self, behavior: MockBehavior) {
        self.state.lock().plans.push_back(behavior);
    }

    /// Number of dials attempted so far.
    pub fn dial_count(&self) -> usize {
        self.state.lock().dials.len()
    }

    /// Number of certificates handed to each dial, in order.
    pub fn dial_certificates(&self) -> Vec<usize> {
        self.state.lock().certificates.clone()
    }

    /// Addresses dialed, in order.
    pub fn dialed(&self) -> Vec<SocketAddr> {
        self.state.lock().dials.clone()
    }

    /// Clients handed out so far.
    pub fn clients(&self) -> Vec<Arc<MockClient>> {
        self.state.lock().clients.clone()
    }

    /// The most recently created client.
    pub fn last_client(&self) -> Option<Arc<MockClient>> {
        self.state.lock().clients.last().cloned()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new(MockBehavior::default())
    }
}

#[async_trait]
impl P4RuntimeConnector for MockConnector {
    async fn dial(
        &self,
        addr: SocketAddr,
        device_id: u64,
        tls: &TlsMaterial,
    ) -> ClientResult<Arc<dyn P4RuntimeClient>> {
        let mut state = self.state.lock();
        state.dials.push(addr);
        state.certificates.push(tls.certificates().len());
        let behavior = state.plans.pop_front().unwrap_or_else(|| self.default.clone());

        if behavior.fail_dial {
            return Err(ClientError::Unavailable(format!("connection refused: {}", addr)));
        }

        let client = Arc::new(MockClient::new(device_id, behavior));
        state.clients.push(Arc::clone(&client));
        Ok(client)
    }
}

#[derive(Default)]
struct ClientLog {
    session: Option<(ElectionId, CancellationToken)>,
    events: Option<mpsc::Sender<InboundEvent>>,
    pipelines: Vec<(Vec<u8>, Vec<u8>, u64)>,
    digests: Vec<(String, DigestConfig)>,
    insert_attempts: usize,
    inserted: Vec<TableEntry>,
    acked: Vec<DigestList>,
    counter_reads: Vec<(String, i64)>,
    counter_writes: Vec<(String, i64, CounterData)>,
}

/// Recording client with scripted failures.
pub struct MockClient {
    device_id: u64,
    behavior: MockBehavior,
    log: Arc<Mutex<ClientLog>>,
}

impl MockClient {
    /// Creates a standalone client.
    pub fn new(device_id: u64, behavior: MockBehavior) -> Self {
        Self {
            device_id,
            behavior,
            log: Arc::new(Mutex::new(ClientLog::default())),
        }
    }

    /// Device this client is bound to.
    pub fn device_id(&self) -> u64 {
        self.device_id
    }

    /// Delivers an event on the stream session.
    ///
    /// Returns false when no session is running or it has been torn down.
    pub async fn push_event(&self, event: InboundEvent) -> bool {
        let sender = self.log.lock().events.clone();
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Ends the stream session from the switch side.
    pub fn close_stream(&self) {
        self.log.lock().events = None;
    }

    /// Returns true once a session was started.
    pub fn session_started(&self) -> bool {
        self.log.lock().session.is_some()
    }

    /// Returns true once the session cancellation token fired.
    pub fn session_cancelled(&self) -> bool {
        self.log
            .lock()
            .session
            .as_ref()
            .is_some_and(|(_, token)| token.is_cancelled())
    }

    /// Election id used to start the session.
    pub fn election_id(&self) -> Option<ElectionId> {
        self.log.lock().session.as_ref().map(|(id, _)| *id)
    }

    /// Pipelines pushed as (device config, p4info, cookie).
    pub fn pipelines(&self) -> Vec<(Vec<u8>, Vec<u8>, u64)> {
        self.log.lock().pipelines.clone()
    }

    /// Digests enabled with their configuration.
    pub fn digests(&self) -> Vec<(String, DigestConfig)> {
        self.log.lock().digests.clone()
    }

    /// Number of insert calls received, failed ones included.
    pub fn insert_attempts(&self) -> usize {
        self.log.lock().insert_attempts
    }

    /// Entries successfully inserted.
    pub fn inserted(&self) -> Vec<TableEntry> {
        self.log.lock().inserted.clone()
    }

    /// Digest lists acknowledged.
    pub fn acked(&self) -> Vec<DigestList> {
        self.log.lock().acked.clone()
    }

    /// Counter reads as (counter, index).
    pub fn counter_reads(&self) -> Vec<(String, i64)> {
        self.log.lock().counter_reads.clone()
    }

    /// Counter writes as (counter, index, data).
    pub fn counter_writes(&self) -> Vec<(String, i64, CounterData)> {
        self.log.lock().counter_writes.clone()
    }
}

#[async_trait]
impl P4RuntimeClient for MockClient {
    async fn capabilities(&self) -> ClientResult<String> {
        if self.behavior.fail_capabilities {
            return Err(ClientError::rpc("Capabilities", "UNIMPLEMENTED"));
        }
        Ok("1.3.0".to_string())
    }

    async fn start_session(
        &self,
        election_id: ElectionId,
        cancel: CancellationToken,
    ) -> ClientResult<SessionStreams> {
        let (arb_tx, arbitration) = mpsc::channel(1);
        let (event_tx, events) = mpsc::channel(EVENT_QUEUE_DEPTH);

        // Capacity 1 and a fresh channel: the send cannot fail.
        let arb_tx = self.behavior.mastership.map(|status| {
            let _ = arb_tx.try_send(status);
            arb_tx
        });

        {
            let mut log = self.log.lock();
            log.session = Some((election_id, cancel.clone()));
            log.events = Some(event_tx);
        }

        // The stream ends once the controller cancels the session. Holding the
        // arbitration sender until then keeps the channel open like a real
        // session would.
        let log = Arc::clone(&self.log);
        tokio::spawn(async move {
            cancel.cancelled().await;
            drop(arb_tx);
            log.lock().events = None;
        });

        Ok(SessionStreams {
            arbitration,
            events,
        })
    }

    async fn set_forwarding_pipeline(
        &self,
        device_config: &[u8],
        p4info: &[u8],
        cookie: u64,
    ) -> ClientResult<()> {
        if self.behavior.fail_pipeline {
            return Err(ClientError::rpc(
                "SetForwardingPipelineConfig",
                "INVALID_ARGUMENT",
            ));
        }
        self.log
            .lock()
            .pipelines
            .push((device_config.to_vec(), p4info.to_vec(), cookie));
        Ok(())
    }

    async fn enable_digest(&self, name: &str, config: DigestConfig) -> ClientResult<()> {
        if self.behavior.fail_digest {
            return Err(ClientError::not_found("digest", name));
        }
        self.log.lock().digests.push((name.to_string(), config));
        Ok(())
    }

    async fn insert_table_entry(&self, entry: TableEntry) -> ClientResult<()> {
        let mut log = self.log.lock();
        let index = log.insert_attempts;
        log.insert_attempts += 1;
        if self.behavior.fail_insert_at == Some(index) {
            return Err(ClientError::rpc("Write", "ALREADY_EXISTS"));
        }
        log.inserted.push(entry);
        Ok(())
    }

    async fn ack_digest_list(&self, list: &DigestList) -> ClientResult<()> {
        if self.behavior.fail_ack {
            return Err(ClientError::SessionClosed);
        }
        if self.behavior.stall_ack {
            std::future::pending::<()>().await;
        }
        self.log.lock().acked.push(list.clone());
        Ok(())
    }

    async fn read_counter(&self, name: &str, index: i64) -> ClientResult<CounterData> {
        self.log.lock().counter_reads.push((name.to_string(), index));
        if self.behavior.fail_counter_read == Some(index) {
            return Err(ClientError::rpc("Read", "UNAVAILABLE"));
        }
        if self.behavior.stall_counter_read {
            std::future::pending::<()>().await;
        }
        Ok(CounterData {
            packet_count: self.behavior.packet_count,
            byte_count: self.behavior.packet_count * 64,
        })
    }

    async fn write_counter(&self, name: &str, index: i64, data: CounterData) -> ClientResult<()> {
        if self.behavior.fail_counter_write == Some(index) {
            return Err(ClientError::rpc("Write", "UNAVAILABLE"));
        }
        self.log
            .lock()
            .counter_writes
            .push((name.to_string(), index, data));
        Ok(())
    }
}

//! Session primitives consumed by the controller.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ClientResult;
use crate::tls::TlsMaterial;
use crate::types::{
    CounterData, DigestConfig, DigestList, ElectionId, InboundEvent, MastershipStatus, TableEntry,
};

/// Receivers handed out when a stream session starts.
///
/// The client keeps the session alive in its own task until the
/// cancellation token passed to [`P4RuntimeClient::start_session`] fires,
/// after which both receivers are exhausted.
#[derive(Debug)]
pub struct SessionStreams {
    /// Mastership updates, first one answers the initial arbitration.
    pub arbitration: mpsc::Receiver<MastershipStatus>,
    /// All other stream messages in arrival order.
    pub events: mpsc::Receiver<InboundEvent>,
}

/// Opens RPC channels to switches.
///
/// A new channel is dialed for every session attempt; channels are never
/// shared between switches or reused across attempts.
#[async_trait]
pub trait P4RuntimeConnector: Send + Sync {
    /// Dials `addr` with the given TLS material and returns a client bound
    /// to `device_id`.
    async fn dial(
        &self,
        addr: SocketAddr,
        device_id: u64,
        tls: &TlsMaterial,
    ) -> ClientResult<Arc<dyn P4RuntimeClient>>;
}

/// A P4Runtime client bound to one device on one channel.
#[async_trait]
pub trait P4RuntimeClient: Send + Sync {
    /// Queries the P4Runtime API version implemented by the target.
    async fn capabilities(&self) -> ClientResult<String>;

    /// Starts the stream session with the given election id.
    async fn start_session(
        &self,
        election_id: ElectionId,
        cancel: CancellationToken,
    ) -> ClientResult<SessionStreams>;

    /// Pushes the forwarding pipeline (device config + P4Info).
    async fn set_forwarding_pipeline(
        &self,
        device_config: &[u8],
        p4info: &[u8],
        cookie: u64,
    ) -> ClientResult<()>;

    /// Enables delivery of the named digest.
    async fn enable_digest(&self, name: &str, config: DigestConfig) -> ClientResult<()>;

    /// Inserts a table entry.
    async fn insert_table_entry(&self, entry: TableEntry) -> ClientResult<()>;

    /// Acknowledges a digest list.
    async fn ack_digest_list(&self, list: &DigestList) -> ClientResult<()>;

    /// Reads one cell of an indirect counter.
    async fn read_counter(&self, name: &str, index: i64) -> ClientResult<CounterData>;

    /// Overwrites one cell of an indirect counter.
    async fn write_counter(&self, name: &str, index: i64, data: CounterData) -> ClientResult<()>;
}

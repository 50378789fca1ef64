//! Vendor-neutral P4Runtime session interface.
//!
//! This crate describes the session primitives a P4 switch controller
//! consumes from a P4Runtime client library, without implementing the wire
//! protocol itself:
//!
//! - [`types`]: Stream messages, table entries, digests and counters
//! - [`client`]: The [`P4RuntimeConnector`] and [`P4RuntimeClient`] traits
//! - [`tls`]: PEM certificate material handed to a connector
//! - [`error`]: Error type returned by client operations
//!
//! A concrete client (gRPC transport, protobuf encoding, TLS handshake)
//! lives outside this workspace and plugs in by implementing the traits.
//!
//! # Example
//!
//! ```ignore
//! use sonic_p4rt::{P4RuntimeClient, TableAction, TableEntry, FieldMatch};
//!
//! async fn add_route(client: &dyn P4RuntimeClient) -> sonic_p4rt::ClientResult<()> {
//!     let entry = TableEntry::new(
//!         "MyIngress.ipv4_lpm",
//!         vec![FieldMatch::lpm(vec![10, 0, 1, 1], 32)],
//!         TableAction::direct("MyIngress.ipv4_forward", vec![vec![8, 0, 0, 0, 1, 17], vec![1]]),
//!     );
//!     client.insert_table_entry(entry).await
//! }
//! ```

pub mod client;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod tls;
pub mod types;

pub use client::{P4RuntimeClient, P4RuntimeConnector, SessionStreams};
pub use error::{ClientError, ClientResult};
pub use tls::TlsMaterial;
pub use types::{
    CounterData, DigestConfig, DigestEntry, DigestList, ElectionId, FieldMatch,
    IdleTimeoutNotification, InboundEvent, MastershipStatus, PacketIn, StreamError, TableAction,
    TableEntry,
};

//! P4Runtime data types exchanged between the controller and a client.
//!
//! These mirror the subset of the P4Runtime v1 messages the controller
//! needs. Byte strings are canonical P4Runtime bitstrings (big-endian,
//! shortest representation).

use std::fmt;

/// Election identifier used to order competing mastership claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ElectionId {
    /// High 64 bits
    pub high: u64,
    /// Low 64 bits
    pub low: u64,
}

impl ElectionId {
    /// Creates a new election identifier.
    pub const fn new(high: u64, low: u64) -> Self {
        Self { high, low }
    }
}

impl fmt::Display for ElectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.high, self.low)
    }
}

/// Outcome of a mastership arbitration update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MastershipStatus {
    /// This controller is the primary and may write configuration.
    Primary,
    /// Another controller holds mastership.
    Backup,
}

impl MastershipStatus {
    /// Returns true for [`MastershipStatus::Primary`].
    pub fn is_primary(&self) -> bool {
        matches!(self, MastershipStatus::Primary)
    }
}


/// A packet sent from the switch to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PacketIn {
    /// Raw packet bytes.
    pub payload: Vec<u8>,
    /// Packet metadata as (metadata id, value) pairs.
    pub metadata: Vec<(u32, Vec<u8>)>,
}

/// One digest message: the members of the digest struct, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DigestEntry {
    /// Struct members as bitstrings.
    pub members: Vec<Vec<u8>>,
}

impl DigestEntry {
    /// Creates a digest entry from its struct members.
    pub fn new(members: Vec<Vec<u8>>) -> Self {
        Self { members }
    }

    /// Returns the bitstring of the member at `index`, if present.
    pub fn member(&self, index: usize) -> Option<&[u8]> {
        self.members.get(index).map(Vec::as_slice)
    }
}

/// A batch of digest messages, acknowledged as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DigestList {
    /// P4Info id of the digest.
    pub digest_id: u32,
    /// List identifier echoed back in the acknowledgement.
    pub list_id: u64,
    /// Digest entries in arrival order.
    pub data: Vec<DigestEntry>,
    /// Generation timestamp (ns).
    pub timestamp: i64,
}

/// Notification that table entries expired on the switch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdleTimeoutNotification {
    /// Number of expired entries.
    pub entries: usize,
    /// Generation timestamp (ns).
    pub timestamp: i64,
}

/// Error reported by the switch on the stream channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamError {
    /// Canonical status code.
    pub code: i32,
    /// Human readable message.
    pub message: String,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code {}: {}", self.code, self.message)
    }
}

/// A message received on the bidirectional stream channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Packet punted to the controller.
    PacketIn(PacketIn),
    /// Digest batch.
    Digest(DigestList),
    /// Idle timeout notification.
    IdleTimeout(IdleTimeoutNotification),
    /// Stream-level error.
    Error(StreamError),
    /// Any update the client library does not map to a known kind.
    Other {
        /// Update kind as reported by the client.
        kind: String,
    },
}

impl InboundEvent {
    /// Returns a short name for the event kind.
    pub fn kind(&self) -> &str {
        match self {
            InboundEvent::PacketIn(_) => "packet",
            InboundEvent::Digest(_) => "digest",
            InboundEvent::IdleTimeout(_) => "idle_timeout_notification",
            InboundEvent::Error(_) => "error",
            InboundEvent::Other { kind } => kind,
        }
    }
}

/// Digest delivery configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestConfig {
    /// Maximum time the switch may coalesce digests before sending (ns).
    pub max_timeout_ns: i64,
    /// Maximum number of digests per list.
    pub max_list_size: i32,
    /// Time the switch waits for an acknowledgement (ns).
    pub ack_timeout_ns: i64,
}

/// A match field of a table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMatch {
    /// Longest-prefix match.
    Lpm {
        /// Prefix value.
        value: Vec<u8>,
        /// Prefix length in bits.
        prefix_len: i32,
    },
}

impl FieldMatch {
    /// Creates a longest-prefix match field.
    pub fn lpm(value: Vec<u8>, prefix_len: i32) -> Self {
        FieldMatch::Lpm { value, prefix_len }
    }
}

/// Action bound to a table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableAction {
    /// A direct action with positional parameters.
    Direct {
        /// Fully qualified action name.
        name: String,
        /// Action parameters in declaration order.
        params: Vec<Vec<u8>>,
    },
}

impl TableAction {
    /// Builds a direct action.
    pub fn direct(name: impl Into<String>, params: Vec<Vec<u8>>) -> Self {
        TableAction::Direct {
            name: name.into(),
            params,
        }
    }
}

/// A table entry ready to be written to the switch.
///
/// Names are resolved to P4Info ids by the client at write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    /// Fully qualified table name.
    pub table: String,
    /// Match fields in key order.
    pub matches: Vec<FieldMatch>,
    /// Bound action.
    pub action: TableAction,
}

impl TableEntry {
    /// Builds a table entry.
    pub fn new(table: impl Into<String>, matches: Vec<FieldMatch>, action: TableAction) -> Self {
        Self {
            table: table.into(),
            matches,
            action,
        }
    }
}

/// Indirect counter cell contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterData {
    /// Packet count.
    pub packet_count: i64,
    /// Byte count.
    pub byte_count: i64,
}

impl CounterData {
    /// Counter data with both counts zeroed.
    pub const ZERO: CounterData = CounterData {
        packet_count: 0,
        byte_count: 0,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mastership_is_primary() {
        assert!(MastershipStatus::Primary.is_primary());
        assert!(!MastershipStatus::Backup.is_primary());
    }

    #[test]
    fn test_election_id_display() {
        assert_eq!(ElectionId::new(0, 1).to_string(), "0:1");
    }

    #[test]
    fn test_table_entry_builder() {
        let entry = TableEntry::new(
            "MyIngress.ipv4_lpm",
            vec![FieldMatch::lpm(vec![10, 0, 1, 1], 32)],
            TableAction::direct("MyIngress.ipv4_forward", vec![vec![1]]),
        );

        assert_eq!(entry.table, "MyIngress.ipv4_lpm");
        assert_eq!(
            entry.matches,
            vec![FieldMatch::Lpm {
                value: vec![10, 0, 1, 1],
                prefix_len: 32
            }]
        );
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(InboundEvent::PacketIn(PacketIn::default()).kind(), "packet");
        assert_eq!(InboundEvent::Digest(DigestList::default()).kind(), "digest");
        assert_eq!(
            InboundEvent::Other {
                kind: "arbitration".to_string()
            }
            .kind(),
            "arbitration"
        );
    }

    #[test]
    fn test_digest_entry_member() {
        let entry = DigestEntry::new(vec![vec![1], vec![2, 3]]);
        assert_eq!(entry.member(1), Some(&[2u8, 3][..]));
        assert_eq!(entry.member(2), None);
    }
}

//! Flow digest decoding and acknowledgement.
//!
//! The digest struct carries three members:
//!
//! | Index | Member | Encoding |
//! |-------|--------|----------|
//! | 0 | flow id | opaque bitstring |
//! | 1 | opposite flow id | opaque bitstring |
//! | 2 | threshold | big-endian, 1 or 2 bytes |
//!
//! P4Runtime bitstrings use the shortest encoding, so a threshold below 256
//! arrives as a single byte.

use sonic_p4rt::{DigestEntry, DigestList, P4RuntimeClient};
use tracing::{debug, trace, warn};

use crate::error::{DigestError, Fault};
use crate::fault::FaultReporter;

const FLOW_MEMBER: usize = 0;
const OPPOSITE_FLOW_MEMBER: usize = 1;
const THRESHOLD_MEMBER: usize = 2;

/// A decoded flow digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowDigest {
    /// Flow identifier.
    pub flow_id: Vec<u8>,
    /// Identifier of the flow in the opposite direction.
    pub opposite_flow_id: Vec<u8>,
    /// Threshold reached by the flow.
    pub threshold: u16,
}

/// Decodes a threshold bitstring.
///
/// One byte is the low byte of a zero-extended `u16`; two bytes are a
/// big-endian `u16`. Any other width is rejected.
pub fn decode_threshold(raw: &[u8]) -> Result<u16, DigestError> {
    match *raw {
        [lo] => Ok(u16::from_be_bytes([0, lo])),
        [hi, lo] => Ok(u16::from_be_bytes([hi, lo])),
        _ => Err(DigestError::ThresholdWidth { len: raw.len() }),
    }
}

/// Decodes one digest entry.
pub fn decode(entry: &DigestEntry) -> Result<FlowDigest, DigestError> {
    let member = |index| {
        entry
            .member(index)
            .ok_or(DigestError::MissingMember { index })
    };

    Ok(FlowDigest {
        flow_id: member(FLOW_MEMBER)?.to_vec(),
        opposite_flow_id: member(OPPOSITE_FLOW_MEMBER)?.to_vec(),
        threshold: decode_threshold(member(THRESHOLD_MEMBER)?)?,
    })
}

/// Decodes every entry of `list`, then acknowledges the list once.
///
/// Undecodable entries are logged and skipped. An acknowledgement failure
/// is reported as a session fault.
pub async fn handle_digest_list(
    client: &dyn P4RuntimeClient,
    list: &DigestList,
    faults: &FaultReporter,
) -> Vec<FlowDigest> {
    let mut decoded = Vec::with_capacity(list.data.len());

    for (position, entry) in list.data.iter().enumerate() {
        match decode(entry) {
            Ok(digest) => {
                debug!(
                    flow = ?digest.flow_id,
                    flow_opp = ?digest.opposite_flow_id,
                    threshold = digest.threshold,
                    "Flow digest"
                );
                decoded.push(digest);
            }
            Err(e) => {
                warn!(list_id = list.list_id, position, error = %e, "Skipping undecodable digest");
            }
        }
    }

    match client.ack_digest_list(list).await {
        Ok(()) => trace!(list_id = list.list_id, "Ack digest list"),
        Err(e) => {
            faults.report(Fault::DigestAck(e));
        }
    }

    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::fault_slot;
    use pretty_assertions::assert_eq;
    use sonic_p4rt::mock::{MockBehavior, MockClient};

    fn entry(threshold: &[u8]) -> DigestEntry {
        DigestEntry::new(vec![vec![0x0a, 0x01], vec![0x0b, 0x02], threshold.to_vec()])
    }

    #[test]
    fn test_single_byte_threshold_is_zero_extended() {
        for b in 0..=u8::MAX {
            assert_eq!(decode_threshold(&[b]).unwrap(), u16::from(b));
        }
    }

    #[test]
    fn test_two_byte_threshold_is_big_endian() {
        for (hi, lo) in [(0u8, 0u8), (0, 5), (1, 0), (0x12, 0x34), (0xff, 0xff)] {
            assert_eq!(
                decode_threshold(&[hi, lo]).unwrap(),
                u16::from(hi) * 256 + u16::from(lo)
            );
        }
    }

    #[test]
    fn test_other_threshold_widths_rejected() {
        assert_eq!(
            decode_threshold(&[]),
            Err(DigestError::ThresholdWidth { len: 0 })
        );
        assert_eq!(
            decode_threshold(&[0, 1, 0]),
            Err(DigestError::ThresholdWidth { len: 3 })
        );
    }

    #[test]
    fn test_decode_entry() {
        let digest = decode(&entry(&[0x05])).unwrap();
        assert_eq!(
            digest,
            FlowDigest {
                flow_id: vec![0x0a, 0x01],
                opposite_flow_id: vec![0x0b, 0x02],
                threshold: 5,
            }
        );

        assert_eq!(decode(&entry(&[0x01, 0x00])).unwrap().threshold, 256);
    }

    #[test]
    fn test_decode_missing_member() {
        let short = DigestEntry::new(vec![vec![1], vec![2]]);
        assert_eq!(
            decode(&short),
            Err(DigestError::MissingMember { index: 2 })
        );
    }

    #[tokio::test]
    async fn test_list_acknowledged_once() {
        let client = MockClient::new(1, MockBehavior::default());
        let (faults, mut slot) = fault_slot();
        let list = DigestList {
            list_id: 7,
            data: vec![entry(&[0x05]), entry(&[0x00, 0x01, 0x02]), entry(&[0x01, 0x00])],
            ..DigestList::default()
        };

        let decoded = handle_digest_list(&client, &list, &faults).await;

        let thresholds: Vec<u16> = decoded.iter().map(|d| d.threshold).collect();
        assert_eq!(thresholds, vec![5, 256]);
        assert_eq!(client.acked(), vec![list]);
        assert!(slot.take().is_none());
    }

    #[tokio::test]
    async fn test_ack_failure_reported() {
        let client = MockClient::new(
            1,
            MockBehavior {
                fail_ack: true,
                ..MockBehavior::default()
            },
        );
        let (faults, mut slot) = fault_slot();
        let list = DigestList {
            data: vec![entry(&[0x05])],
            ..DigestList::default()
        };

        let decoded = handle_digest_list(&client, &list, &faults).await;

        assert_eq!(decoded.len(), 1);
        assert!(matches!(slot.take(), Some(Fault::DigestAck(_))));
    }
}

//! Ordered consumer of inbound stream messages.

use std::sync::Arc;
use std::time::Duration;

use sonic_p4rt::{InboundEvent, P4RuntimeClient};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::digest::handle_digest_list;
use crate::error::Fault;
use crate::fault::FaultReporter;

/// Per-kind count of dispatched events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// PacketIn messages.
    pub packets: u64,
    /// Digest lists.
    pub digest_lists: u64,
    /// Idle timeout notifications.
    pub idle_timeouts: u64,
    /// Stream errors.
    pub errors: u64,
    /// Unrecognized updates.
    pub unknown: u64,
}

/// Dispatches the events of one session, one at a time, in arrival order.
pub struct StreamDispatcher {
    client: Arc<dyn P4RuntimeClient>,
    faults: FaultReporter,
    grace: Duration,
    stats: DispatchStats,
}

impl StreamDispatcher {
    /// Creates a dispatcher bound to a session's client and fault slot.
    pub fn new(client: Arc<dyn P4RuntimeClient>, faults: FaultReporter, grace: Duration) -> Self {
        Self {
            client,
            faults,
            grace,
            stats: DispatchStats::default(),
        }
    }

    /// Consumes events until the stream is exhausted or `cancel` fires,
    /// then waits the grace period for in-flight acknowledgements.
    ///
    /// `cancel` also interrupts an event whose handling is still pending.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<InboundEvent>,
        cancel: CancellationToken,
    ) -> DispatchStats {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                event = events.recv() => event,
            };

            let Some(event) = event else {
                break;
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Session cancelled while dispatching");
                    break;
                }
                _ = self.dispatch(event) => {}
            }
        }

        trace!("Closed message channel");
        tokio::time::sleep(self.grace).await;
        self.stats
    }

    /// Handles a single event.
    pub async fn dispatch(&mut self, event: InboundEvent) {
        trace!(kind = event.kind(), "Dispatching stream message");

        match event {
            InboundEvent::PacketIn(packet) => {
                self.stats.packets += 1;
                debug!(len = packet.payload.len(), "Received PacketIn");
            }
            InboundEvent::Digest(list) => {
                self.stats.digest_lists += 1;
                trace!(entries = list.data.len(), "Received DigestList");
                handle_digest_list(self.client.as_ref(), &list, &self.faults).await;
            }
            InboundEvent::IdleTimeout(notification) => {
                self.stats.idle_timeouts += 1;
                debug!(
                    entries = notification.entries,
                    "Received IdleTimeoutNotification"
                );
            }
            InboundEvent::Error(error) => {
                self.stats.errors += 1;
                trace!("Received StreamError");
                self.faults.report(Fault::Stream(error.to_string()));
            }
            InboundEvent::Other { kind } => {
                self.stats.unknown += 1;
                debug!(%kind, "Received unknown stream message");
            }
        }
    }

    /// Counts so far.
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::fault_slot;
    use pretty_assertions::assert_eq;
    use sonic_p4rt::mock::{MockBehavior, MockClient};
    use sonic_p4rt::{DigestEntry, DigestList, IdleTimeoutNotification, PacketIn, StreamError};

    fn digest_list(list_id: u64) -> InboundEvent {
        InboundEvent::Digest(DigestList {
            list_id,
            data: vec![DigestEntry::new(vec![vec![1], vec![2], vec![0x05]])],
            ..DigestList::default()
        })
    }

    fn stream_error(message: &str) -> InboundEvent {
        InboundEvent::Error(StreamError {
            code: 3,
            message: message.to_string(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_in_arrival_order_until_exhausted() {
        let client = Arc::new(MockClient::new(1, MockBehavior::default()));
        let (faults, mut slot) = fault_slot();
        let (tx, rx) = mpsc::channel(16);

        for event in [
            InboundEvent::PacketIn(PacketIn::default()),
            digest_list(1),
            InboundEvent::IdleTimeout(IdleTimeoutNotification::default()),
            digest_list(2),
            InboundEvent::Other {
                kind: "arbitration".to_string(),
            },
        ] {
            tx.send(event).await.unwrap();
        }
        drop(tx);

        let started = tokio::time::Instant::now();
        let dispatcher = StreamDispatcher::new(client.clone(), faults, Duration::from_millis(250));
        let stats = dispatcher.run(rx, CancellationToken::new()).await;

        // Exhaustion is followed by the grace period.
        assert!(started.elapsed() >= Duration::from_millis(250));

        assert_eq!(
            stats,
            DispatchStats {
                packets: 1,
                digest_lists: 2,
                idle_timeouts: 1,
                errors: 0,
                unknown: 1,
            }
        );
        let acked: Vec<u64> = client.acked().iter().map(|l| l.list_id).collect();
        assert_eq!(acked, vec![1, 2]);
        assert!(slot.take().is_none());
    }

    #[tokio::test]
    async fn test_stream_error_reported_once() {
        let client = Arc::new(MockClient::new(1, MockBehavior::default()));
        let (faults, mut slot) = fault_slot();
        let mut dispatcher = StreamDispatcher::new(client, faults, Duration::ZERO);

        dispatcher.dispatch(stream_error("first")).await;
        dispatcher.dispatch(stream_error("second")).await;

        assert_eq!(dispatcher.stats().errors, 2);
        match slot.take() {
            Some(Fault::Stream(msg)) => assert_eq!(msg, "code 3: first"),
            other => panic!("unexpected slot content: {:?}", other),
        }
        assert!(slot.take().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_consumption() {
        let client = Arc::new(MockClient::new(1, MockBehavior::default()));
        let (faults, _slot) = fault_slot();
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let dispatcher = StreamDispatcher::new(client.clone(), faults, Duration::from_millis(250));
        let handle = tokio::spawn(dispatcher.run(rx, cancel.clone()));

        tx.send(digest_list(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        let stats = handle.await.unwrap();
        assert_eq!(stats.digest_lists, 1);
        assert_eq!(client.acked().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_pending_ack() {
        let client = Arc::new(MockClient::new(
            1,
            MockBehavior {
                stall_ack: true,
                ..MockBehavior::default()
            },
        ));
        let (faults, _slot) = fault_slot();
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let dispatcher = StreamDispatcher::new(client.clone(), faults, Duration::from_millis(250));
        let handle = tokio::spawn(dispatcher.run(rx, cancel.clone()));

        tx.send(digest_list(1)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!handle.is_finished());
        cancel.cancel();

        let stats = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("dispatcher did not stop")
            .unwrap();
        assert_eq!(stats.digest_lists, 1);
        assert!(client.acked().is_empty());
    }
}

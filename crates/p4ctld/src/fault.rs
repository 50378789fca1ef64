//! Single-slot fault signalling.
//!
//! Every established session owns one slot. Any task of the session may
//! report a [`Fault`]; reporting never waits. The slot holds at most one
//! undelivered fault, so the first report wins and later ones are dropped.
//! Only the session's run loop reads the slot, and it stops reading after
//! the first fault, which closes the slot for everybody else.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::error::Fault;

/// Creates a connected reporter/slot pair.
pub fn fault_slot() -> (FaultReporter, FaultSlot) {
    let (tx, rx) = mpsc::channel(1);
    (FaultReporter { tx }, FaultSlot { rx })
}

/// Sending half, cloned into every task of a session.
#[derive(Debug, Clone)]
pub struct FaultReporter {
    tx: mpsc::Sender<Fault>,
}

impl FaultReporter {
    /// Reports a fault without waiting.
    ///
    /// Returns false when the report was dropped because a fault is already
    /// pending or the session has stopped listening.
    pub fn report(&self, fault: Fault) -> bool {
        match self.tx.try_send(fault) {
            Ok(()) => true,
            Err(TrySendError::Full(fault)) => {
                debug!(%fault, "Fault already pending, dropping report");
                false
            }
            Err(TrySendError::Closed(fault)) => {
                debug!(%fault, "Session no longer listening, dropping report");
                false
            }
        }
    }
}

/// Receiving half, owned by the session run loop.
#[derive(Debug)]
pub struct FaultSlot {
    rx: mpsc::Receiver<Fault>,
}

impl FaultSlot {
    /// Waits for the next fault.
    ///
    /// Returns `None` once every reporter is gone.
    pub async fn wait(&mut self) -> Option<Fault> {
        self.rx.recv().await
    }

    /// Takes a pending fault without waiting.
    pub fn take(&mut self) -> Option<Fault> {
        self.rx.try_recv().ok()
    }
}

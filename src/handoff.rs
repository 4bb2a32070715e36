//! Update signal between the capture thread and the render loop.
//!
//! Backed by a capacity-1 `sync_channel`. A notification that finds the slot
//! full is dropped: one pending update already guarantees a redraw of the
//! whole snapshot, so bursts coalesce into a single wakeup.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::Duration;

/// Create a connected notifier/receiver pair.
pub fn channel() -> (Notifier, UpdateReceiver) {
    let (tx, rx) = mpsc::sync_channel(1);
    (Notifier { tx }, UpdateReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct Notifier {
    tx: SyncSender<()>,
}

impl Notifier {
    /// Signal that new data is available. Returns false once the receiver is gone.
    pub fn notify(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Disconnected(())) => false,
        }
    }
}

/// What a bounded wait on the handoff produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Update,
    Timeout,
    /// Every notifier has been dropped.
    Closed,
}

#[derive(Debug)]
pub struct UpdateReceiver {
    rx: Receiver<()>,
}

impl UpdateReceiver {
    pub fn wait(&self, timeout: Duration) -> Wake {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => Wake::Update,
            Err(RecvTimeoutError::Timeout) => Wake::Timeout,
            Err(RecvTimeoutError::Disconnected) => Wake::Closed,
        }
    }
}

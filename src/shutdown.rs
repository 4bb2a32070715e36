//! Shutdown coordination.
//!
//! A run goes `Running → StopRequested → Stopped` exactly once. SIGINT only
//! requests the stop; the session observes it, waits for the capture thread
//! with a bounded timeout, marks the run stopped and then exports.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

const RUNNING: u8 = 0;
const STOP_REQUESTED: u8 = 1;
const STOPPED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    StopRequested,
    Stopped,
}

/// Trait for checking shutdown status from a loop.
pub trait ShutdownCheck: Send + Sync {
    fn should_stop(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct ShutdownFlag {
    state: Arc<AtomicU8>,
}

impl ShutdownFlag {
    /// Create a flag and route Ctrl+C into [`ShutdownFlag::request_stop`].
    ///
    /// If the handler cannot be installed the flag still works; only the
    /// signal path is lost.
    pub fn new() -> Self {
        let flag = Self::manual();
        let handler_flag = flag.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            handler_flag.request_stop();
        }) {
            warn!("could not install Ctrl+C handler: {}", e);
        }
        flag
    }

    /// A flag without a signal handler.
    pub fn manual() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(RUNNING)),
        }
    }

    /// Move `Running → StopRequested`. Returns true only for the call that
    /// made the transition.
    pub fn request_stop(&self) -> bool {
        self.state
            .compare_exchange(RUNNING, STOP_REQUESTED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Final transition, taken once the loops have quiesced.
    pub fn mark_stopped(&self) {
        self.request_stop();
        self.state.store(STOPPED, Ordering::SeqCst);
    }

    pub fn state(&self) -> RunState {
        match self.state.load(Ordering::SeqCst) {
            RUNNING => RunState::Running,
            STOP_REQUESTED => RunState::StopRequested,
            _ => RunState::Stopped,
        }
    }
}

impl ShutdownCheck for ShutdownFlag {
    fn should_stop(&self) -> bool {
        self.state.load(Ordering::SeqCst) != RUNNING
    }
}

/// Result of [`join_with_timeout`].
#[derive(Debug)]
pub enum Joined<T> {
    Finished(thread::Result<T>),
    /// The thread is still running; the handle is handed back.
    TimedOut(JoinHandle<T>),
}

/// Join `handle`, giving up after `timeout`.
pub fn join_with_timeout<T>(handle: JoinHandle<T>, timeout: Duration) -> Joined<T> {
    let deadline = Instant::now() + timeout;
    let step = Duration::from_millis(10);
    while !handle.is_finished() {
        let now = Instant::now();
        if now >= deadline {
            debug!("thread {:?} still running after {:?}", handle.thread().name(), timeout);
            return Joined::TimedOut(handle);
        }
        thread::sleep(step.min(deadline - now));
    }
    Joined::Finished(handle.join())
}

//! One capture run: spawn the capture thread, render until stopped, wait for
//! the capture side to quiesce, then export.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ratatui::backend::Backend;
use tracing::{error, info, warn};

use crate::aggregate::{AggregateStore, RawBuffer};
use crate::capture::{capture_loop, CaptureSink, CaptureStats, PacketSource};
use crate::config::Settings;
use crate::error::StartupError;
use crate::export::{export_all, ExportReport};
use crate::handoff;
use crate::shutdown::{join_with_timeout, Joined, ShutdownFlag};
use crate::tui::{run_render_loop, Screen};

/// How long shutdown waits for the capture thread before exporting anyway.
pub const CAPTURE_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// The join deadline for a given poll interval: at least two polls, so a
/// read that started just before the stop request can still finish.
pub fn join_timeout(poll: Duration) -> Duration {
    CAPTURE_JOIN_TIMEOUT.max(poll * 2)
}

#[derive(Debug)]
pub struct SessionReport {
    /// `None` if the capture thread panicked or did not stop in time.
    pub capture: Option<CaptureStats>,
    pub raw_dropped: u64,
    pub exports: ExportReport,
}

pub fn run<S, B>(
    source: S,
    settings: &Settings,
    mut screen: Screen<B>,
    shutdown: &ShutdownFlag,
) -> Result<SessionReport, StartupError>
where
    S: PacketSource + 'static,
    B: Backend,
{
    let store = Arc::new(AggregateStore::new());
    let raw = settings
        .capture
        .capture_raw
        .then(|| Arc::new(RawBuffer::new(source.datalink(), settings.capture.raw_limit)));
    let (notifier, updates) = handoff::channel();

    let sink = CaptureSink {
        store: Arc::clone(&store),
        raw: raw.clone(),
        notifier,
    };
    let config = settings.capture.clone();
    let poll = settings.render.poll;
    let flag = shutdown.clone();
    let handle = thread::Builder::new()
        .name("capture".into())
        .spawn(move || {
            let mut source = source;
            capture_loop(&mut source, &config, &sink, &flag, poll)
        })
        .map_err(StartupError::Spawn)?;

    let redraws = run_render_loop(&mut screen, &updates, &store, &settings.render, shutdown);

    if shutdown.request_stop() {
        info!("render loop ended; stopping capture");
    } else {
        info!("shutdown requested; stopping capture");
    }
    if let Err(e) = screen.close() {
        warn!("failed to restore terminal: {:#}", e);
    }

    let deadline = join_timeout(poll);
    let capture = match join_with_timeout(handle, deadline) {
        Joined::Finished(Ok(stats)) => Some(stats),
        Joined::Finished(Err(_)) => {
            error!("capture thread panicked; exporting what was collected");
            None
        }
        Joined::TimedOut(handle) => {
            warn!(
                "{} thread still running after {:?}; exporting current state",
                handle.thread().name().unwrap_or("capture"),
                deadline
            );
            None
        }
    };
    shutdown.mark_stopped();
    info!(state = ?shutdown.state(), redraws, "session stopped");

    let exports = export_all(&settings.exports, &store.snapshot(), raw.as_deref());

    Ok(SessionReport {
        capture,
        raw_dropped: raw.as_ref().map_or(0, |r| r.dropped()),
        exports,
    })
}

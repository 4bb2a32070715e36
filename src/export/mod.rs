//! Shutdown exports. Each target is best-effort: a failure is logged and the
//! other target still runs.

pub mod raw;
pub mod structured;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info, warn};

use crate::aggregate::{RawBuffer, Snapshot};
use crate::config::ExportTargets;

pub use raw::export_raw;
pub use structured::export_structured;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("pcap: {0}")]
    Pcap(#[from] pcap::Error),
}

/// What was written at shutdown.
#[derive(Debug, Default)]
pub struct ExportReport {
    /// Path and number of rows or frames written.
    pub written: Vec<(PathBuf, usize)>,
    pub failed: Vec<(PathBuf, ExportError)>,
}

impl ExportReport {
    fn record(&mut self, path: &Path, what: &str, result: Result<usize, ExportError>) {
        match result {
            Ok(count) => {
                info!("wrote {} {} to {}", count, what, path.display());
                self.written.push((path.to_path_buf(), count));
            }
            Err(e) => {
                error!("failed to write {}: {}", path.display(), e);
                self.failed.push((path.to_path_buf(), e));
            }
        }
    }
}

/// Run every configured export.
pub fn export_all(targets: &ExportTargets, snapshot: &Snapshot, raw: Option<&RawBuffer>) -> ExportReport {
    let mut report = ExportReport::default();

    if let Some(path) = &targets.structured {
        report.record(path, "rows", export_structured(path, snapshot));
    }

    if let Some(path) = &targets.raw {
        match raw {
            Some(buffer) => report.record(path, "frames", export_raw(path, buffer)),
            None => warn!("raw export to {} requested but nothing was buffered", path.display()),
        }
    }

    report
}

//! Startup failures and their exit codes.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Anything that stops the tool before the capture and render loops run.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no usable network interface found")]
    NoInterface,

    #[error("interface discovery failed: {0}")]
    Discovery(#[source] pcap::Error),

    #[error(
        "insufficient privileges to capture on '{interface}': {message}\n\
         Run as root or grant the binary CAP_NET_RAW (Npcap on Windows)."
    )]
    PermissionDenied { interface: String, message: String },

    #[error("failed to open capture on '{interface}': {source}")]
    Capture {
        interface: String,
        #[source]
        source: pcap::Error,
    },

    #[error("terminal setup failed: {0:#}")]
    Terminal(anyhow::Error),

    #[error("failed to start capture thread: {0}")]
    Spawn(#[source] io::Error),
}

impl StartupError {
    /// Classify a failure to open the capture handle. libpcap reports missing
    /// privileges only through its error text.
    pub fn from_open(interface: &str, err: pcap::Error) -> Self {
        if let pcap::Error::PcapError(msg) = &err {
            if is_permission_message(msg) {
                return StartupError::PermissionDenied {
                    interface: interface.to_string(),
                    message: msg.clone(),
                };
            }
        }
        StartupError::Capture {
            interface: interface.to_string(),
            source: err,
        }
    }
}

fn is_permission_message(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    msg.contains("permission") || msg.contains("not permitted") || msg.contains("access denied")
}

/// Exit code constants.
pub mod codes {
    /// Graceful shutdown, including best-effort export failures.
    pub const SUCCESS: u8 = 0;
    /// Arguments valid for the parser but not for the run.
    pub const INVALID_ARGS: u8 = 1;
    // 2 is used by clap for usage errors.
    /// No interface could be resolved.
    pub const NO_INTERFACE: u8 = 3;
    /// Capture privilege denied by the host.
    pub const PERMISSION_DENIED: u8 = 4;
    /// Capture handle could not be opened.
    pub const CAPTURE_ERROR: u8 = 5;
    /// Terminal, logging or thread setup failed.
    pub const ENVIRONMENT_ERROR: u8 = 6;
}

/// Map a StartupError to an exit code.
pub fn exit_code(error: &StartupError) -> u8 {
    match error {
        StartupError::Config(_) => codes::INVALID_ARGS,
        StartupError::NoInterface | StartupError::Discovery(_) => codes::NO_INTERFACE,
        StartupError::PermissionDenied { .. } => codes::PERMISSION_DENIED,
        StartupError::Capture { .. } => codes::CAPTURE_ERROR,
        StartupError::LogFile { .. } | StartupError::Terminal(_) | StartupError::Spawn(_) => {
            codes::ENVIRONMENT_ERROR
        }
    }
}

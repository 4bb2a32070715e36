//! Immutable run configuration derived once from the command line.

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::cli::Cli;

pub const DEFAULT_CSV_NAME: &str = "traffic_log.csv";
pub const DEFAULT_PCAP_NAME: &str = "raw_capture.pcap";

/// Label used when no context address is given and none can be discovered.
pub const UNKNOWN_CONTEXT: &str = "Unknown";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--filter-context needs an IP address as context, got '{0}'")]
    ContextNotAnAddress(String),
}

/// What the capture loop records. Fixed before the loop starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub interface: String,
    pub ipv4: bool,
    pub ipv6: bool,
    pub capture_raw: bool,
    /// Frame cap for the raw buffer.
    pub raw_limit: Option<usize>,
    /// When set, only packets to or from this address are aggregated.
    pub context_filter: Option<IpAddr>,
}

/// Where to write results at shutdown. Absent paths are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportTargets {
    pub structured: Option<PathBuf>,
    pub raw: Option<PathBuf>,
}

/// Display settings for the render loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub context: String,
    pub interface: String,
    pub poll: Duration,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub capture: CaptureConfig,
    pub exports: ExportTargets,
    pub render: RenderOptions,
}

impl Settings {
    /// Resolve the parsed CLI against the chosen interface and context label.
    pub fn resolve(cli: &Cli, interface: String, context: String) -> Result<Self, ConfigError> {
        let (ipv4, ipv6) = ip_versions(cli.ipv4, cli.ipv6);

        let context_filter = if cli.filter_context {
            let addr = context
                .parse::<IpAddr>()
                .map_err(|_| ConfigError::ContextNotAnAddress(context.clone()))?;
            Some(addr)
        } else {
            None
        };

        let exports = ExportTargets {
            structured: cli
                .export_structured
                .as_deref()
                .map(|p| with_extension(p, "csv")),
            raw: cli.export_raw.as_deref().map(|p| with_extension(p, "pcap")),
        };

        Ok(Self {
            capture: CaptureConfig {
                interface: interface.clone(),
                ipv4,
                ipv6,
                capture_raw: exports.raw.is_some(),
                raw_limit: cli.raw_limit,
                context_filter,
            },
            exports,
            render: RenderOptions {
                context,
                interface,
                poll: Duration::from_millis(cli.poll_ms),
            },
        })
    }
}

/// Neither flag means both versions.
pub fn ip_versions(ipv4: bool, ipv6: bool) -> (bool, bool) {
    if !ipv4 && !ipv6 {
        (true, true)
    } else {
        (ipv4, ipv6)
    }
}

/// Append `.ext` unless the file name already ends in it. The existing
/// extension, if any, is kept: `report.txt` becomes `report.txt.csv`, and a
/// bare `.csv` stays as it is.
pub fn with_extension(path: &Path, ext: &str) -> PathBuf {
    let suffix = format!(".{}", ext);
    let has_suffix = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().ends_with(&suffix));
    if has_suffix {
        return path.to_path_buf();
    }
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("netenum").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_ip_versions() {
        assert_eq!(ip_versions(false, false), (true, true));
        assert_eq!(ip_versions(true, false), (true, false));
        assert_eq!(ip_versions(false, true), (false, true));
    }

    #[test]
    fn test_with_extension() {
        assert_eq!(with_extension(Path::new("traffic_log.csv"), "csv"), PathBuf::from("traffic_log.csv"));
        assert_eq!(with_extension(Path::new("out"), "csv"), PathBuf::from("out.csv"));
        assert_eq!(with_extension(Path::new("dir/cap"), "pcap"), PathBuf::from("dir/cap.pcap"));
        assert_eq!(with_extension(Path::new("report.txt"), "csv"), PathBuf::from("report.txt.csv"));
    }

    #[test]
    fn test_with_extension_dot_only_name() {
        assert_eq!(with_extension(Path::new(".csv"), "csv"), PathBuf::from(".csv"));
        assert_eq!(with_extension(Path::new("out/.pcap"), "pcap"), PathBuf::from("out/.pcap"));
        assert_eq!(with_extension(Path::new(".hidden"), "csv"), PathBuf::from(".hidden.csv"));
    }

    #[test]
    fn test_resolve_defaults() {
        let s = Settings::resolve(&cli(&[]), "eth0".into(), UNKNOWN_CONTEXT.into()).unwrap();
        assert!(s.capture.ipv4 && s.capture.ipv6);
        assert!(!s.capture.capture_raw);
        assert_eq!(s.capture.context_filter, None);
        assert_eq!(s.exports, ExportTargets::default());
        assert_eq!(s.render.poll, Duration::from_millis(1000));
        assert_eq!(s.render.interface, "eth0");
    }

    #[test]
    fn test_resolve_exports_enable_raw_capture() {
        let s = Settings::resolve(&cli(&["-l", "x", "-R", "y"]), "eth0".into(), "10.0.0.1".into()).unwrap();
        assert_eq!(s.exports.structured, Some(PathBuf::from("x.csv")));
        assert_eq!(s.exports.raw, Some(PathBuf::from("y.pcap")));
        assert!(s.capture.capture_raw);
    }

    #[test]
    fn test_resolve_context_filter() {
        let s = Settings::resolve(&cli(&["--filter-context"]), "eth0".into(), "10.0.0.1".into()).unwrap();
        assert_eq!(s.capture.context_filter, Some("10.0.0.1".parse().unwrap()));

        let err = Settings::resolve(&cli(&["--filter-context"]), "eth0".into(), UNKNOWN_CONTEXT.into())
            .unwrap_err();
        assert_eq!(err, ConfigError::ContextNotAnAddress(UNKNOWN_CONTEXT.into()));
    }
}

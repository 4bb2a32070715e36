//! Command-line interface.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::{DEFAULT_CSV_NAME, DEFAULT_PCAP_NAME};

/// netenum: passive enumeration of destination addresses and ports
#[derive(Parser, Debug)]
#[command(name = "netenum", version, about)]
pub struct Cli {
    /// Interface to capture on (default: auto-detected)
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Capture only IPv4 traffic
    #[arg(short = '4', long, conflicts_with = "ipv6")]
    pub ipv4: bool,

    /// Capture only IPv6 traffic
    #[arg(short = '6', long)]
    pub ipv6: bool,

    /// Export the port tables to CSV at exit
    #[arg(
        short = 'l',
        long,
        visible_alias = "log",
        value_name = "PATH",
        num_args = 0..=1,
        default_missing_value = DEFAULT_CSV_NAME
    )]
    pub export_structured: Option<PathBuf>,

    /// Save every captured frame to a pcap file at exit
    #[arg(
        short = 'R',
        long,
        visible_alias = "raw",
        value_name = "PATH",
        num_args = 0..=1,
        default_missing_value = DEFAULT_PCAP_NAME
    )]
    pub export_raw: Option<PathBuf>,

    /// Address shown as the table heading (default: the default gateway)
    #[arg(short, long, value_name = "ADDRESS")]
    pub context: Option<String>,

    /// Only aggregate packets to or from the context address
    #[arg(long)]
    pub filter_context: bool,

    /// Keep at most this many frames for the pcap export
    #[arg(long, value_name = "FRAMES", requires = "export_raw")]
    pub raw_limit: Option<usize>,

    /// Capture poll and redraw interval in milliseconds (10 to 1000)
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(10..=1000))]
    pub poll_ms: u64,

    /// Append logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("netenum").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]).unwrap();
        assert!(cli.interface.is_none());
        assert!(!cli.ipv4 && !cli.ipv6);
        assert!(cli.export_structured.is_none());
        assert!(cli.export_raw.is_none());
        assert_eq!(cli.poll_ms, 1000);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_ipv4_and_ipv6_conflict() {
        let err = parse(&["--ipv4", "--ipv6"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
        assert!(parse(&["-4", "-6"]).is_err());
    }

    #[test]
    fn test_export_flags_without_value_use_defaults() {
        let cli = parse(&["--export-structured", "--export-raw"]).unwrap();
        assert_eq!(cli.export_structured, Some(PathBuf::from(DEFAULT_CSV_NAME)));
        assert_eq!(cli.export_raw, Some(PathBuf::from(DEFAULT_PCAP_NAME)));
    }

    #[test]
    fn test_export_flags_with_value_and_aliases() {
        let cli = parse(&["--log", "out", "-R", "cap.pcap", "-4"]).unwrap();
        assert_eq!(cli.export_structured, Some(PathBuf::from("out")));
        assert_eq!(cli.export_raw, Some(PathBuf::from("cap.pcap")));
        assert!(cli.ipv4);
    }

    #[test]
    fn test_optional_value_does_not_swallow_flags() {
        let cli = parse(&["-l", "-6"]).unwrap();
        assert_eq!(cli.export_structured, Some(PathBuf::from(DEFAULT_CSV_NAME)));
        assert!(cli.ipv6);
    }

    #[test]
    fn test_raw_limit_requires_raw_export() {
        assert!(parse(&["--raw-limit", "10"]).is_err());
        let cli = parse(&["--raw", "--raw-limit", "10"]).unwrap();
        assert_eq!(cli.raw_limit, Some(10));
    }

    #[test]
    fn test_poll_ms_bounds() {
        assert!(parse(&["--poll-ms", "5"]).is_err());
        assert_eq!(parse(&["--poll-ms", "250"]).unwrap().poll_ms, 250);
        assert_eq!(parse(&["--poll-ms", "1000"]).unwrap().poll_ms, 1000);
        assert!(parse(&["--poll-ms", "3000"]).is_err());
    }

    #[test]
    fn test_verbose_counts() {
        assert_eq!(parse(&["-vv"]).unwrap().verbose, 2);
    }
}

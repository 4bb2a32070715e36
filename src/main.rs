mod aggregate;
mod capture;
mod cli;
mod config;
mod error;
mod export;
mod handoff;
mod session;
mod shutdown;
mod tui;

use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use capture::interface::{default_gateway, resolve_interface};
use capture::{PacketSource, PcapSource};
use cli::Cli;
use config::{Settings, UNKNOWN_CONTEXT};
use error::{codes, exit_code, StartupError};
use session::SessionReport;
use shutdown::ShutdownFlag;
use tui::Screen;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("error: {}", e);
        return ExitCode::from(exit_code(&e));
    }

    match run(&cli) {
        Ok(report) => {
            print_summary(&report);
            ExitCode::from(codes::SUCCESS)
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// `RUST_LOG` wins over `-v`. Without either only warnings are shown, since
/// log lines on stderr would tear the live view.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<(), StartupError> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("netenum={}", level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| StartupError::LogFile {
                    path: path.to_path_buf(),
                    source,
                })?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<SessionReport, StartupError> {
    let interface = resolve_interface(cli.interface.as_deref())?;
    let context = match (&cli.context, default_gateway()) {
        (Some(c), _) => c.clone(),
        (None, Some(gw)) => gw.to_string(),
        (None, None) => UNKNOWN_CONTEXT.to_string(),
    };
    let settings = Settings::resolve(cli, interface, context)?;

    let source = PcapSource::open(&settings.capture.interface, settings.render.poll)
        .map_err(|e| StartupError::from_open(&settings.capture.interface, e))?;
    info!(
        interface = %settings.capture.interface,
        datalink = source.datalink(),
        context = %settings.render.context,
        "capture opened"
    );

    let shutdown = ShutdownFlag::new();
    let screen = Screen::stdout().map_err(StartupError::Terminal)?;
    session::run(source, &settings, screen, &shutdown)
}

fn print_summary(report: &SessionReport) {
    match &report.capture {
        Some(stats) => println!(
            "Captured {} frames, {} aggregated, {} poll errors",
            stats.frames, stats.recorded, stats.errors
        ),
        None => println!("Capture thread did not stop cleanly; exported the state collected so far"),
    }
    if report.raw_dropped > 0 {
        warn!(dropped = report.raw_dropped, "raw capture limit was hit");
        println!("Raw limit reached: {} frames not kept", report.raw_dropped);
    }
    for (path, count) in &report.exports.written {
        println!("Wrote {} ({} records)", path.display(), count);
    }
    for (path, e) in &report.exports.failed {
        eprintln!("Export to {} failed: {}", path.display(), e);
    }
}

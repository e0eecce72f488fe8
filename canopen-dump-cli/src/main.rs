//! CANopen Dump CLI Application
//!
//! Command-line front end for the canopen-dump-decoder library. It merges
//! command-line arguments with an optional TOML configuration, opens the
//! selected frame source and writes one line per CANopen event to stdout.
//! Diagnostics go to stderr.

use anyhow::{bail, Context, Result};
use canopen_dump_decoder::{
    open_source, DecoderError, Dumper, FrameSource, RecordingSource, SourceMode, TraceWriter,
    UnclassifiedPolicy,
};
use clap::{Parser, ValueEnum};
use std::io;
use std::path::PathBuf;

mod config;

use config::AppConfig;

/// Interface used when capturing from the bus without an address
const DEFAULT_INTERFACE: &str = "can0";

/// CANopen Dump - Print CANopen traffic one event per line
#[derive(Parser, Debug)]
#[command(name = "canopen-dump")]
#[command(about = "Decode CANopen traffic from a CAN interface, TCP bridge or trace file", long_about = None)]
#[command(version)]
struct Args {
    /// CAN interface, `host:port` with --tcp, or trace file with --file
    #[arg(value_name = "ADDRESS")]
    address: Option<String>,

    /// Replay a recorded trace file
    #[arg(short, long, conflicts_with = "tcp")]
    file: bool,

    /// Connect to a TCP bridge
    #[arg(long)]
    tcp: bool,

    /// Prefix each line with the frame time
    #[arg(short, long)]
    timestamp: bool,

    /// Only show the given service class (can be repeated: nmt, sync, time,
    /// emcy, sdo, heartbeat, tpdo1-4, rpdo1-4, tpdo, rpdo, pdo)
    #[arg(long, value_name = "CLASS")]
    filter: Vec<String>,

    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Also write every received frame to a trace file
    #[arg(long, value_name = "FILE")]
    record: Option<PathBuf>,

    /// What to do with frames that are not CANopen traffic
    #[arg(long, value_enum, value_name = "POLICY")]
    on_unclassified: Option<OnUnclassified>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all log output except errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OnUnclassified {
    /// Log a warning and continue
    Skip,
    /// Stop with an error
    Abort,
}

impl From<OnUnclassified> for UnclassifiedPolicy {
    fn from(value: OnUnclassified) -> Self {
        match value {
            OnUnclassified::Skip => UnclassifiedPolicy::Skip,
            OnUnclassified::Abort => UnclassifiedPolicy::Abort,
        }
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::debug!("CANopen Dump CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using decoder library v{}", canopen_dump_decoder::VERSION);

    let config = merge_config(&args)?;
    run(&config, args.record.as_deref())
}

/// Load the configuration file, if any, and apply command-line overrides
fn merge_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    if args.file {
        config.source.mode = SourceMode::File;
    } else if args.tcp {
        config.source.mode = SourceMode::Tcp;
    }

    if let Some(address) = &args.address {
        config.source.address = Some(address.clone());
    }

    if args.timestamp {
        config.output.timestamp = true;
    }

    if !args.filter.is_empty() {
        config.filter.classes = args.filter.clone();
    }

    if let Some(policy) = args.on_unclassified {
        config.decoder.on_unclassified = policy.into();
    }

    config.validate()?;
    Ok(config)
}

fn run(config: &AppConfig, record: Option<&std::path::Path>) -> Result<()> {
    let mode = config.source.mode;
    let address = match (&config.source.address, mode) {
        (Some(address), _) => address.clone(),
        (None, SourceMode::Can) => DEFAULT_INTERFACE.to_string(),
        (None, SourceMode::Tcp) => bail!("A TCP bridge address (host:port) is required"),
        (None, SourceMode::File) => bail!("A trace file path is required"),
    };

    let options = config.dump_options()?;
    let dictionary = config.type_dictionary()?;

    let source = open_source(mode, &address)
        .with_context(|| format!("Failed to open {} source {:?}", mode, address))?;

    let source: FrameSource = match record {
        Some(path) => {
            let writer = TraceWriter::create(path)
                .with_context(|| format!("Failed to create trace file: {:?}", path))?;
            Box::new(RecordingSource::new(source, writer))
        }
        None => source,
    };

    let mut dumper = Dumper::with_dictionary(options, dictionary);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match dumper.run(source, &mut out, config.decoder.on_unclassified) {
        Ok(stats) => {
            log::info!("End of stream: {}", stats);
            Ok(())
        }
        // Reader of our stdout went away (e.g. `| head`)
        Err(DecoderError::IoError(e)) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Dump of {} source {:?} failed", mode, address)),
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::{Builder, Target};
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .target(Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_overrides() {
        let args = Args::parse_from([
            "canopen-dump",
            "--tcp",
            "10.0.0.2:29536",
            "-t",
            "--filter",
            "sdo",
            "--filter",
            "emcy",
            "--on-unclassified",
            "abort",
        ]);

        let config = merge_config(&args).unwrap();
        assert_eq!(config.source.mode, SourceMode::Tcp);
        assert_eq!(config.source.address.as_deref(), Some("10.0.0.2:29536"));
        assert!(config.output.timestamp);
        assert_eq!(config.filter.classes, vec!["sdo", "emcy"]);
        assert_eq!(config.decoder.on_unclassified, UnclassifiedPolicy::Abort);
    }

    #[test]
    fn test_file_and_tcp_conflict() {
        let result = Args::try_parse_from(["canopen-dump", "--file", "--tcp", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_filter_is_rejected() {
        let args = Args::parse_from(["canopen-dump", "--filter", "nope"]);
        assert!(merge_config(&args).is_err());
    }

    #[test]
    fn test_file_mode_needs_address() {
        let args = Args::parse_from(["canopen-dump", "--file"]);
        let config = merge_config(&args).unwrap();
        assert!(run(&config, None).is_err());
    }
}

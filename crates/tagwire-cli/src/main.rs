//! tagwire command-line tool
//!
//! Lists serial ports, finds the port a reader is attached to and reports
//! chip insertions and removals.
//!
//! Reader settings come from the environment (`TAGWIRE_*` variables); the
//! card type and port may also come from a `ReaderUnit.config` file. Command
//! line flags take precedence over both.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tagwire_core::constants::DEFAULT_AUTO_DETECTION_TIMEOUT_MS;
use tagwire_reader::mock::{MockPortScanner, MockReply};
use tagwire_reader::serial::NativePortScanner;
use tagwire_reader::{
    AnyPortScanner, AutoDetector, PortScanner, ReaderSettings, ReaderUnitConfig, SerialLine,
    SerialReaderUnit,
};
use tokio::signal;
use tracing::{debug, info};

/// Simulated port that never answers.
const MOCK_SILENT_PORT: &str = "/dev/ttyMOCK0";
/// Simulated port with a reader attached.
const MOCK_READER_PORT: &str = "/dev/ttyMOCK1";
/// Insertions reported in mock mode when `--count` is not given.
const MOCK_DEFAULT_COUNT: u32 = 3;

/// Broadcast-only serial tag reader tool
#[derive(Parser, Debug)]
#[command(name = "tagwire")]
#[command(version, about = "Presence detection for broadcast-only serial tag readers", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use simulated ports instead of the host's serial ports
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the serial ports of the host
    ListPorts,

    /// Probe every serial port and report the one a reader answers on
    Detect {
        /// Time each port has to answer the probe, in milliseconds
        #[arg(long, default_value_t = DEFAULT_AUTO_DETECTION_TIMEOUT_MS)]
        timeout_ms: u64,
    },

    /// Report chip insertions and removals until interrupted
    Watch(WatchArgs),
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Serial device path (e.g., /dev/ttyUSB0, COM3)
    ///
    /// Takes precedence over the port of the configuration file.
    #[arg(short, long)]
    port: Option<String>,

    /// Scan serial ports when no port is configured
    #[arg(long)]
    auto_detect: bool,

    /// Deadline of each insertion/removal wait in milliseconds (0 = forever)
    #[arg(long, default_value_t = 0)]
    max_wait_ms: u64,

    /// Card type label of the chips
    #[arg(long)]
    card_type: Option<String>,

    /// Directory containing ReaderUnit.config (default: working directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many insertions
    #[arg(long)]
    count: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let scanner = build_scanner(cli.mock);
    match cli.command {
        Commands::ListPorts => list_ports(&scanner),
        Commands::Detect { timeout_ms } => detect(&scanner, timeout_ms).await,
        Commands::Watch(args) => watch(scanner, args, cli.mock).await,
    }
}

fn build_scanner(mock: bool) -> AnyPortScanner {
    if !mock {
        return AnyPortScanner::Native(NativePortScanner);
    }

    let mut scanner = MockPortScanner::new();
    scanner.add_port(MOCK_SILENT_PORT);
    let reader = scanner.add_port(MOCK_READER_PORT);
    reader.push_replies([
        MockReply::ascii("12345"),
        MockReply::Silence,
        MockReply::Silence,
        MockReply::ascii("12345"),
        MockReply::ascii("12345"),
        MockReply::Silence,
        MockReply::ascii("67890"),
        MockReply::ascii("67890"),
        MockReply::Silence,
        MockReply::ascii("4242"),
    ]);
    AnyPortScanner::Mock(scanner)
}

fn list_ports(scanner: &AnyPortScanner) -> Result<()> {
    let ports = scanner
        .available_ports()
        .context("Failed to enumerate serial ports")?;

    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }

    for port in ports {
        println!("{}", port);
    }
    Ok(())
}

async fn detect(scanner: &AnyPortScanner, timeout_ms: u64) -> Result<()> {
    let settings = ReaderSettings::from_env();
    let detector = AutoDetector::new(Duration::from_millis(timeout_ms), settings.line);

    match detector.detect(scanner).await {
        Some(found) => {
            println!("{}", found.line.device_name());
            Ok(())
        }
        None => bail!("No reader answered on any serial port"),
    }
}

async fn watch(scanner: AnyPortScanner, args: WatchArgs, mock: bool) -> Result<()> {
    let config = match &args.config {
        Some(dir) => ReaderUnitConfig::load_or_default(dir),
        None => ReaderUnitConfig::from_working_dir(),
    };
    debug!("Reader configuration: {:?}", config);

    let mut settings = ReaderSettings::from_env();
    if args.auto_detect || mock {
        settings.auto_detect = true;
    }

    let mut unit = SerialReaderUnit::from_config(scanner, settings, &config);
    if let Some(port) = &args.port {
        unit.set_port_name(port);
    }
    if let Some(card_type) = args.card_type {
        unit.set_card_type(card_type);
    }

    unit.connect_to_reader()
        .await
        .context("Failed to connect to reader")?;
    info!("Watching reader on {}", unit.connected_name());

    let max_wait = Duration::from_millis(args.max_wait_ms);
    let count = args.count.or(mock.then_some(MOCK_DEFAULT_COUNT));

    tokio::select! {
        _ = watch_loop(&mut unit, max_wait, count) => {}
        _ = signal::ctrl_c() => info!("Interrupted"),
    }

    unit.disconnect_from_reader()
        .await
        .context("Failed to disconnect from reader")?;
    Ok(())
}

async fn watch_loop<S: PortScanner>(
    unit: &mut SerialReaderUnit<S>,
    max_wait: Duration,
    count: Option<u32>,
) {
    let mut insertions = 0u32;

    loop {
        if !unit.wait_insertion(max_wait).await {
            debug!("No chip within {}ms", max_wait.as_millis());
            continue;
        }

        let Some(chip) = unit.single_chip().cloned() else {
            continue;
        };
        println!("inserted {}", chip);

        insertions += 1;
        if count.is_some_and(|limit| insertions >= limit) {
            return;
        }

        while !unit.wait_removal(max_wait).await {
            debug!("{} still present", chip);
        }
        println!("removed {}", chip);
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

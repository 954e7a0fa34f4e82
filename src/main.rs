//! # Pad Bridge
//!
//! Mirror a physical game controller onto a virtual one, with optional
//! right-stick assist driven by externally detected targets.
//!
//! # Commands
//!
//! - `run` - start the bridge and read detection results from stdin, one
//!   JSON object per line: `{"targets":[{"x":412.0,"y":300.5}]}`
//! - `setup` - wait for a controller to be plugged in and print its
//!   `[device]` configuration section
//! - `list` - list attached HID devices
//!
//! # Examples
//!
//! ```bash
//! pad-bridge list
//! pad-bridge setup > config/pad-bridge.toml
//! detector | pad-bridge run --config config/pad-bridge.toml
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use pad_bridge::assist::{AssistEngine, DetectionResult};
use pad_bridge::bridge::{Bridge, BridgeStatus};
use pad_bridge::config::{Config, LoggingConfig};
use pad_bridge::controller::device::{DeviceEntry, HidApiBackend, HidBackend};
use pad_bridge::hotplug::{HotplugChange, HotplugMonitor, DEFAULT_INTERVAL};
use pad_bridge::virtual_pad::UinputPadFactory;

/// Controller bridge with target assist
#[derive(Parser)]
#[command(name = "pad-bridge", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge, reading detection results from stdin
    Run {
        /// Configuration file
        #[arg(short, long, default_value = "config/pad-bridge.toml")]
        config: PathBuf,
    },
    /// Wait for a controller to be plugged in and print its [device] section
    Setup {
        /// Configuration file supplying the polling interval and logging
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Polling interval in milliseconds, overrides the configuration
        #[arg(long, value_parser = clap::value_parser!(u64).range(10..=60_000))]
        interval_ms: Option<u64>,
        /// Give up after this many seconds
        #[arg(long, default_value = "60")]
        timeout_s: u64,
    },
    /// List attached HID devices
    List {
        /// Only show this vendor (hex, e.g. 0x054C)
        #[arg(long, value_parser = parse_hex_u16)]
        vid: Option<u16>,
    },
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(s, 16).map_err(|e| format!("invalid hex value '{s}': {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run(&config).await,
        Commands::Setup {
            config,
            interval_ms,
            timeout_s,
        } => {
            let (logging, interval) = match config {
                Some(path) => {
                    let config = Config::load(&path)
                        .with_context(|| format!("Failed to load {}", path.display()))?;
                    (config.logging.clone(), config.hotplug_interval())
                }
                None => (LoggingConfig::default(), DEFAULT_INTERVAL),
            };
            let interval = interval_ms.map_or(interval, Duration::from_millis);
            let _guard = init_logging(&logging)?;
            setup(interval, Duration::from_secs(timeout_s)).await
        }
        Commands::List { vid } => {
            let _guard = init_logging(&LoggingConfig::default())?;
            list(vid)
        }
    }
}

/// Install the console layer and, with `log_dir` set, a daily-rotated file layer
///
/// `RUST_LOG` overrides the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("Invalid log level '{}'", logging.level))?,
    };

    let (file_layer, guard) = match &logging.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "pad-bridge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

async fn run(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let _guard = init_logging(&config.logging)?;

    info!("Pad Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let assist_config = config.assist_config()?;
    let backend: Arc<dyn HidBackend> = Arc::new(HidApiBackend::new()?);
    let mut bridge = Bridge::new(config.bridge_settings(), backend, Box::new(UinputPadFactory));
    bridge.start().context("Failed to start bridge")?;

    let shared = bridge.shared_input().context("Bridge started without an input session")?;
    let mut engine = AssistEngine::new(assist_config, shared);
    let mut status = bridge.status();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!("Reading detection results from stdin, press Ctrl+C to exit");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down...");
    };
    let fault = drive_assist(&mut engine, &mut status, &mut lines, shutdown).await;

    bridge.stop();

    match fault {
        Some(reason) => {
            error!("Bridge faulted: {}", reason);
            anyhow::bail!("Bridge faulted: {}", reason)
        }
        None => Ok(()),
    }
}

/// Run assist cycles until `shutdown` completes or the bridge faults
///
/// The shutdown future is polled across every cycle, so a signal that lands
/// while a cycle is running is still seen. Returns the fault reason, if any.
async fn drive_assist<R, S>(
    engine: &mut AssistEngine,
    status: &mut watch::Receiver<BridgeStatus>,
    lines: &mut Lines<R>,
    shutdown: S,
) -> Option<String>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let center = engine.config().frame_center;
    let poll_interval = engine.config().poll_interval;
    let mut stdin_open = true;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => return None,

            changed = status.changed() => {
                if changed.is_err() {
                    return None;
                }
                if let BridgeStatus::Faulted { reason, .. } = &*status.borrow_and_update() {
                    return Some(reason.clone());
                }
            }

            detection = next_detection(lines, poll_interval, &mut stdin_open) => {
                engine.run_cycle(&detection, center);
            }
        }
    }
}

/// Wait up to one poll interval for the next detection result
///
/// Returns an empty result on timeout, on malformed input and once stdin is
/// closed, so the assist cycle keeps clearing its override.
async fn next_detection<R: AsyncBufRead + Unpin>(
    lines: &mut Lines<R>,
    poll_interval: Duration,
    stdin_open: &mut bool,
) -> DetectionResult {
    if !*stdin_open {
        tokio::time::sleep(poll_interval).await;
        return DetectionResult::default();
    }

    match tokio::time::timeout(poll_interval, lines.next_line()).await {
        Ok(Ok(Some(line))) => parse_detection(&line),
        Ok(Ok(None)) => {
            info!("Detection input closed");
            *stdin_open = false;
            DetectionResult::default()
        }
        Ok(Err(e)) => {
            warn!("Failed to read detection input: {}", e);
            *stdin_open = false;
            DetectionResult::default()
        }
        Err(_) => DetectionResult::default(),
    }
}

fn parse_detection(line: &str) -> DetectionResult {
    let line = line.trim();
    if line.is_empty() {
        return DetectionResult::default();
    }
    serde_json::from_str(line).unwrap_or_else(|e| {
        warn!("Ignoring malformed detection result: {}", e);
        DetectionResult::default()
    })
}

async fn setup(interval: Duration, timeout: Duration) -> Result<()> {
    let backend: Arc<dyn HidBackend> = Arc::new(HidApiBackend::new()?);
    let mut monitor = HotplugMonitor::new(backend, interval)?;

    eprintln!(
        "Watching {} HID devices. Plug in the controller to bridge...",
        monitor.devices().len()
    );

    let wait_for_attach = async {
        loop {
            match monitor.next_change().await? {
                HotplugChange::Attached(entry) => return Ok::<_, anyhow::Error>(entry),
                HotplugChange::Detached(entry) => {
                    eprintln!("Device removed: {}. Plug in the controller to bridge...", entry.path);
                }
                HotplugChange::Ambiguous { attached, detached } => {
                    eprintln!(
                        "{} devices appeared and {} disappeared at once. Plug in only one device and try again.",
                        attached.len(),
                        detached.len()
                    );
                }
                HotplugChange::Unchanged => {}
            }
        }
    };

    let entry = tokio::select! {
        result = tokio::time::timeout(timeout, wait_for_attach) => {
            result.with_context(|| format!("No controller plugged in within {:?}", timeout))??
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Setup cancelled");
            return Ok(());
        }
    };

    debug!("Captured device {:?}", entry);
    print!("{}", device_section(&entry));
    Ok(())
}

/// Ready-to-paste `[device]` section for an attached controller
fn device_section(entry: &DeviceEntry) -> String {
    let mut section = String::new();
    if let Some(name) = &entry.display_name {
        section.push_str(&format!("# {}\n", name));
    }
    section.push_str("[device]\n");
    section.push_str(&format!("vendor_id = 0x{:04X}\n", entry.vendor_id));
    section.push_str(&format!("product_id = 0x{:04X}\n", entry.product_id));
    section.push_str(&format!("path = {}\n", toml::Value::String(entry.path.clone())));
    section
}

fn list(vendor: Option<u16>) -> Result<()> {
    let backend = HidApiBackend::new()?;
    let devices: Vec<DeviceEntry> = backend
        .enumerate()?
        .into_iter()
        .filter(|device| vendor.map_or(true, |vid| device.vendor_id == vid))
        .collect();

    if devices.is_empty() {
        println!("No HID devices found.");
        return Ok(());
    }

    println!("{:<8} {:<8} {:<32} Product", "VID", "PID", "Path");
    println!("{}", "-".repeat(80));
    for device in devices {
        println!(
            "{:<8} {:<8} {:<32} {}",
            format!("0x{:04X}", device.vendor_id),
            format!("0x{:04X}", device.product_id),
            device.path,
            device.display_name.as_deref().unwrap_or("(unknown)"),
        );
    }
    Ok(())
}

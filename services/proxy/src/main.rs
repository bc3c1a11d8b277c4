//! Clock status proxy binary
//!
//! Usage:
//!   clocklink-proxy --config config/proxy.toml
//!   clocklink-proxy --simulate --backend local --log-level debug

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use config::ProxyConfig;
use proxy::{ChannelClockSource, ClockSource, Proxy, SimulatedClockSource};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use transport::signals::{block_stop_signals, install_interrupt_handler, wait_for_stop_signal};
use transport::{LocalBackend, MessageQueueBackend, SharedBackend};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// POSIX message queues
    Mqueue,
    /// In-process queues, only reachable from this process
    Local,
}

#[derive(Parser, Debug)]
#[command(name = "clocklink-proxy")]
#[command(about = "Clock synchronization status proxy")]
#[command(version)]
struct Args {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Default PTP transportSpecific value for every time base
    #[arg(short = 't', long)]
    transport_specific: Option<u8>,

    /// Proxy queue name, overrides the configuration file
    #[arg(long)]
    queue: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,

    /// Drive the proxy from a simulated clock
    #[arg(long)]
    simulate: bool,

    #[arg(long, value_enum, default_value = "mqueue")]
    backend: Backend,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Mask signals before any thread exists so every thread inherits it
    let stops = block_stop_signals().context("Failed to block stop signals")?;
    install_interrupt_handler().context("Failed to install interrupt handler")?;

    init_logging(&args)?;
    info!("Starting clocklink proxy");

    let mut config = ProxyConfig::load_or_default(args.config.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {:#}", e);
        e
    })?;
    if let Some(value) = args.transport_specific {
        config.apply_transport_specific(value);
    }
    if let Some(queue) = &args.queue {
        config.proxy.queue_name = queue.clone();
    }
    config.validate()?;

    info!(
        "Loaded configuration: queue {}, {} time base(s)",
        config.proxy.queue_name,
        config.time_bases.len()
    );

    let backend: SharedBackend = match args.backend {
        Backend::Mqueue => Arc::new(MessageQueueBackend::new()),
        Backend::Local => Arc::new(LocalBackend::new()),
    };

    // The feed is held until shutdown so an idle channel source keeps blocking
    let (source, _feed): (Box<dyn ClockSource>, Option<_>) = if args.simulate {
        info!("Mode: SIMULATED clock");
        let source = SimulatedClockSource::new(
            config.time_bases.len(),
            u64::from(std::process::id()),
            Duration::from_millis(250),
        );
        (Box::new(source), None)
    } else {
        warn!("No clock source attached; status stays at its initial values");
        let (feed, source) = ChannelClockSource::channel();
        (Box::new(source.with_ptp_available(false)), Some(feed))
    };

    let proxy = Proxy::start(backend, &config, source).map_err(|e| {
        error!("Proxy failed to start: {}", e);
        e
    })?;

    let signal = wait_for_stop_signal(&stops)?;
    info!("Received {:?}, shutting down", signal);

    proxy.stop();
    proxy.finalize().map_err(|e| {
        error!("Proxy shutdown failed: {}", e);
        e
    })?;

    info!("Clocklink proxy stopped");
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(args.log_level.to_lowercase()))
        .context("Invalid log level")?;

    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_thread_names(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .init();
    }

    Ok(())
}

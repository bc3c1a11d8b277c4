//! Watch clock status from a running proxy
//!
//! Usage:
//!   clocklink-watch --time-base 1 --offset-range=-8888,8888 --events offset,gm-changed
//!   clocklink-watch --events composite --composite offset,synced --count 10

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use client::{ClientOptions, ClockClient, WaitStatus};
use config::constants::queues::DEFAULT_PROXY_QUEUE;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use transport::signals::{block_stop_signals, install_interrupt_handler, wait_for_stop_signal};
use transport::MessageQueueBackend;
use types::{EventMask, Subscription, OFFSET_THRESHOLD};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Event {
    Offset,
    Synced,
    AsCapable,
    GmChanged,
    Composite,
}

impl Event {
    fn mask(self) -> EventMask {
        match self {
            Self::Offset => EventMask::OFFSET_IN_RANGE,
            Self::Synced => EventMask::SYNCED_TO_PRIMARY,
            Self::AsCapable => EventMask::AS_CAPABLE,
            Self::GmChanged => EventMask::GM_CHANGED,
            Self::Composite => EventMask::COMPOSITE,
        }
    }
}

fn mask_of(events: &[Event]) -> EventMask {
    let mut mask = EventMask::NONE;
    for event in events {
        mask.insert(event.mask());
    }
    mask
}

/// Parses `lower,upper` in nanoseconds.
fn parse_range(value: &str) -> Result<(i32, i32), String> {
    let (lower, upper) = value
        .split_once(',')
        .ok_or_else(|| format!("expected <lower>,<upper>, got {value:?}"))?;
    let lower: i32 = lower.trim().parse().map_err(|e| format!("lower bound: {e}"))?;
    let upper: i32 = upper.trim().parse().map_err(|e| format!("upper bound: {e}"))?;
    if lower >= upper {
        return Err(format!("empty range ({lower}, {upper})"));
    }
    Ok((lower, upper))
}

#[derive(Parser, Debug)]
#[command(name = "clocklink-watch")]
#[command(about = "Print clock status notifications from a clocklink proxy")]
#[command(version)]
struct Args {
    /// Proxy queue name
    #[arg(long, default_value = DEFAULT_PROXY_QUEUE)]
    queue: String,

    /// Time base index, starting at 1
    #[arg(long, default_value_t = 1)]
    time_base: i32,

    /// Offset range in nanoseconds, both bounds exclusive
    #[arg(long, value_parser = parse_range, default_value = "-100000,100000", allow_hyphen_values = true)]
    offset_range: (i32, i32),

    /// Events to subscribe to
    #[arg(long, value_enum, value_delimiter = ',', default_value = "offset")]
    events: Vec<Event>,

    /// Conditions ANDed into the composite event (offset, synced, as-capable)
    #[arg(long, value_enum, value_delimiter = ',')]
    composite: Vec<Event>,

    /// Seconds to wait for each notification
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    /// Stop after this many notifications
    #[arg(long)]
    count: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let stops = block_stop_signals().context("Failed to block stop signals")?;
    install_interrupt_handler().context("Failed to install interrupt handler")?;
    init_logging(&args.log_level)?;

    let subscription = build_subscription(&args)?;

    let stopping = Arc::new(AtomicBool::new(false));
    {
        let stopping = Arc::clone(&stopping);
        thread::Builder::new()
            .name("signals".into())
            .spawn(move || {
                if let Ok(signal) = wait_for_stop_signal(&stops) {
                    info!("Received {:?}", signal);
                }
                stopping.store(true, Ordering::Release);
            })
            .context("Failed to spawn signal thread")?;
    }

    let options = ClientOptions::default().with_proxy_queue(&args.queue);
    let mut client = ClockClient::new(Arc::new(MessageQueueBackend::new()), options);
    let session_id = client
        .connect()
        .with_context(|| format!("Failed to connect to {}", args.queue))?;
    println!("connected to {} as session {}", args.queue, session_id);
    for time_base in client.time_bases() {
        println!(
            "  time base {}: {} on {} (domain {}, transportSpecific {})",
            time_base.index,
            time_base.name,
            time_base.interface_name,
            time_base.domain_number,
            time_base.transport_specific
        );
    }

    let initial = client.subscribe(args.time_base, subscription)?;
    println!("time base {} initial: {}", args.time_base, initial);

    let outcome = watch(&mut client, &args, &stopping);
    if let Err(e) = client.disconnect() {
        warn!("Disconnect failed: {}", e);
    }
    outcome
}

fn build_subscription(args: &Args) -> Result<Subscription> {
    let (lower, upper) = args.offset_range;
    let mut subscription = Subscription::new(mask_of(&args.events));
    subscription.define_threshold(OFFSET_THRESHOLD, upper, lower)?;
    if !args.composite.is_empty() {
        subscription = subscription.with_composite(mask_of(&args.composite))?;
    }
    if subscription.event_mask.is_empty() {
        bail!("no events selected");
    }
    Ok(subscription)
}

fn watch(client: &mut ClockClient, args: &Args, stopping: &AtomicBool) -> Result<()> {
    let timeout = Duration::from_secs(args.timeout);
    let mut seen = 0u64;
    while !stopping.load(Ordering::Acquire) {
        if args.count.is_some_and(|count| seen >= count) {
            break;
        }
        match client.status_wait(args.time_base, timeout)? {
            WaitStatus::Updated { state, counts } => {
                seen += 1;
                println!("time base {}: {}", args.time_base, state);
                println!(
                    "  transitions: offset={} synced={} as_capable={} gm_changed={} composite={}",
                    counts.offset_in_range,
                    counts.synced_to_primary_clock,
                    counts.as_capable,
                    counts.gm_changed,
                    counts.composite
                );
            }
            WaitStatus::Timeout => println!("time base {}: no change", args.time_base),
            WaitStatus::Disconnected => bail!("proxy went away"),
        }
    }
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.to_lowercase()))
        .context("Invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#![deny(missing_docs)]
//! A command-line driver for the OTP mailbox: pad setup, sending, polling and reconciliation.

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use otp_core::OtpSystem;
use otp_core::codec::Record;
use otp_core::config::{CONFIG_FILE, OtpConfig};
use otp_core::events::Decrypted;
use otp_core::receiver::PollReport;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(
    after_help = "EXAMPLES:\n  \n# Generate 5 pairs of 4KB pads\notp-cli --root ./otp setup --count 5 --size 4096\n\n# Send a message\notp-cli --root ./otp send --category Alert --lat 40.7128 --lon -74.0060 --info \"Target secure\"\n\n# Decrypt everything waiting in the mailbox once\notp-cli --root ./otp poll\n\n# Keep polling every 2 seconds until Ctrl-C\notp-cli --root ./otp serve"
)]
struct Cli {
    /// Root directory of the installation. Defaults to $OTP_ROOT, then the current directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the directory layout and generate paired pads
    Setup {
        /// The number of pad pairs to generate
        #[arg(short, long)]
        count: Option<usize>,
        /// The size of each pad in bytes
        #[arg(short, long)]
        size: Option<usize>,
    },
    /// Encrypt a message with one sender pad and drop it in the mailbox
    Send {
        /// Message category (e.g. Alert, Info, Status)
        #[arg(long)]
        category: String,
        /// Latitude as a decimal number
        #[arg(long, allow_hyphen_values = true)]
        lat: String,
        /// Longitude as a decimal number
        #[arg(long, allow_hyphen_values = true)]
        lon: String,
        /// Free-form text
        #[arg(long, default_value = "")]
        info: String,
    },
    /// Try to decrypt every pending message once
    Poll,
    /// Forget earlier failures and try every pending message again
    Retry,
    /// Poll the mailbox periodically until interrupted
    Serve {
        /// Poll period in milliseconds. Defaults to the configured interval.
        #[arg(long, value_name = "MS")]
        interval_ms: Option<u64>,
    },
    /// List all decrypted messages
    Messages,
    /// Show pad counts and mailbox status
    Status,
    /// List the sender-side pads as JSON
    Pads,
    /// Delete pads
    Purge {
        /// Which pads to delete
        #[arg(value_enum)]
        target: PurgeTarget,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PurgeTarget {
    /// Every sender-side pad
    Sender,
    /// Every receiver-side pad
    Receiver,
    /// Every pad on both sides
    All,
    /// Receiver-side pads whose sender copy is gone
    Orphans,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let root = cli
        .root
        .or_else(|| env::var_os("OTP_ROOT").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let config = match OtpConfig::load(&root) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    let system = match OtpSystem::open(config) {
        Ok(system) => system,
        Err(e) => {
            error!("Failed to open '{}': {e}", root.display());
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Setup { count, size } => setup(&system, count, size),
        Commands::Send {
            category,
            lat,
            lon,
            info,
        } => send(&system, &Record::new(category, lat, lon, info)),
        Commands::Poll => report(system.receiver.poll()),
        Commands::Retry => report(system.receiver.retry_all()),
        Commands::Serve { interval_ms } => {
            let interval =
                interval_ms.map_or_else(|| system.config.poll_interval(), Duration::from_millis);
            serve(&system, interval).await
        }
        Commands::Messages => messages(&system),
        Commands::Status => status(&system),
        Commands::Pads => pads(&system),
        Commands::Purge { target } => purge(&system, target),
    }
}

fn setup(system: &OtpSystem, count: Option<usize>, size: Option<usize>) -> ExitCode {
    let root = &system.config.root;
    info!("Setting up system at {}", root.display());
    let saved = if root.join(CONFIG_FILE).exists() {
        Ok(())
    } else {
        system.config.save()
    };
    if let Err(e) = saved {
        error!("Failed to save configuration: {e}");
        return ExitCode::FAILURE;
    }
    let count = count.unwrap_or(system.config.pad_count);
    let size = size.unwrap_or(system.config.pad_size);
    match system.pads.generate(count, size) {
        Ok(names) => {
            for name in names {
                println!("{name}");
            }
            info!("Generated {count} pads of {size} bytes each.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to generate pads: {e}");
            ExitCode::FAILURE
        }
    }
}

fn send(system: &OtpSystem, record: &Record) -> ExitCode {
    let outcome = system.sender.send_record(record);
    match outcome.delivery() {
        Some(delivery) => {
            println!("{}", delivery.item_name);
            println!("Remaining pads: {}", system.sender.remaining_pads());
            ExitCode::SUCCESS
        }
        None => {
            let reason = outcome.reason().unwrap_or_default();
            eprintln!("Failed to send message: {reason}");
            ExitCode::FAILURE
        }
    }
}

fn report(report: PollReport) -> ExitCode {
    println!(
        "Decrypted: {}, Failed: {}, Skipped: {}, Errors: {}",
        report.decrypted, report.failed, report.skipped, report.errors
    );
    if report.errors == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Owns the poll timer. A tick runs `poll()` on a blocking worker and waits for
/// it, so Ctrl-C only takes effect between polls.
async fn serve(system: &OtpSystem, interval: Duration) -> ExitCode {
    let subscription = system.receiver.subscribe();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        "Server processing started (every {} ms).",
        interval.as_millis()
    );
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let receiver = Arc::clone(&system.receiver);
                if let Err(e) = tokio::task::spawn_blocking(move || receiver.poll()).await {
                    error!("Poll task failed: {e}");
                }
                for event in subscription.drain() {
                    print_event(&event);
                }
            }
            _ = &mut shutdown => {
                info!("Server processing stopped.");
                break;
            }
        }
    }
    system.receiver.unsubscribe(subscription.id());
    ExitCode::SUCCESS
}

fn print_event(event: &Decrypted) {
    println!("\n------ NEW MESSAGE DECRYPTED ------");
    println!("Encrypted data (hex): {}", event.ciphertext_preview);
    println!("Ciphertext SHA-256:   {}", event.ciphertext_sha256);
    println!("Used one-time pad:    {}", event.pad_name);
    println!("Mailbox item:         {}", event.item_name);
    print_record(&event.record);
}

fn print_record(line: &str) {
    println!("{:-<40}", "");
    let fields = otp_core::codec::decode(line);
    match Record::from_line(line) {
        Some(record) => {
            println!("Type:      {}", record.category);
            println!("Latitude:  {}", record.latitude);
            println!("Longitude: {}", record.longitude);
            println!("Info:      {}", record.info);
            if let Some(received) = fields.get(4) {
                println!("Received:  {received}");
            }
        }
        None => println!("{line}"),
    }
    println!("{:-<40}", "");
}

fn messages(system: &OtpSystem) -> ExitCode {
    let messages = system.receiver.decrypted_messages();
    if messages.is_empty() {
        println!("No decrypted messages available.");
        return ExitCode::SUCCESS;
    }
    println!("------ DECRYPTED MESSAGES ({}) ------", messages.len());
    for (i, message) in messages.iter().enumerate() {
        println!("\nMessage #{}:", i + 1);
        print_record(message);
    }
    ExitCode::SUCCESS
}

fn status(system: &OtpSystem) -> ExitCode {
    let pads = match system.pads.status() {
        Ok(pads) => pads,
        Err(e) => {
            error!("Failed to read pad status: {e}");
            return ExitCode::FAILURE;
        }
    };
    let pending = match system.mailbox.list() {
        Ok(items) => items.len(),
        Err(e) => {
            error!("Failed to list the mailbox: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("Status for: {}", system.config.root.display());
    println!("{:-<40}", "");
    println!("Sender Pads: {} ({} bytes)", pads.sender_pads, pads.sender_bytes);
    println!(
        "Receiver Pads: {} ({} bytes)",
        pads.receiver_pads, pads.receiver_bytes
    );
    println!("Pending Messages: {pending}");
    println!(
        "Decrypted Messages: {}",
        system.receiver.decrypted_messages().len()
    );
    ExitCode::SUCCESS
}

fn pads(system: &OtpSystem) -> ExitCode {
    let listing = system
        .pads
        .sender_pads()
        .map_err(|e| e.to_string())
        .and_then(|pads| serde_json::to_string_pretty(&pads).map_err(|e| e.to_string()));
    match listing {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to list pads: {e}");
            ExitCode::FAILURE
        }
    }
}

fn purge(system: &OtpSystem, target: PurgeTarget) -> ExitCode {
    let result = match target {
        PurgeTarget::Sender => system.pads.purge_sender(),
        PurgeTarget::Receiver => system.pads.purge_receiver(),
        PurgeTarget::All => system.pads.purge_all(),
        PurgeTarget::Orphans => system.pads.purge_orphans().map(|purged| purged.len()),
    };
    match result {
        Ok(0) => {
            println!("No pads found to delete.");
            ExitCode::SUCCESS
        }
        Ok(n) => {
            println!("Deleted {n} pad(s).");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to delete pads: {e}");
            ExitCode::FAILURE
        }
    }
}

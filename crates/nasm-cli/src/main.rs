//! `nasm` command-line tool.
//!
//! # Usage
//!
//! ```bash
//! # Encrypt to report.pdf.nasm, then decrypt back to report.pdf
//! nasm encrypt --key alpha.json report.pdf
//! nasm decrypt --key alpha.json report.pdf.nasm
//!
//! # Headered format with a random IV
//! nasm seal --key alpha.json --intensity 4 report.pdf
//! nasm open --key alpha.json --intensity 4 report.pdf.nasm --output copy.pdf
//!
//! # Validate a key file
//! nasm check-key alpha.json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nasm_cli::{FileEvent, FileJob, FileService, ProgressDeciles, SystemEnv, load_key};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Keystream file encryption
#[derive(Parser, Debug)]
#[command(name = "nasm")]
#[command(about = "Encrypt and decrypt files with a nasm key")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encrypt a file
    Encrypt {
        #[command(flatten)]
        target: Target,

        /// Feedback rounds per byte. Only intensity 1 decrypts with `decrypt`
        #[arg(short, long, default_value_t = 1, value_parser = intensity_parser())]
        intensity: u32,
    },

    /// Decrypt a file encrypted at intensity 1
    Decrypt {
        #[command(flatten)]
        target: Target,
    },

    /// Seal a file with a random IV and timestamp header
    Seal {
        #[command(flatten)]
        target: Target,

        /// Generator steps per byte
        #[arg(short, long, default_value_t = 1, value_parser = intensity_parser())]
        intensity: u32,
    },

    /// Open a sealed file
    Open {
        #[command(flatten)]
        target: Target,

        /// Generator steps per byte, as used when sealing
        #[arg(short, long, default_value_t = 1, value_parser = intensity_parser())]
        intensity: u32,
    },

    /// Load and validate a key file
    CheckKey {
        /// Key file (JSON)
        key: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct Target {
    /// Key file (JSON)
    #[arg(short, long)]
    key: PathBuf,

    /// Input file
    input: PathBuf,

    /// Output file; derived from the input name when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn intensity_parser() -> clap::builder::RangedI64ValueParser<u32> {
    clap::value_parser!(u32).range(1..=1000)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let (job, target) = match args.command {
        Command::Encrypt { target, intensity } => (FileJob::Encrypt { intensity }, target),
        Command::Decrypt { target } => (FileJob::Decrypt, target),
        Command::Seal { target, intensity } => (FileJob::Seal { intensity }, target),
        Command::Open { target, intensity } => (FileJob::Open { intensity }, target),
        Command::CheckKey { key } => {
            let config = load_key(&key).await?;
            tracing::info!(
                name = %config.name,
                degree = config.degree,
                operations = config.operations.len(),
                degenerate = config.is_degenerate(),
                "key is valid"
            );
            if config.is_degenerate() {
                tracing::warn!("bounds are degenerate; every keystream byte will be the same");
            }
            return Ok(());
        },
    };

    let config = load_key(&target.key).await?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let service = FileService::new(SystemEnv::new(), events_tx);
    let reporter = tokio::spawn(report(events_rx));

    let cancel = service.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            cancel.cancel();
        }
    });

    let result = service.run(job, &target.input, target.output.as_deref(), &config).await;

    // Last sender gone; the reporter drains and exits
    drop(service);
    reporter.await?;

    result?;
    Ok(())
}

async fn report(mut events: UnboundedReceiver<FileEvent>) {
    let mut deciles = ProgressDeciles::default();
    while let Some(event) = events.recv().await {
        match event {
            FileEvent::Progress(fraction) => {
                if let Some(percent) = deciles.observe(fraction) {
                    tracing::info!(percent, "progress");
                }
            },
            FileEvent::Notice { title, body } => tracing::info!(%title, "{body}"),
        }
    }
}

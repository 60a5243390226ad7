use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use intake_core::directory::Directories;
use intake_core::memory::{DirectorySeed, InMemoryDirectory};
use intake_core::{IntakeConfig, ProcessingContext};
use intake_hl7::{replay, Hl7Parser, ReportProcessor};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "intake-cli",
    about = "Replay logged HL7 report messages into an in-memory clinical record."
)]
struct Args {
    /// JSON directory seed, including the message log to replay.
    #[arg(short, long)]
    directory: PathBuf,

    /// JSON configuration overrides; missing keys keep their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// First log entry id to replay (inclusive).
    #[arg(long, default_value_t = 1)]
    from: i64,

    /// Last log entry id to replay (inclusive).
    #[arg(long, default_value_t = i64::MAX)]
    to: i64,

    /// User recorded as creator of the stored encounters.
    #[arg(long, default_value = "intake-cli")]
    creator: String,

    /// Print the stored encounters as JSON after the summary.
    #[arg(long)]
    dump: bool,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("intake=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let seed: DirectorySeed = read_json(&args.directory)?;
    let config: IntakeConfig = match &args.config {
        Some(path) => read_json(path)?,
        None => IntakeConfig::default(),
    };

    tracing::info!(
        entries = seed.message_log.len(),
        path = %args.directory.display(),
        "loaded directory seed"
    );
    let directory = InMemoryDirectory::from_seed(seed);
    let processor = ReportProcessor::new(Directories::from(&directory), &config);
    let context = ProcessingContext::now(args.creator.as_str());

    let summary = replay(&directory, args.from, args.to, &Hl7Parser, &processor, &context)
        .context("replay could not read the message log")?;

    println!(
        "Processed: {}\nSkipped: {}\nFailed: {}",
        summary.processed,
        summary.skipped,
        summary.failures.len()
    );
    for failure in &summary.failures {
        println!("  #{}: {}", failure.entry_id, failure.error);
    }

    if args.dump {
        println!("{}", serde_json::to_string_pretty(&directory.encounters())?);
    }

    Ok(())
}

use std::path::PathBuf;
use std::time::Duration;

use cable_rig_runtime::config::RELEASE_TIME;
use cable_rig_runtime::runtime::{self, Job, RunOptions};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Self-calibrating four-motor cable rig
#[derive(Parser, Debug)]
#[command(name = "cable-rig", version)]
struct Cli {
    /// JSON rig configuration (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial port of the servo bus, overrides the configuration
    #[arg(long)]
    port: Option<String>,

    /// Only log status, do not publish it over Zenoh
    #[arg(long)]
    no_publish: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find every motor's travel range and center the disc (default)
    Calibrate,
    /// Reel out every string to take the tension off the array
    Relax {
        #[arg(long, default_value_t = RELEASE_TIME.as_millis() as u64)]
        time_ms: u64,
    },
    /// Log present angle of every motor
    Status,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=debug for per-command and load detail)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let cli = Cli::parse();
    let job = match cli.command.unwrap_or(Command::Calibrate) {
        Command::Calibrate => Job::Calibrate,
        Command::Relax { time_ms } => Job::Release(Duration::from_millis(time_ms)),
        Command::Status => Job::Status,
    };
    let options = RunOptions {
        config: cli.config,
        port: cli.port,
        publish: !cli.no_publish,
        job,
    };

    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

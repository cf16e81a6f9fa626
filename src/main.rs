use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use fluxrelay::config;
use fluxrelay::event::Event;
use fluxrelay::relay::Dispatcher;

/// Relays monitoring check results to InfluxDB.
#[derive(Parser)]
#[command(name = "fluxrelay", about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print version information and exit.
    Version,
}

/// Build-time version info, injected through the `GIT_COMMIT` env var.
mod version {
    /// Release version string (set at build time).
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    /// Git commit hash (set at build time via env, or "unknown").
    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    /// Target OS.
    pub fn target_os() -> &'static str {
        std::env::consts::OS
    }

    /// Target architecture.
    pub fn target_arch() -> &'static str {
        std::env::consts::ARCH
    }

    /// Full version string with platform info.
    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            target_os(),
            target_arch(),
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle version subcommand before anything else.
    if let Some(Command::Version) = &cli.command {
        println!("fluxrelay {}", version::full());
        return Ok(());
    }

    // Initialize tracing.
    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;

    fmt().with_env_filter(filter).with_target(true).init();

    // Config is required for the relay run.
    let config_path = cli
        .config
        .context("--config is required (use --help for usage)")?;

    let cfg = config::Config::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    tracing::info!(
        version = version::RELEASE,
        commit = version::git_commit(),
        "starting fluxrelay",
    );

    run(cfg)
}

/// Read newline-delimited JSON events from stdin until EOF, flushing every
/// handler on the way out.
fn run(cfg: config::Config) -> Result<()> {
    let mut dispatcher = Dispatcher::from_config(&cfg)?;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading event from stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let event: Event = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(err) => {
                tracing::error!(error = %err, "discarding malformed event");
                continue;
            }
        };

        let outcome = dispatcher.run(&event);
        tracing::debug!(
            check = %event.check.name,
            outcome = outcome.as_str(),
            code = outcome.code(),
            "processed event",
        );
    }

    dispatcher.flush_all();

    tracing::info!("fluxrelay stopped");

    Ok(())
}

/// yourMoment CLI — process lifecycle commands driving the monitoring
/// pipeline without a server.
///
/// Entry point for the `yourmoment` binary. Parses CLI arguments,
/// initializes logging, and dispatches to subcommand handlers.
mod commands;
mod runtime;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use yourmoment_core::config::Config;

use commands::{StartArgs, StatusArgs, StopArgs, TickArgs};
use runtime::Runtime;

/// Drives AI-generated commentary on upstream articles.
#[derive(Parser)]
#[command(name = "yourmoment")]
#[command(version)]
#[command(about = "Drives AI-generated commentary on upstream articles")]
#[command(after_help = "\
Quick start:
  1. yourmoment start <process-id>  — begin monitoring
  2. yourmoment tick                — drive one scheduler tick
  3. yourmoment status              — observe running processes
  4. yourmoment stop <process-id>   — stop monitoring")]
struct Cli {
    /// Path to config.toml
    #[arg(short = 'c', long, global = true, default_value = "~/.yourmoment/config.toml")]
    config: String,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Start a monitoring process
    Start(StartArgs),
    /// Stop a monitoring process
    Stop(StopArgs),
    /// Drive one scheduler tick
    Tick(TickArgs),
    /// Show process status and work-item counts
    Status(StatusArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose/--quiet flags > default (warn).
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("yourmoment=debug,yourmoment_core=debug,info")
    } else if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::new("yourmoment=info,yourmoment_core=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.verbose)
        .compact()
        .init();

    let config = Config::load_and_validate(Some(&cli.config)).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::anyhow!(
            "invalid configuration:\n  {}\nHint: set YOURMOMENT_VAULT_KEY and check {}",
            messages.join("\n  "),
            cli.config
        )
    })?;

    let runtime = Runtime::init(&config).await?;

    match cli.command {
        Commands::Start(args) => commands::start::execute(&runtime, args, cli.json).await?,
        Commands::Stop(args) => commands::stop::execute(&runtime, args, cli.json).await?,
        Commands::Tick(args) => commands::tick::execute(&runtime, args, cli.json).await?,
        Commands::Status(args) => commands::status::execute(&runtime, args, cli.json).await?,
    }

    runtime.pool.close().await;

    Ok(())
}

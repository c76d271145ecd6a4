//! CLI subcommand argument definitions and implementations for yourMoment.

pub mod start;
pub mod status;
pub mod stop;
pub mod tick;

use clap::Args;
use uuid::Uuid;

/// Arguments for the `start` subcommand.
#[derive(Debug, Args)]
pub struct StartArgs {
    /// Id of the process to start.
    pub process_id: Uuid,
}

/// Arguments for the `stop` subcommand.
#[derive(Debug, Args)]
pub struct StopArgs {
    /// Id of the process to stop.
    pub process_id: Uuid,

    /// Why the process is being stopped.
    #[arg(long, default_value = "manual")]
    pub reason: String,
}

/// Arguments for the `tick` subcommand.
#[derive(Debug, Args)]
pub struct TickArgs;

/// Arguments for the `status` subcommand.
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Show a single process's detail (work-item counts by stage). Lists
    /// every process if omitted.
    pub process_id: Option<Uuid>,
}

/// Print either pretty JSON or a human-readable line, matching the
/// teacher CLI's dual-format output convention.
pub fn print_output<T: serde::Serialize>(value: &T, json: bool, text: impl FnOnce(&T)) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(value).expect("serialization cannot fail")
        );
    } else {
        text(value);
    }
}

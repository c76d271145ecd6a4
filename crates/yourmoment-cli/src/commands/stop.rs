//! Implementation of the `yourmoment stop` command.

use serde::Serialize;
use yourmoment_core::storage::processes::ProcessStatus;

use super::{print_output, StopArgs};
use crate::runtime::Runtime;

#[derive(Serialize)]
struct StopOutput {
    process_id: uuid::Uuid,
    status: ProcessStatus,
    stop_reason: Option<String>,
}

pub async fn execute(runtime: &Runtime, args: StopArgs, json: bool) -> anyhow::Result<()> {
    let process = runtime
        .scheduler
        .stop_process(args.process_id, &args.reason)
        .await
        .map_err(|e| anyhow::anyhow!("failed to stop process {}: {e}", args.process_id))?;

    let output = StopOutput {
        process_id: process.id,
        status: process.status,
        stop_reason: process.stop_reason,
    };

    print_output(&output, json, |o| {
        println!(
            "stopped process {} (status={:?}, reason={})",
            o.process_id,
            o.status,
            o.stop_reason.as_deref().unwrap_or("n/a")
        );
    });

    Ok(())
}

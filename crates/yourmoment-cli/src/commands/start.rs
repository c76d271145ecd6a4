//! Implementation of the `yourmoment start` command.

use serde::Serialize;
use yourmoment_core::storage::processes::ProcessStatus;

use super::{print_output, StartArgs};
use crate::runtime::Runtime;

#[derive(Serialize)]
struct StartOutput {
    process_id: uuid::Uuid,
    status: ProcessStatus,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn execute(runtime: &Runtime, args: StartArgs, json: bool) -> anyhow::Result<()> {
    let process = runtime
        .scheduler
        .start_process(args.process_id)
        .await
        .map_err(|e| anyhow::anyhow!("failed to start process {}: {e}", args.process_id))?;

    let output = StartOutput {
        process_id: process.id,
        status: process.status,
        expires_at: process.expires_at,
    };

    print_output(&output, json, |o| {
        println!(
            "started process {} (status={:?}, expires_at={})",
            o.process_id,
            o.status,
            o.expires_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "n/a".to_string())
        );
    });

    Ok(())
}

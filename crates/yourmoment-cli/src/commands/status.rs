//! Implementation of the `yourmoment status` command.

use serde::Serialize;
use yourmoment_core::storage::processes::{self, ProcessStatus};
use yourmoment_core::storage::work_items::{self, WorkItemStatus};

use super::{print_output, StatusArgs};
use crate::runtime::Runtime;

#[derive(Serialize)]
struct ProcessSummary {
    id: uuid::Uuid,
    name: String,
    status: ProcessStatus,
    generate_only: bool,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Serialize)]
struct ProcessDetail {
    #[serde(flatten)]
    summary: ProcessSummary,
    work_items_by_stage: Vec<(WorkItemStatus, i64)>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum StatusOutput {
    List(Vec<ProcessSummary>),
    Detail(ProcessDetail),
}

pub async fn execute(runtime: &Runtime, args: StatusArgs, json: bool) -> anyhow::Result<()> {
    let output = match args.process_id {
        Some(id) => {
            let process = processes::get(&runtime.pool, id)
                .await
                .map_err(|e| anyhow::anyhow!("process {id} not found: {e}"))?;
            let counts = work_items::count_by_status(&runtime.pool, id)
                .await
                .map_err(|e| anyhow::anyhow!("failed to load work item counts: {e}"))?;
            StatusOutput::Detail(ProcessDetail {
                summary: ProcessSummary {
                    id: process.id,
                    name: process.name,
                    status: process.status,
                    generate_only: process.generate_only,
                    started_at: process.started_at,
                    expires_at: process.expires_at,
                },
                work_items_by_stage: counts,
            })
        }
        None => {
            let running = processes::list_running(&runtime.pool)
                .await
                .map_err(|e| anyhow::anyhow!("failed to list running processes: {e}"))?;
            StatusOutput::List(
                running
                    .into_iter()
                    .map(|process| ProcessSummary {
                        id: process.id,
                        name: process.name,
                        status: process.status,
                        generate_only: process.generate_only,
                        started_at: process.started_at,
                        expires_at: process.expires_at,
                    })
                    .collect(),
            )
        }
    };

    print_output(&output, json, |o| match o {
        StatusOutput::List(processes) => {
            if processes.is_empty() {
                println!("no running processes");
            }
            for p in processes {
                println!("{} {:<24} status={:?} generate_only={}", p.id, p.name, p.status, p.generate_only);
            }
        }
        StatusOutput::Detail(detail) => {
            println!(
                "{} {:<24} status={:?} generate_only={}",
                detail.summary.id, detail.summary.name, detail.summary.status, detail.summary.generate_only
            );
            for (status, count) in &detail.work_items_by_stage {
                println!("  {status:?}: {count}");
            }
        }
    });

    Ok(())
}

//! Implementation of the `yourmoment tick` command.
//!
//! Runs one scheduler tick and exits. Designed for integration with an
//! external scheduler (cron, systemd timer) in place of a long-running
//! `run` loop, in the spirit of the teacher's own `tick` command.

use serde::Serialize;
use yourmoment_core::scheduler::{Stage, StageAction};

use super::{print_output, TickArgs};
use crate::runtime::Runtime;

#[derive(Serialize)]
struct TickOutput {
    spawned: u32,
    already_running: u32,
    skipped_generate_only: u32,
    timed_out: Vec<uuid::Uuid>,
    actions: Vec<ActionJson>,
}

#[derive(Serialize)]
struct ActionJson {
    process_id: uuid::Uuid,
    stage: &'static str,
    action: &'static str,
}

fn stage_name(stage: Stage) -> &'static str {
    match stage {
        Stage::Discovery => "discovery",
        Stage::Preparation => "preparation",
        Stage::Generation => "generation",
        Stage::Posting => "posting",
    }
}

fn action_name(action: &StageAction) -> &'static str {
    match action {
        StageAction::Spawned => "spawned",
        StageAction::AlreadyRunning => "already_running",
        StageAction::SkippedGenerateOnly => "skipped_generate_only",
    }
}

pub async fn execute(runtime: &Runtime, _args: TickArgs, json: bool) -> anyhow::Result<()> {
    let summary = runtime
        .scheduler
        .tick()
        .await
        .map_err(|e| anyhow::anyhow!("scheduler tick failed: {e}"))?;

    let actions: Vec<ActionJson> = summary
        .actions
        .iter()
        .map(|(process_id, stage, action)| ActionJson {
            process_id: *process_id,
            stage: stage_name(*stage),
            action: action_name(action),
        })
        .collect();

    let output = TickOutput {
        spawned: actions.iter().filter(|a| a.action == "spawned").count() as u32,
        already_running: actions
            .iter()
            .filter(|a| a.action == "already_running")
            .count() as u32,
        skipped_generate_only: actions
            .iter()
            .filter(|a| a.action == "skipped_generate_only")
            .count() as u32,
        timed_out: summary.timed_out,
        actions,
    };

    print_output(&output, json, |o| {
        println!(
            "tick: spawned={} already_running={} skipped_generate_only={} timed_out={}",
            o.spawned,
            o.already_running,
            o.skipped_generate_only,
            o.timed_out.len()
        );
        for action in &o.actions {
            println!("  {} {:<12} {}", action.process_id, action.stage, action.action);
        }
        for process_id in &o.timed_out {
            println!("  {process_id} stopped: deadline exceeded");
        }
    });

    Ok(())
}

//! Scheduler / orchestrator (C5): the periodic tick that drives the four
//! pipeline stage workers for every running process, plus the process
//! control surface (start / stop / trigger-post-only).
//!
//! The reference implementation dedups spawned stage tasks via a Celery
//! `AsyncResult(task_id).state` lookup. This workspace has no external job
//! queue, so a task handle here is a `tokio::task::JoinHandle<StageResult>`
//! kept in an in-memory map keyed by `(process_id, Stage)`, not a column on
//! the `processes` row -- a `JoinHandle` is not serializable, and this
//! state is scoped to the owning worker process's lifetime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::pipeline::{discovery, generation, posting, preparation, StageResult};
use crate::storage::processes::{self, Process, ProcessStatus};
use crate::storage::upstream_logins::{self, UpstreamLogin};
use crate::storage::DbPool;
use crate::upstream::SessionRegistry;
use crate::vault::VaultKey;

/// One of the four pipeline stages, in the order the scheduler drives them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Find new articles.
    Discovery,
    /// Fetch full article content.
    Preparation,
    /// Generate a comment via the configured LLM provider.
    Generation,
    /// Post the generated comment upstream.
    Posting,
}

impl Stage {
    /// All four stages, in the fixed order the scheduler drives them.
    pub const ALL: [Stage; 4] = [
        Stage::Discovery,
        Stage::Preparation,
        Stage::Generation,
        Stage::Posting,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Stage::Discovery => "discovery",
            Stage::Preparation => "preparation",
            Stage::Generation => "generation",
            Stage::Posting => "posting",
        }
    }
}

/// Outcome of spawning (or skipping) a single `(process, stage)` pair
/// during one tick.
#[derive(Debug, Clone)]
pub enum StageAction {
    /// A new worker was spawned for this stage.
    Spawned,
    /// A prior tick's worker for this stage has not yet completed.
    AlreadyRunning,
    /// Posting is skipped entirely for a `generate_only` process.
    SkippedGenerateOnly,
}

/// Summary of one scheduler tick.
#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    /// `(process_id, stage, action)` for every stage considered this tick.
    pub actions: Vec<(Uuid, Stage, StageAction)>,
    /// Processes stopped this tick because they exceeded their deadline.
    pub timed_out: Vec<Uuid>,
}

/// Validate that a process may be started.
pub fn validate_start(
    process: &Process,
    login_count: usize,
    template_count: usize,
) -> Result<(), PipelineError> {
    if login_count == 0 {
        return Err(PipelineError::Validation {
            message: "process has no upstream logins attached".to_string(),
        });
    }
    if template_count == 0 {
        return Err(PipelineError::Validation {
            message: "process has no prompt templates attached".to_string(),
        });
    }
    if !(1..=1440).contains(&process.max_duration_minutes) {
        return Err(PipelineError::Validation {
            message: "max_duration_minutes must be between 1 and 1440".to_string(),
        });
    }
    Ok(())
}

/// Drives the pipeline for every running process on a periodic tick, and
/// exposes the start/stop/trigger-post-only control surface.
pub struct Scheduler {
    pool: DbPool,
    registry: Arc<SessionRegistry>,
    vault_key: VaultKey,
    disclosure_prefix: String,
    base_url: String,
    discovery_limit: usize,
    handles: Mutex<HashMap<(Uuid, Stage), JoinHandle<StageResult>>>,
}

impl Scheduler {
    /// Build a new scheduler with no in-flight stage handles.
    pub fn new(
        pool: DbPool,
        registry: Arc<SessionRegistry>,
        vault_key: VaultKey,
        disclosure_prefix: String,
        base_url: String,
        discovery_limit: usize,
    ) -> Self {
        Self {
            pool,
            registry,
            vault_key,
            disclosure_prefix,
            base_url,
            discovery_limit,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Start a process: validates preconditions, transitions it to
    /// `running`, and immediately enqueues a Discovery worker.
    pub async fn start_process(&self, process_id: Uuid) -> Result<Process, PipelineError> {
        let process = processes::get(&self.pool, process_id).await?;
        let login_ids = processes::login_ids(&self.pool, process_id).await?;
        let template_ids = processes::template_ids(&self.pool, process_id).await?;
        validate_start(&process, login_ids.len(), template_ids.len())?;

        let started = processes::start(&self.pool, process_id).await?;
        self.spawn_stage(&started, Stage::Discovery).await;
        Ok(started)
    }

    /// Stop a process (idempotent) and revoke its in-flight stage handles.
    pub async fn stop_process(&self, process_id: Uuid, reason: &str) -> Result<Process, PipelineError> {
        let process = processes::stop(&self.pool, process_id, reason).await?;
        self.revoke_handles(process_id).await;
        Ok(process)
    }

    /// One-shot enqueue of the Posting worker for items currently
    /// `generated`, regardless of `generate_only`. Used when a user decides
    /// to post the comments of a previously `generate_only` process.
    pub async fn trigger_post_only(&self, process_id: Uuid) -> Result<(), PipelineError> {
        let process = processes::get(&self.pool, process_id).await?;
        self.spawn_stage(&process, Stage::Posting).await;
        Ok(())
    }

    async fn revoke_handles(&self, process_id: Uuid) {
        let mut handles = self.handles.lock().await;
        for stage in Stage::ALL {
            if let Some(handle) = handles.remove(&(process_id, stage)) {
                handle.abort();
            }
        }
    }

    /// Run a single tick: enforce deadlines, then drive each running
    /// process's stages in order, skipping any stage whose prior-tick
    /// worker has not yet finished.
    pub async fn tick(&self) -> Result<TickSummary, PipelineError> {
        let mut summary = TickSummary::default();
        let running = processes::list_running(&self.pool).await?;

        for process in running {
            if let Some(expires_at) = process.expires_at {
                if Utc::now() > expires_at {
                    processes::stop(&self.pool, process.id, "timeout").await.ok();
                    self.revoke_handles(process.id).await;
                    summary.timed_out.push(process.id);
                    continue;
                }
            }

            for stage in Stage::ALL {
                if stage == Stage::Posting && process.generate_only {
                    summary
                        .actions
                        .push((process.id, stage, StageAction::SkippedGenerateOnly));
                    continue;
                }

                let already_running = {
                    let handles = self.handles.lock().await;
                    handles
                        .get(&(process.id, stage))
                        .is_some_and(|h| !h.is_finished())
                };

                if already_running {
                    summary
                        .actions
                        .push((process.id, stage, StageAction::AlreadyRunning));
                    continue;
                }

                self.spawn_stage(&process, stage).await;
                summary.actions.push((process.id, stage, StageAction::Spawned));
            }
        }

        Ok(summary)
    }

    /// Run ticks on `tick_period` until `cancel` fires, in the style of the
    /// automation runtime's other background loops.
    pub async fn run_until_cancelled(&self, tick_period: Duration, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Scheduler loop cancelled");
                    return;
                }
                () = tokio::time::sleep(tick_period) => {}
            }

            match self.tick().await {
                Ok(summary) => {
                    tracing::debug!(
                        spawned = summary.actions.iter().filter(|(_, _, a)| matches!(a, StageAction::Spawned)).count(),
                        timed_out = summary.timed_out.len(),
                        "Scheduler tick complete"
                    );
                }
                Err(e) => tracing::warn!(error = %e, "Scheduler tick failed"),
            }
        }
    }

    async fn spawn_stage(&self, process: &Process, stage: Stage) {
        let pool = self.pool.clone();
        let registry = self.registry.clone();
        let vault_key = self.vault_key.clone();
        let disclosure_prefix = self.disclosure_prefix.clone();
        let base_url = self.base_url.clone();
        let discovery_limit = self.discovery_limit;
        let process_id = process.id;
        let stage_name = stage.as_str();

        let handle: JoinHandle<StageResult> = tokio::spawn(async move {
            let outcome = run_stage(
                &pool,
                &registry,
                &vault_key,
                &disclosure_prefix,
                &base_url,
                discovery_limit,
                process_id,
                stage,
            )
            .await;

            match outcome {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(process = %process_id, stage = stage_name, error = %e, "stage worker failed");
                    let _ = processes::mark_failed(&pool, process_id, &e.to_string(), "stage_error").await;
                    StageResult::stage_exception(e.to_string(), 0)
                }
            }
        });

        let mut handles = self.handles.lock().await;
        handles.insert((process_id, stage), handle);
    }
}

async fn logins_by_id(
    pool: &DbPool,
    process_id: Uuid,
    vault_key: &VaultKey,
) -> Result<HashMap<Uuid, UpstreamLogin>, PipelineError> {
    let login_ids = processes::login_ids(pool, process_id).await?;
    let mut map = HashMap::with_capacity(login_ids.len());
    for id in login_ids {
        let login = upstream_logins::get(pool, id, vault_key).await?;
        map.insert(id, login);
    }
    Ok(map)
}

async fn run_stage(
    pool: &DbPool,
    registry: &SessionRegistry,
    vault_key: &VaultKey,
    disclosure_prefix: &str,
    base_url: &str,
    discovery_limit: usize,
    process_id: Uuid,
    stage: Stage,
) -> Result<StageResult, PipelineError> {
    let process = processes::get(pool, process_id).await?;

    match stage {
        Stage::Discovery => {
            let logins = logins_by_id(pool, process_id, vault_key).await?;
            let login_list: Vec<UpstreamLogin> = logins.into_values().collect();
            let filter = processes::ProcessFilter {
                category: process.filter_category.clone(),
                task: process.filter_task.clone(),
                tab: process.filter_tab.clone(),
                search: process.filter_search.clone(),
                sort: process.filter_sort.clone(),
            };
            Ok(discovery::run(
                pool,
                registry,
                base_url,
                process_id,
                &filter,
                &login_list,
                discovery_limit,
            )
            .await)
        }
        Stage::Preparation => {
            let logins = logins_by_id(pool, process_id, vault_key).await?;
            let template_ids = processes::template_ids(pool, process_id).await?;
            Ok(preparation::run(
                pool,
                registry,
                base_url,
                process_id,
                &logins,
                &template_ids,
                process.llm_provider_id,
            )
            .await)
        }
        Stage::Generation => {
            Ok(generation::run(pool, process_id, vault_key, disclosure_prefix).await)
        }
        Stage::Posting => {
            let logins = logins_by_id(pool, process_id, vault_key).await?;
            Ok(posting::run(pool, registry, base_url, process_id, &logins).await)
        }
    }
}

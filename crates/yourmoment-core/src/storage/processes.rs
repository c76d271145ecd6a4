//! CRUD operations for monitoring processes.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use crate::error::StorageError;

/// Process lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum ProcessStatus {
    /// Not currently scheduled.
    Stopped,
    /// Actively driven by the scheduler tick.
    Running,
    /// Terminated abnormally (stage exception after retries).
    Failed,
}

/// Optional discovery filter, passed verbatim to the upstream platform.
#[derive(Debug, Clone, Default)]
pub struct ProcessFilter {
    /// Category id filter (`kategorie=`).
    pub category: Option<String>,
    /// Task id filter (`aufgabe=`).
    pub task: Option<String>,
    /// Tab: `home`, `alle`, or a numeric classroom id.
    pub tab: Option<String>,
    /// Client-side title substring filter.
    pub search: Option<String>,
    /// Sort order (passed verbatim; not interpreted by the pipeline).
    pub sort: Option<String>,
}

/// A monitoring process, owned by a user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Process {
    /// Opaque identifier.
    pub id: Uuid,
    /// Owning user id.
    pub owner: Uuid,
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Hard cap on how long the process may run, in minutes (1..=1440).
    pub max_duration_minutes: i64,
    /// If true, the Posting stage is never invoked.
    pub generate_only: bool,
    /// Current lifecycle status.
    pub status: ProcessStatus,
    /// The single LLM provider configuration this process uses.
    pub llm_provider_id: Uuid,
    /// Discovery filter: category.
    pub filter_category: Option<String>,
    /// Discovery filter: task.
    pub filter_task: Option<String>,
    /// Discovery filter: tab.
    pub filter_tab: Option<String>,
    /// Discovery filter: search.
    pub filter_search: Option<String>,
    /// Discovery filter: sort.
    pub filter_sort: Option<String>,
    /// When the process started running, if ever.
    pub started_at: Option<DateTime<Utc>>,
    /// When the process stopped, if ever.
    pub stopped_at: Option<DateTime<Utc>>,
    /// `started_at + max_duration_minutes`, set at start.
    pub expires_at: Option<DateTime<Utc>>,
    /// Why the process stopped (e.g. "timeout", "stage_error").
    pub stop_reason: Option<String>,
    /// Error message if `status = failed`.
    pub error_message: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a new process.
pub struct NewProcess {
    /// Owning user id.
    pub owner: Uuid,
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Hard cap on how long the process may run, in minutes.
    pub max_duration_minutes: i64,
    /// If true, the Posting stage is never invoked.
    pub generate_only: bool,
    /// The single LLM provider configuration this process uses.
    pub llm_provider_id: Uuid,
    /// Discovery filter.
    pub filter: ProcessFilter,
    /// Upstream logins attached to this process (≥1 required to start).
    pub login_ids: Vec<Uuid>,
    /// Prompt templates attached to this process (≥1 required to start).
    pub template_ids: Vec<Uuid>,
}

/// Insert a new process in `stopped` status, along with its login/template
/// fanout links.
pub async fn create(pool: &DbPool, new: NewProcess) -> Result<Process, StorageError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let mut tx = pool
        .begin()
        .await
        .map_err(|source| StorageError::Query { source })?;

    sqlx::query(
        "INSERT INTO processes \
         (id, owner, name, description, max_duration_minutes, generate_only, status, \
          llm_provider_id, filter_category, filter_task, filter_tab, filter_search, \
          filter_sort, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, 'stopped', ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(new.owner.to_string())
    .bind(&new.name)
    .bind(&new.description)
    .bind(new.max_duration_minutes)
    .bind(new.generate_only)
    .bind(new.llm_provider_id.to_string())
    .bind(&new.filter.category)
    .bind(&new.filter.task)
    .bind(&new.filter.tab)
    .bind(&new.filter.search)
    .bind(&new.filter.sort)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|source| StorageError::Query { source })?;

    for login_id in &new.login_ids {
        sqlx::query("INSERT INTO process_logins (process_id, login_id) VALUES (?, ?)")
            .bind(id.to_string())
            .bind(login_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|source| StorageError::Query { source })?;
    }
    for template_id in &new.template_ids {
        sqlx::query("INSERT INTO process_prompts (process_id, template_id) VALUES (?, ?)")
            .bind(id.to_string())
            .bind(template_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|source| StorageError::Query { source })?;
    }

    tx.commit()
        .await
        .map_err(|source| StorageError::Query { source })?;

    get(pool, id).await
}

/// Fetch a process by id.
pub async fn get(pool: &DbPool, id: Uuid) -> Result<Process, StorageError> {
    sqlx::query_as("SELECT * FROM processes WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .map_err(|source| StorageError::Query { source })?
        .ok_or(StorageError::NotFound {
            entity: "process",
            id,
        })
}

/// List every process currently `running`.
pub async fn list_running(pool: &DbPool) -> Result<Vec<Process>, StorageError> {
    sqlx::query_as("SELECT * FROM processes WHERE status = 'running'")
        .fetch_all(pool)
        .await
        .map_err(|source| StorageError::Query { source })
}

/// Return the upstream login ids attached to a process.
pub async fn login_ids(pool: &DbPool, process_id: Uuid) -> Result<Vec<Uuid>, StorageError> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT login_id FROM process_logins WHERE process_id = ?")
            .bind(process_id.to_string())
            .fetch_all(pool)
            .await
            .map_err(|source| StorageError::Query { source })?;
    Ok(rows
        .into_iter()
        .filter_map(|(s,)| Uuid::parse_str(&s).ok())
        .collect())
}

/// Return the prompt template ids attached to a process.
pub async fn template_ids(pool: &DbPool, process_id: Uuid) -> Result<Vec<Uuid>, StorageError> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT template_id FROM process_prompts WHERE process_id = ?")
            .bind(process_id.to_string())
            .fetch_all(pool)
            .await
            .map_err(|source| StorageError::Query { source })?;
    Ok(rows
        .into_iter()
        .filter_map(|(s,)| Uuid::parse_str(&s).ok())
        .collect())
}

/// Start a process: validates preconditions, sets `running`, stamps
/// `started_at`/`expires_at`, clears prior stop/error fields.
///
/// Validation (login/template/provider presence, duration range) is the
/// caller's responsibility via [`crate::scheduler::validate_start`]; this
/// function performs the unconditional state transition only.
pub async fn start(pool: &DbPool, id: Uuid) -> Result<Process, StorageError> {
    let process = get(pool, id).await?;
    let now = Utc::now();
    let expires_at = now + chrono::Duration::minutes(process.max_duration_minutes);

    sqlx::query(
        "UPDATE processes SET status = 'running', started_at = ?, expires_at = ?, \
         stopped_at = NULL, stop_reason = NULL, error_message = NULL WHERE id = ?",
    )
    .bind(now)
    .bind(expires_at)
    .bind(id.to_string())
    .execute(pool)
    .await
    .map_err(|source| StorageError::Query { source })?;

    get(pool, id).await
}

/// Stop a process. Idempotent: stopping an already-stopped process leaves
/// its `stopped_at` untouched.
pub async fn stop(pool: &DbPool, id: Uuid, reason: &str) -> Result<Process, StorageError> {
    let process = get(pool, id).await?;
    if process.status == ProcessStatus::Stopped && process.stopped_at.is_some() {
        return Ok(process);
    }

    let now = Utc::now();
    sqlx::query(
        "UPDATE processes SET status = 'stopped', \
         stopped_at = COALESCE(stopped_at, ?), stop_reason = ? WHERE id = ?",
    )
    .bind(now)
    .bind(reason)
    .bind(id.to_string())
    .execute(pool)
    .await
    .map_err(|source| StorageError::Query { source })?;

    get(pool, id).await
}

/// Mark a process `failed` with an error message and stop reason.
pub async fn mark_failed(
    pool: &DbPool,
    id: Uuid,
    error_message: &str,
    stop_reason: &str,
) -> Result<Process, StorageError> {
    let now = Utc::now();
    sqlx::query(
        "UPDATE processes SET status = 'failed', stopped_at = COALESCE(stopped_at, ?), \
         stop_reason = ?, error_message = ? WHERE id = ?",
    )
    .bind(now)
    .bind(stop_reason)
    .bind(error_message)
    .bind(id.to_string())
    .execute(pool)
    .await
    .map_err(|source| StorageError::Query { source })?;

    get(pool, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{init_test_db, llm_providers, prompt_templates, upstream_logins};

    async fn fixture_provider(pool: &DbPool, owner: Uuid) -> Uuid {
        llm_providers::create(
            pool,
            llm_providers::NewLlmProviderConfig {
                owner,
                provider_tag: llm_providers::ProviderTag::Openai,
                model_name: "gpt-3.5-turbo".to_string(),
                api_key_plaintext: "sk-test".to_string(),
                max_tokens: 512,
                temperature: 0.7,
            },
            &crate::vault::VaultKey::from_bytes(vec![0u8; 32]).unwrap(),
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn create_and_fetch_process() {
        let pool = init_test_db().await.unwrap();
        let owner = Uuid::new_v4();
        let provider_id = fixture_provider(&pool, owner).await;
        let login = upstream_logins::create(
            &pool,
            upstream_logins::NewUpstreamLogin {
                owner,
                display_name: "L1".to_string(),
                username_plaintext: "user".to_string(),
                password_plaintext: "pass".to_string(),
                is_admin: false,
            },
            &crate::vault::VaultKey::from_bytes(vec![0u8; 32]).unwrap(),
        )
        .await
        .unwrap();
        let template = prompt_templates::create(
            &pool,
            prompt_templates::NewPromptTemplate {
                owner: Some(owner),
                category: prompt_templates::TemplateCategory::User,
                name: "T1".to_string(),
                description: None,
                system_prompt: "be nice".to_string(),
                user_prompt_template: "{article_title}".to_string(),
            },
        )
        .await
        .unwrap();

        let process = create(
            &pool,
            NewProcess {
                owner,
                name: "My process".to_string(),
                description: None,
                max_duration_minutes: 60,
                generate_only: false,
                llm_provider_id: provider_id,
                filter: ProcessFilter::default(),
                login_ids: vec![login.id],
                template_ids: vec![template.id],
            },
        )
        .await
        .unwrap();

        assert_eq!(process.status, ProcessStatus::Stopped);
        assert_eq!(login_ids(&pool, process.id).await.unwrap(), vec![login.id]);
        assert_eq!(
            template_ids(&pool, process.id).await.unwrap(),
            vec![template.id]
        );
    }

    #[tokio::test]
    async fn start_sets_running_and_expires_at() {
        let pool = init_test_db().await.unwrap();
        let owner = Uuid::new_v4();
        let provider_id = fixture_provider(&pool, owner).await;
        let process = create(
            &pool,
            NewProcess {
                owner,
                name: "P".to_string(),
                description: None,
                max_duration_minutes: 30,
                generate_only: false,
                llm_provider_id: provider_id,
                filter: ProcessFilter::default(),
                login_ids: vec![],
                template_ids: vec![],
            },
        )
        .await
        .unwrap();

        let started = start(&pool, process.id).await.unwrap();
        assert_eq!(started.status, ProcessStatus::Running);
        assert!(started.started_at.is_some());
        assert!(started.expires_at.unwrap() > started.started_at.unwrap());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let pool = init_test_db().await.unwrap();
        let owner = Uuid::new_v4();
        let provider_id = fixture_provider(&pool, owner).await;
        let process = create(
            &pool,
            NewProcess {
                owner,
                name: "P".to_string(),
                description: None,
                max_duration_minutes: 30,
                generate_only: false,
                llm_provider_id: provider_id,
                filter: ProcessFilter::default(),
                login_ids: vec![],
                template_ids: vec![],
            },
        )
        .await
        .unwrap();
        start(&pool, process.id).await.unwrap();

        let stopped_once = stop(&pool, process.id, "manual").await.unwrap();
        let first_stopped_at = stopped_once.stopped_at;

        let stopped_twice = stop(&pool, process.id, "manual-again").await.unwrap();
        assert_eq!(stopped_twice.stopped_at, first_stopped_at);
        assert_eq!(stopped_twice.stop_reason.as_deref(), Some("manual"));
    }
}

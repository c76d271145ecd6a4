//! CRUD operations for work items, the unit the four stage workers advance
//! through `discovered -> prepared -> generated -> posted`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use crate::error::StorageError;

/// Lifecycle stage of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum WorkItemStatus {
    /// An article was found by the Discovery stage; nothing else filled in.
    Discovered,
    /// The Preparation stage selected a login, prompt template, and
    /// provider, and fetched the full article body.
    Prepared,
    /// The Generation stage produced a comment via the LLM provider.
    Generated,
    /// The Posting stage submitted the comment to the upstream platform.
    Posted,
    /// A stage failed for this item; terminal, not retried automatically.
    Failed,
    /// The item was withdrawn (e.g. its process was deleted); terminal.
    Deleted,
}

/// A work item tracking one (process, article, login) triple through the
/// pipeline.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorkItem {
    /// Opaque identifier. Also the source of the synthetic comment id's
    /// final 8-hex-character segment.
    pub id: Uuid,
    /// The process this item belongs to.
    pub process_id: Uuid,
    /// The upstream login used to discover (and, later, post as).
    pub login_id: Uuid,
    /// The upstream user id owning the article (for ownership checks).
    pub user_id: String,
    /// The upstream article id.
    pub article_id: String,
    /// The id assigned by the upstream platform to the posted comment, once
    /// posted. Synthetic, not returned by the upstream platform itself.
    pub upstream_comment_id: Option<String>,
    /// The prompt template selected during Preparation.
    pub prompt_template_id: Option<Uuid>,
    /// The LLM provider configuration selected during Preparation.
    pub llm_provider_id: Option<Uuid>,

    /// Article title, as discovered.
    pub title: Option<String>,
    /// Article author display name, as discovered.
    pub author: Option<String>,
    /// Category id, always `NULL` from the index page per upstream behavior.
    pub category_id: Option<i64>,
    /// Task id, as discovered.
    pub task_id: Option<i64>,
    /// Article URL.
    pub url: Option<String>,
    /// Article body text, populated by Preparation.
    pub content_text: Option<String>,
    /// Article body HTML, populated by Preparation.
    pub content_html: Option<String>,
    /// Article publication timestamp.
    pub published_at: Option<DateTime<Utc>>,
    /// Article last-edited timestamp.
    pub edited_at: Option<DateTime<Utc>>,
    /// When Preparation fetched the full article.
    pub scraped_at: Option<DateTime<Utc>>,

    /// Generated comment text, including the disclosure prefix.
    pub comment_text: Option<String>,
    /// The model name used for generation.
    pub llm_model_name: Option<String>,
    /// The provider tag used for generation.
    pub llm_provider_name: Option<String>,
    /// Tokens consumed by generation.
    pub generation_tokens: Option<i64>,
    /// Generation wall-clock time in milliseconds.
    pub generation_time_ms: Option<i64>,

    /// Current lifecycle stage.
    pub status: WorkItemStatus,
    /// Creation timestamp (set at discovery).
    pub created_at: DateTime<Utc>,
    /// When the comment was posted, if ever.
    pub posted_at: Option<DateTime<Utc>>,
    /// When the item failed, if ever.
    pub failed_at: Option<DateTime<Utc>>,
    /// Error message, set when `status = failed`.
    pub error_message: Option<String>,
    /// Number of retry attempts made for the current stage.
    pub retry_count: i64,
}

/// Fields discovered for a new work item. All fields beyond the fanout key
/// are optional since the index page does not expose category ids.
pub struct NewDiscoveredItem {
    /// The process this item belongs to.
    pub process_id: Uuid,
    /// The upstream login used to discover this article.
    pub login_id: Uuid,
    /// The upstream user id owning the article.
    pub user_id: String,
    /// The upstream article id.
    pub article_id: String,
    /// Article title, as discovered.
    pub title: Option<String>,
    /// Article author display name, as discovered.
    pub author: Option<String>,
    /// Task id, as discovered.
    pub task_id: Option<i64>,
    /// Article URL.
    pub url: Option<String>,
}

/// Insert a newly discovered article as a work item.
///
/// The `(process_id, article_id, login_id)` unique index makes re-discovery
/// a silent no-op: callers should treat [`StorageError::DuplicateItem`] as
/// "already tracked", not a failure.
pub async fn create_discovered(
    pool: &DbPool,
    new: NewDiscoveredItem,
) -> Result<WorkItem, StorageError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO work_items \
         (id, process_id, login_id, user_id, article_id, title, author, task_id, url, \
          status, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'discovered', ?)",
    )
    .bind(id.to_string())
    .bind(new.process_id.to_string())
    .bind(new.login_id.to_string())
    .bind(&new.user_id)
    .bind(&new.article_id)
    .bind(&new.title)
    .bind(&new.author)
    .bind(new.task_id)
    .bind(&new.url)
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => get(pool, id).await,
        Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
            Err(StorageError::DuplicateItem)
        }
        Err(source) => Err(StorageError::Query { source }),
    }
}

/// Fetch a work item by id.
pub async fn get(pool: &DbPool, id: Uuid) -> Result<WorkItem, StorageError> {
    sqlx::query_as("SELECT * FROM work_items WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .map_err(|source| StorageError::Query { source })?
        .ok_or(StorageError::NotFound {
            entity: "work_item",
            id,
        })
}

/// List every item belonging to `process_id` in a given stage.
pub async fn list_by_stage(
    pool: &DbPool,
    process_id: Uuid,
    status: WorkItemStatus,
) -> Result<Vec<WorkItem>, StorageError> {
    sqlx::query_as("SELECT * FROM work_items WHERE process_id = ? AND status = ? ORDER BY created_at")
        .bind(process_id.to_string())
        .bind(status)
        .fetch_all(pool)
        .await
        .map_err(|source| StorageError::Query { source })
}

/// Article fields filled in by the Preparation stage.
pub struct PreparedFields {
    /// The prompt template selected for this item.
    pub prompt_template_id: Uuid,
    /// The LLM provider configuration selected for this item.
    pub llm_provider_id: Uuid,
    /// Full article body text.
    pub content_text: String,
    /// Full article body HTML.
    pub content_html: String,
    /// Article publication timestamp, if present upstream.
    pub published_at: Option<DateTime<Utc>>,
    /// Article last-edited timestamp, if present upstream.
    pub edited_at: Option<DateTime<Utc>>,
}

/// Advance an item from `discovered` to `prepared`.
pub async fn update_to_prepared(
    pool: &DbPool,
    id: Uuid,
    fields: PreparedFields,
) -> Result<WorkItem, StorageError> {
    sqlx::query(
        "UPDATE work_items SET status = 'prepared', prompt_template_id = ?, llm_provider_id = ?, \
         content_text = ?, content_html = ?, published_at = ?, edited_at = ?, scraped_at = ? \
         WHERE id = ? AND status = 'discovered'",
    )
    .bind(fields.prompt_template_id.to_string())
    .bind(fields.llm_provider_id.to_string())
    .bind(fields.content_text)
    .bind(fields.content_html)
    .bind(fields.published_at)
    .bind(fields.edited_at)
    .bind(Utc::now())
    .bind(id.to_string())
    .execute(pool)
    .await
    .map_err(|source| StorageError::Query { source })?;

    get(pool, id).await
}

/// Generated-comment fields filled in by the Generation stage.
pub struct GeneratedFields {
    /// The generated comment text, including the disclosure prefix.
    pub comment_text: String,
    /// The model name used for generation.
    pub llm_model_name: String,
    /// The provider tag used for generation.
    pub llm_provider_name: String,
    /// Tokens consumed by generation.
    pub generation_tokens: i64,
    /// Generation wall-clock time in milliseconds.
    pub generation_time_ms: i64,
}

/// Advance an item from `prepared` to `generated`.
pub async fn update_to_generated(
    pool: &DbPool,
    id: Uuid,
    fields: GeneratedFields,
) -> Result<WorkItem, StorageError> {
    sqlx::query(
        "UPDATE work_items SET status = 'generated', comment_text = ?, llm_model_name = ?, \
         llm_provider_name = ?, generation_tokens = ?, generation_time_ms = ? \
         WHERE id = ? AND status = 'prepared'",
    )
    .bind(fields.comment_text)
    .bind(fields.llm_model_name)
    .bind(fields.llm_provider_name)
    .bind(fields.generation_tokens)
    .bind(fields.generation_time_ms)
    .bind(id.to_string())
    .execute(pool)
    .await
    .map_err(|source| StorageError::Query { source })?;

    get(pool, id).await
}

/// Advance an item from `generated` to `posted`.
///
/// `upstream_comment_id` must already be the synthetic id
/// (`{article_id}-{unix_seconds}-{item_id_prefix8}`); this function does not
/// construct it.
pub async fn update_to_posted(
    pool: &DbPool,
    id: Uuid,
    upstream_comment_id: &str,
) -> Result<WorkItem, StorageError> {
    sqlx::query(
        "UPDATE work_items SET status = 'posted', upstream_comment_id = ?, posted_at = ? \
         WHERE id = ? AND status = 'generated'",
    )
    .bind(upstream_comment_id)
    .bind(Utc::now())
    .bind(id.to_string())
    .execute(pool)
    .await
    .map_err(|source| StorageError::Query { source })?;

    get(pool, id).await
}

/// Move an item to `failed` from any non-terminal stage.
pub async fn mark_failed(pool: &DbPool, id: Uuid, error_message: &str) -> Result<WorkItem, StorageError> {
    sqlx::query(
        "UPDATE work_items SET status = 'failed', failed_at = ?, error_message = ?, \
         retry_count = retry_count + 1 WHERE id = ?",
    )
    .bind(Utc::now())
    .bind(error_message)
    .bind(id.to_string())
    .execute(pool)
    .await
    .map_err(|source| StorageError::Query { source })?;

    get(pool, id).await
}

/// Count items for a process in each stage, keyed by status string.
pub async fn count_by_status(
    pool: &DbPool,
    process_id: Uuid,
) -> Result<Vec<(WorkItemStatus, i64)>, StorageError> {
    sqlx::query_as(
        "SELECT status, COUNT(*) as count FROM work_items WHERE process_id = ? GROUP BY status",
    )
    .bind(process_id.to_string())
    .fetch_all(pool)
    .await
    .map_err(|source| StorageError::Query { source })
}

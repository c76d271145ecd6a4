//! CRUD operations for prompt templates.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use crate::error::StorageError;

/// Whether a template is a built-in, owner-less default or a per-user one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "TEXT", rename_all = "UPPERCASE")]
pub enum TemplateCategory {
    /// Built-in template, `owner` is `NULL`.
    System,
    /// User-authored template, `owner` is required.
    User,
}

/// A prompt template: a system prompt plus a user-message template that may
/// reference the closed placeholder set.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PromptTemplate {
    /// Opaque identifier.
    pub id: Uuid,
    /// Owning user id, `None` for system templates.
    pub owner: Option<Uuid>,
    /// System or user category.
    pub category: TemplateCategory,
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// The system prompt sent verbatim to the LLM provider.
    pub system_prompt: String,
    /// The user-message template, rendered against an article snapshot
    /// before being sent to the LLM provider.
    pub user_prompt_template: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a new prompt template.
pub struct NewPromptTemplate {
    /// Owning user id; must be `Some` for [`TemplateCategory::User`] and
    /// `None` for [`TemplateCategory::System`].
    pub owner: Option<Uuid>,
    /// System or user category.
    pub category: TemplateCategory,
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// The system prompt sent verbatim to the LLM provider.
    pub system_prompt: String,
    /// The user-message template.
    pub user_prompt_template: String,
}

/// Insert a new prompt template.
pub async fn create(pool: &DbPool, new: NewPromptTemplate) -> Result<PromptTemplate, StorageError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO prompt_templates \
         (id, owner, category, name, description, system_prompt, user_prompt_template, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(new.owner.map(|o| o.to_string()))
    .bind(new.category)
    .bind(&new.name)
    .bind(&new.description)
    .bind(&new.system_prompt)
    .bind(&new.user_prompt_template)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|source| StorageError::Query { source })?;

    get(pool, id).await
}

/// Fetch a template by id.
pub async fn get(pool: &DbPool, id: Uuid) -> Result<PromptTemplate, StorageError> {
    sqlx::query_as("SELECT * FROM prompt_templates WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .map_err(|source| StorageError::Query { source })?
        .ok_or(StorageError::NotFound {
            entity: "prompt_template",
            id,
        })
}

/// List the built-in system templates plus the templates owned by `owner`.
pub async fn list_available_to(
    pool: &DbPool,
    owner: Uuid,
) -> Result<Vec<PromptTemplate>, StorageError> {
    sqlx::query_as(
        "SELECT * FROM prompt_templates WHERE category = 'SYSTEM' OR owner = ? ORDER BY created_at",
    )
    .bind(owner.to_string())
    .fetch_all(pool)
    .await
    .map_err(|source| StorageError::Query { source })
}

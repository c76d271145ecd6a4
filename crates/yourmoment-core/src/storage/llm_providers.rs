//! CRUD operations for LLM provider configurations.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use crate::error::StorageError;
use crate::vault::{self, VaultKey};

/// The closed set of supported LLM provider tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum ProviderTag {
    /// OpenAI chat-completions API.
    Openai,
    /// Mistral's OpenAI-compatible chat-completions API.
    Mistral,
}

impl ProviderTag {
    /// The tag as stored in SQL / read from config (`"openai"`, `"mistral"`).
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderTag::Openai => "openai",
            ProviderTag::Mistral => "mistral",
        }
    }
}

/// A stored LLM provider configuration, API key decrypted on read.
#[derive(Debug, Clone)]
pub struct LlmProviderConfig {
    /// Opaque identifier.
    pub id: Uuid,
    /// Owning user id.
    pub owner: Uuid,
    /// Which provider implementation to dispatch to.
    pub provider_tag: ProviderTag,
    /// The model name passed in each request.
    pub model_name: String,
    /// Decrypted API key.
    pub api_key: String,
    /// Default `max_tokens` for generation requests.
    pub max_tokens: i64,
    /// Default `temperature` for generation requests.
    pub temperature: f64,
    /// Whether the scheduler may select this configuration.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct LlmProviderRow {
    id: String,
    owner: String,
    provider_tag: ProviderTag,
    model_name: String,
    api_key_enc: String,
    max_tokens: i64,
    temperature: f64,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl LlmProviderRow {
    fn decrypt(self, key: &VaultKey) -> Result<LlmProviderConfig, StorageError> {
        let api_key = vault::decrypt(&self.api_key_enc, key)
            .map_err(|e| StorageError::Query { source: sqlx::Error::Decode(Box::new(e)) })?;
        Ok(LlmProviderConfig {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            owner: Uuid::parse_str(&self.owner).unwrap_or_default(),
            provider_tag: self.provider_tag,
            model_name: self.model_name,
            api_key,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}

/// Fields required to create a new LLM provider configuration.
pub struct NewLlmProviderConfig {
    /// Owning user id.
    pub owner: Uuid,
    /// Which provider implementation to dispatch to.
    pub provider_tag: ProviderTag,
    /// The model name passed in each request.
    pub model_name: String,
    /// Plaintext API key (encrypted before storage).
    pub api_key_plaintext: String,
    /// Default `max_tokens`.
    pub max_tokens: i64,
    /// Default `temperature`.
    pub temperature: f64,
}

/// Encrypt and insert a new LLM provider configuration.
pub async fn create(
    pool: &DbPool,
    new: NewLlmProviderConfig,
    key: &VaultKey,
) -> Result<LlmProviderConfig, StorageError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let api_key_enc = vault::encrypt(&new.api_key_plaintext, key)
        .map_err(|e| StorageError::Query { source: sqlx::Error::Encode(Box::new(e)) })?;

    sqlx::query(
        "INSERT INTO llm_provider_configurations \
         (id, owner, provider_tag, model_name, api_key_enc, max_tokens, temperature, is_active, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?)",
    )
    .bind(id.to_string())
    .bind(new.owner.to_string())
    .bind(new.provider_tag)
    .bind(&new.model_name)
    .bind(api_key_enc)
    .bind(new.max_tokens)
    .bind(new.temperature)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|source| StorageError::Query { source })?;

    get(pool, id, key).await
}

/// Fetch a provider configuration by id, decrypting its API key.
pub async fn get(
    pool: &DbPool,
    id: Uuid,
    key: &VaultKey,
) -> Result<LlmProviderConfig, StorageError> {
    let row: LlmProviderRow =
        sqlx::query_as("SELECT * FROM llm_provider_configurations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(pool)
            .await
            .map_err(|source| StorageError::Query { source })?
            .ok_or(StorageError::NotFound {
                entity: "llm_provider",
                id,
            })?;

    row.decrypt(key)
}

//! Error types for the yourMoment core library.
//!
//! Each module has its own error enum to provide clear error boundaries.
//! The library uses `thiserror` for structured, typed errors.

/// Errors related to configuration loading, parsing, and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required configuration field is absent.
    #[error("missing required config field: {field}")]
    MissingField {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration field has an unacceptable value.
    #[error("invalid value for config field '{field}': {message}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// A description of why the value is invalid.
        message: String,
    },

    /// The configuration file does not exist at the specified path.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// The path that was searched.
        path: String,
    },

    /// TOML deserialization failed.
    #[error("failed to parse config file: {source}")]
    ParseError {
        /// The underlying TOML parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// Errors from interacting with the upstream scraping target.
#[derive(Debug, thiserror::Error)]
pub enum ScrapingError {
    /// Login did not produce an authenticated session (no logout form on `/`).
    #[error("upstream authentication failed for login {login_id}")]
    AuthenticationFailed {
        /// The login that failed to authenticate.
        login_id: uuid::Uuid,
    },

    /// The session for this login was previously marked unauthenticated.
    #[error("upstream session for login {login_id} is not authenticated")]
    NotAuthenticated {
        /// The login whose session is unauthenticated.
        login_id: uuid::Uuid,
    },

    /// A network-level failure communicating with the upstream platform.
    #[error("upstream network error: {source}")]
    Network {
        /// The underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The upstream platform returned a non-success status code.
    #[error("upstream returned HTTP {status} for {path}")]
    HttpStatus {
        /// The HTTP status code returned.
        status: u16,
        /// The request path that failed.
        path: String,
    },

    /// HTML could not be parsed into the expected shape.
    #[error("failed to parse upstream HTML: {message}")]
    ParseError {
        /// Details about what was expected and what was found.
        message: String,
    },

    /// A required CSRF token was not found in the response.
    #[error("CSRF token not found in {context}")]
    CsrfTokenMissing {
        /// Where the token was expected (e.g. "login form", "comment form").
        context: String,
    },

    /// Too many redirect hops were followed (cap exceeded).
    #[error("exceeded maximum redirect hops ({max_hops})")]
    TooManyRedirects {
        /// The configured redirect hop cap.
        max_hops: u8,
    },
}

/// Errors from interacting with LLM providers (openai, mistral).
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// HTTP request to the LLM endpoint failed.
    #[error("LLM HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// LLM API returned an error response.
    #[error("LLM API error (status {status}): {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The error message from the API.
        message: String,
    },

    /// LLM provider rate limit hit.
    #[error("LLM rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// LLM response could not be parsed.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// No LLM provider configured, or an unknown provider tag was requested.
    #[error("no LLM provider configured for tag '{tag}'")]
    NotConfigured {
        /// The unrecognized or missing provider tag.
        tag: String,
    },

    /// Content generation failed after retries.
    #[error("content generation failed: {0}")]
    GenerationFailed(String),
}

/// Errors from SQLite storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to connect to SQLite database.
    #[error("database connection error: {source}")]
    Connection {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },

    /// Database migration failed.
    #[error("database migration error: {source}")]
    Migration {
        /// The underlying migration error.
        #[source]
        source: sqlx::migrate::MigrateError,
    },

    /// A database query failed.
    #[error("database query error: {source}")]
    Query {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },

    /// Insertion violated the (process_id, article_id, login_id) uniqueness
    /// invariant. Callers treat this as a silent no-op, not a failure.
    #[error("work item already exists for this process/article/login")]
    DuplicateItem,

    /// The requested row does not exist, or exists but is owned by another
    /// user (ownership isolation is enforced by never exposing cross-user
    /// rows, not by a separate permission check).
    #[error("{entity} {id} not found")]
    NotFound {
        /// The kind of entity that was not found (e.g. "process", "login").
        entity: &'static str,
        /// The id that was looked up.
        id: uuid::Uuid,
    },
}

/// Errors from the credential vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// The configured vault key is the wrong length or otherwise invalid.
    #[error("invalid vault key: {0}")]
    InvalidKey(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed (wrong key, or corrupt/truncated ciphertext).
    #[error("decryption failed: {0}")]
    Decryption(String),
}

/// Errors surfaced by the pipeline's stage workers and scheduler.
///
/// Per-item failures within a stage worker are always captured as a
/// `WorkItem` transitioning to `failed`; they never reach this enum. This
/// enum models the stage- and process-level failures of the error
/// handling design: validation at the control surface, unhandled
/// exceptions inside a worker, and deadline expiry.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A process could not be started because it fails a precondition.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the failed precondition.
        message: String,
    },

    /// A stage worker failed before any individual item could be processed.
    #[error("stage '{stage}' failed for process {process_id}: {message}")]
    StageException {
        /// The stage that failed (discovery/preparation/generation/posting).
        stage: &'static str,
        /// The process the stage was running for.
        process_id: uuid::Uuid,
        /// Details of the failure.
        message: String,
    },

    /// The process exceeded its configured maximum duration.
    #[error("process {process_id} exceeded its deadline")]
    TimeoutExceeded {
        /// The process that timed out.
        process_id: uuid::Uuid,
    },

    /// A storage operation failed while handling a stage or scheduler tick.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// An upstream scraping operation failed while handling a stage.
    #[error(transparent)]
    Scraping(#[from] ScrapingError),

    /// An LLM call failed while handling the generation stage.
    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_missing_field_message() {
        let err = ConfigError::MissingField {
            field: "upstream.base_url".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "missing required config field: upstream.base_url"
        );
    }

    #[test]
    fn config_error_invalid_value_message() {
        let err = ConfigError::InvalidValue {
            field: "process.max_duration_minutes".to_string(),
            message: "must be between 1 and 1440".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for config field 'process.max_duration_minutes': must be between 1 and 1440"
        );
    }

    #[test]
    fn config_error_file_not_found_message() {
        let err = ConfigError::FileNotFound {
            path: "/home/user/.yourmoment/config.toml".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "config file not found: /home/user/.yourmoment/config.toml"
        );
    }

    #[test]
    fn scraping_error_authentication_failed_message() {
        let login_id = uuid::Uuid::nil();
        let err = ScrapingError::AuthenticationFailed { login_id };
        assert_eq!(
            err.to_string(),
            format!("upstream authentication failed for login {login_id}")
        );
    }

    #[test]
    fn scraping_error_http_status_message() {
        let err = ScrapingError::HttpStatus {
            status: 403,
            path: "/article/12/comment/".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "upstream returned HTTP 403 for /article/12/comment/"
        );
    }

    #[test]
    fn scraping_error_csrf_token_missing_message() {
        let err = ScrapingError::CsrfTokenMissing {
            context: "login form".to_string(),
        };
        assert_eq!(err.to_string(), "CSRF token not found in login form");
    }

    #[test]
    fn scraping_error_too_many_redirects_message() {
        let err = ScrapingError::TooManyRedirects { max_hops: 5 };
        assert_eq!(err.to_string(), "exceeded maximum redirect hops (5)");
    }

    #[test]
    fn llm_error_not_configured_message() {
        let err = LlmError::NotConfigured {
            tag: "ollama".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no LLM provider configured for tag 'ollama'"
        );
    }

    #[test]
    fn llm_error_rate_limited_message() {
        let err = LlmError::RateLimited {
            retry_after_secs: 30,
        };
        assert_eq!(err.to_string(), "LLM rate limited, retry after 30 seconds");
    }

    #[test]
    fn llm_error_parse_failure_message() {
        let err = LlmError::Parse("unexpected JSON structure".to_string());
        assert_eq!(
            err.to_string(),
            "failed to parse LLM response: unexpected JSON structure"
        );
    }

    #[test]
    fn llm_error_api_error_message() {
        let err = LlmError::Api {
            status: 401,
            message: "Invalid API key".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "LLM API error (status 401): Invalid API key"
        );
    }

    #[test]
    fn storage_error_duplicate_item_message() {
        let err = StorageError::DuplicateItem;
        assert_eq!(
            err.to_string(),
            "work item already exists for this process/article/login"
        );
    }

    #[test]
    fn storage_error_not_found_message() {
        let id = uuid::Uuid::nil();
        let err = StorageError::NotFound {
            entity: "process",
            id,
        };
        assert_eq!(err.to_string(), format!("process {id} not found"));
    }

    #[test]
    fn vault_error_decryption_message() {
        let err = VaultError::Decryption("ciphertext too short".to_string());
        assert_eq!(err.to_string(), "decryption failed: ciphertext too short");
    }

    #[test]
    fn pipeline_error_timeout_message() {
        let process_id = uuid::Uuid::nil();
        let err = PipelineError::TimeoutExceeded { process_id };
        assert_eq!(
            err.to_string(),
            format!("process {process_id} exceeded its deadline")
        );
    }

    #[test]
    fn pipeline_error_stage_exception_message() {
        let process_id = uuid::Uuid::nil();
        let err = PipelineError::StageException {
            stage: "discovery",
            process_id,
            message: "connection reset".to_string(),
        };
        assert_eq!(
            err.to_string(),
            format!("stage 'discovery' failed for process {process_id}: connection reset")
        );
    }

    #[test]
    fn pipeline_error_wraps_storage_error() {
        let err: PipelineError = StorageError::DuplicateItem.into();
        assert_eq!(
            err.to_string(),
            "work item already exists for this process/article/login"
        );
    }
}

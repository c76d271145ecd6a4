//! Shared runtime dependencies for every subcommand: the database pool and
//! a configured `Scheduler`. Grounded on the teacher's `RuntimeDeps`, cut
//! down to the two things this CLI's thin command surface needs.

use std::sync::Arc;

use yourmoment_core::config::Config;
use yourmoment_core::scheduler::Scheduler;
use yourmoment_core::storage::{self, DbPool};
use yourmoment_core::upstream::SessionRegistry;
use yourmoment_core::vault::VaultKey;

/// Matches the reference implementation's `session.timeout_minutes`
/// default; not currently exposed as a config knob.
const SESSION_TIMEOUT_MINUTES: i64 = 60;

pub struct Runtime {
    pub pool: DbPool,
    pub scheduler: Scheduler,
}

impl Runtime {
    pub async fn init(config: &Config) -> anyhow::Result<Self> {
        let pool = storage::init_db(&config.storage.database_path)
            .await
            .map_err(|e| anyhow::anyhow!("database initialization failed: {e}"))?;

        let vault_key = VaultKey::from_base64(
            config
                .vault_key
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("vault_key is not configured"))?,
        )
        .map_err(|e| anyhow::anyhow!("invalid vault_key: {e}"))?;

        let registry = Arc::new(SessionRegistry::new(
            config.upstream.base_url.clone(),
            config.upstream.login_path.clone(),
            config.upstream.request_timeout_secs,
            config.upstream.max_redirect_hops,
            SESSION_TIMEOUT_MINUTES,
            config.rate_limiter.requests_per_second,
        ));

        let scheduler = Scheduler::new(
            pool.clone(),
            registry,
            vault_key,
            config.disclosure_prefix.clone(),
            config.upstream.base_url.clone(),
            config.scheduler.max_articles_per_request as usize,
        );

        Ok(Self { pool, scheduler })
    }
}

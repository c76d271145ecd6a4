//! Discovery stage worker: finds new articles via each login attached to a
//! process and records them as `discovered` work items.

use std::time::Instant;

use crate::error::StorageError;
use crate::storage::processes::ProcessFilter;
use crate::storage::upstream_logins::UpstreamLogin;
use crate::storage::work_items::{self, NewDiscoveredItem};
use crate::storage::DbPool;
use crate::upstream::SessionRegistry;

use super::{elapsed_ms, StageResult};

/// Run one Discovery pass for `process_id` across `logins`.
///
/// Failure of one login does not abort the others; their errors are
/// collected into the returned result. Duplicate `(process, article, login)`
/// triples are silently ignored -- this is the deduplication invariant, not
/// a failure.
pub async fn run(
    pool: &DbPool,
    registry: &SessionRegistry,
    base_url: &str,
    process_id: uuid::Uuid,
    filter: &ProcessFilter,
    logins: &[UpstreamLogin],
    limit: usize,
) -> StageResult {
    let start = Instant::now();
    let mut advanced = 0u32;
    let mut failed = 0u32;
    let mut errors = Vec::new();

    for login in logins {
        let session = match registry.ensure_authenticated(login).await {
            Ok(session) => session,
            Err(e) => {
                errors.push(format!("login {}: {e}", login.id));
                continue;
            }
        };

        let articles = match crate::upstream::discover_articles(
            registry, &session, base_url, filter, limit,
        )
        .await
        {
            Ok(articles) => articles,
            Err(e) => {
                errors.push(format!("login {}: {e}", login.id));
                continue;
            }
        };

        for article in articles {
            let new_item = NewDiscoveredItem {
                process_id,
                login_id: login.id,
                user_id: article.user_id,
                article_id: article.article_id.clone(),
                title: Some(article.title),
                author: Some(article.author),
                task_id: None,
                url: Some(article.url),
            };

            match work_items::create_discovered(pool, new_item).await {
                Ok(_) => advanced += 1,
                Err(StorageError::DuplicateItem) => {}
                Err(e) => {
                    failed += 1;
                    errors.push(format!("article {}: {e}", article.article_id));
                }
            }
        }
    }

    StageResult::new(advanced, failed, errors, elapsed_ms(start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::init_test_db;
    use crate::vault::VaultKey;

    #[tokio::test]
    async fn empty_login_list_yields_success_with_zero_counts() {
        let pool = init_test_db().await.unwrap();
        let registry = SessionRegistry::new(
            "https://new.mymoment.ch".to_string(),
            "/accounts/login/".to_string(),
            5,
            5,
            30,
            100.0,
        );
        let filter = ProcessFilter::default();
        let result = run(
            &pool,
            &registry,
            "https://new.mymoment.ch",
            uuid::Uuid::new_v4(),
            &filter,
            &[],
            20,
        )
        .await;

        assert_eq!(result.advanced, 0);
        assert_eq!(result.failed, 0);
        assert!(result.errors.is_empty());
        assert_eq!(result.status, super::super::StageOutcome::Success);
    }

    #[tokio::test]
    async fn unreachable_login_collects_error_without_panicking() {
        let pool = init_test_db().await.unwrap();
        let registry = SessionRegistry::new(
            "http://127.0.0.1:1".to_string(),
            "/accounts/login/".to_string(),
            1,
            5,
            30,
            100.0,
        );
        let key = VaultKey::from_bytes(vec![0u8; 32]).unwrap();
        let login = crate::storage::upstream_logins::create(
            &pool,
            crate::storage::upstream_logins::NewUpstreamLogin {
                owner: uuid::Uuid::new_v4(),
                display_name: "L".to_string(),
                username_plaintext: "u".to_string(),
                password_plaintext: "p".to_string(),
                is_admin: false,
            },
            &key,
        )
        .await
        .unwrap();

        let filter = ProcessFilter::default();
        let result = run(
            &pool,
            &registry,
            "http://127.0.0.1:1",
            uuid::Uuid::new_v4(),
            &filter,
            &[login],
            20,
        )
        .await;

        assert_eq!(result.advanced, 0);
        assert_eq!(result.errors.len(), 1);
    }
}

//! Posting stage worker: submits each `generated` item's comment to the
//! upstream platform and advances it to `posted`.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::error::ScrapingError;
use crate::storage::upstream_logins::UpstreamLogin;
use crate::storage::work_items::{self, WorkItem, WorkItemStatus};
use crate::storage::DbPool;
use crate::upstream::{self, SessionRegistry};

use super::{elapsed_ms, StageResult};

/// Run one Posting pass over every `generated` item for `process_id`.
///
/// Items are grouped by `login_id` so each login's session is established
/// once and reused across that login's items. A fresh comment-form CSRF
/// token is fetched immediately before each post, since tokens are
/// per-page-load and the one observed during Preparation may be stale.
pub async fn run(
    pool: &DbPool,
    registry: &SessionRegistry,
    base_url: &str,
    process_id: Uuid,
    logins_by_id: &HashMap<Uuid, UpstreamLogin>,
) -> StageResult {
    let start = Instant::now();
    let items = match work_items::list_by_stage(pool, process_id, WorkItemStatus::Generated).await {
        Ok(items) => items,
        Err(e) => return StageResult::stage_exception(e.to_string(), elapsed_ms(start)),
    };

    if items.is_empty() {
        return StageResult::new(0, 0, vec![], elapsed_ms(start));
    }

    let mut by_login: HashMap<Uuid, Vec<WorkItem>> = HashMap::new();
    for item in items {
        by_login.entry(item.login_id).or_default().push(item);
    }

    let mut advanced = 0u32;
    let mut failed = 0u32;
    let mut errors = Vec::new();

    for (login_id, group) in by_login {
        let Some(login) = logins_by_id.get(&login_id) else {
            for item in &group {
                errors.push(format!("item {}: login {login_id} not attached to process", item.id));
                let _ = work_items::mark_failed(pool, item.id, "login not attached to process").await;
            }
            failed += group.len() as u32;
            continue;
        };

        let session = match registry.ensure_authenticated(login).await {
            Ok(session) => session,
            Err(e) => {
                for item in &group {
                    errors.push(format!("item {}: {e}", item.id));
                    let _ = work_items::mark_failed(pool, item.id, &e.to_string()).await;
                }
                failed += group.len() as u32;
                continue;
            }
        };

        for item in group {
            let Some(comment_text) = item.comment_text.clone() else {
                failed += 1;
                errors.push(format!("item {}: no generated comment text", item.id));
                let _ = work_items::mark_failed(pool, item.id, "no generated comment text").await;
                continue;
            };

            let post_result = post_one(registry, &session, base_url, &item, &comment_text).await;
            match post_result {
                Ok(synthetic_id) => {
                    let result = work_items::update_to_posted(pool, item.id, &synthetic_id).await;
                    match result {
                        Ok(_) => advanced += 1,
                        Err(e) => {
                            failed += 1;
                            errors.push(format!("item {}: {e}", item.id));
                        }
                    }
                }
                Err(e) => {
                    failed += 1;
                    errors.push(format!("item {}: {e}", item.id));
                    let _ = work_items::mark_failed(pool, item.id, &e.to_string()).await;
                }
            }
        }
    }

    StageResult::new(advanced, failed, errors, elapsed_ms(start))
}

async fn post_one(
    registry: &SessionRegistry,
    session: &upstream::Session,
    base_url: &str,
    item: &WorkItem,
    comment_text: &str,
) -> Result<String, ScrapingError> {
    let content = upstream::fetch_article(registry, session, base_url, &item.article_id).await?;
    let csrf_token = content.csrf_token.ok_or_else(|| ScrapingError::CsrfTokenMissing {
        context: format!("comment form for article {}", item.article_id),
    })?;

    let posted = upstream::post_comment(
        registry,
        session,
        base_url,
        &item.article_id,
        &csrf_token,
        comment_text,
    )
    .await?;

    if !posted {
        return Err(ScrapingError::HttpStatus {
            status: 0,
            path: format!("/article/{}/comment/", item.article_id),
        });
    }

    let posted_at = Utc::now();
    Ok(upstream::synthetic_comment_id(&item.article_id, posted_at, item.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::init_test_db;

    #[tokio::test]
    async fn no_generated_items_yields_success_with_zero_counts() {
        let pool = init_test_db().await.unwrap();
        let registry = SessionRegistry::new(
            "https://new.mymoment.ch".to_string(),
            "/accounts/login/".to_string(),
            5,
            5,
            30,
            100.0,
        );
        let logins_by_id = HashMap::new();
        let result = run(
            &pool,
            &registry,
            "https://new.mymoment.ch",
            Uuid::new_v4(),
            &logins_by_id,
        )
        .await;
        assert_eq!(result.advanced, 0);
        assert_eq!(result.failed, 0);
        assert_eq!(result.status, super::super::StageOutcome::Success);
    }
}

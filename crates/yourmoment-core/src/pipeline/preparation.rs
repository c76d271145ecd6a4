//! Preparation stage worker: fetches full article content for `discovered`
//! items and selects the prompt template and LLM provider each item will use
//! for Generation.

use std::collections::HashMap;
use std::time::Instant;

use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::storage::upstream_logins::UpstreamLogin;
use crate::storage::work_items::{self, PreparedFields, WorkItemStatus};
use crate::storage::DbPool;
use crate::upstream::SessionRegistry;

use super::{elapsed_ms, StageResult};

/// Run one Preparation pass over every `discovered` item for `process_id`.
///
/// `logins_by_id` must contain every login attached to the process;
/// `template_ids` is the process's attached prompt templates, one of which
/// is chosen uniformly at random per item. `provider_id` is the process's
/// single configured LLM provider.
pub async fn run(
    pool: &DbPool,
    registry: &SessionRegistry,
    base_url: &str,
    process_id: Uuid,
    logins_by_id: &HashMap<Uuid, UpstreamLogin>,
    template_ids: &[Uuid],
    provider_id: Uuid,
) -> StageResult {
    let start = Instant::now();
    let items = match work_items::list_by_stage(pool, process_id, WorkItemStatus::Discovered).await
    {
        Ok(items) => items,
        Err(e) => return StageResult::stage_exception(e.to_string(), elapsed_ms(start)),
    };

    if items.is_empty() || template_ids.is_empty() {
        return StageResult::new(0, 0, vec![], elapsed_ms(start));
    }

    let mut advanced = 0u32;
    let mut failed = 0u32;
    let mut errors = Vec::new();
    let mut rng = rand::thread_rng();

    for item in items {
        let Some(login) = logins_by_id.get(&item.login_id) else {
            failed += 1;
            errors.push(format!("item {}: login {} not attached to process", item.id, item.login_id));
            let _ = work_items::mark_failed(pool, item.id, "login not attached to process").await;
            continue;
        };

        let session = match registry.ensure_authenticated(login).await {
            Ok(session) => session,
            Err(e) => {
                failed += 1;
                errors.push(format!("item {}: {e}", item.id));
                let _ = work_items::mark_failed(pool, item.id, &e.to_string()).await;
                continue;
            }
        };

        let content = match crate::upstream::fetch_article(
            registry,
            &session,
            base_url,
            &item.article_id,
        )
        .await
        {
            Ok(content) => content,
            Err(e) => {
                failed += 1;
                errors.push(format!("item {}: {e}", item.id));
                let _ = work_items::mark_failed(pool, item.id, &e.to_string()).await;
                continue;
            }
        };

        let template_id = *template_ids.choose(&mut rng).expect("template_ids is non-empty");

        let result = work_items::update_to_prepared(
            pool,
            item.id,
            PreparedFields {
                prompt_template_id: template_id,
                llm_provider_id: provider_id,
                content_text: content.content_text,
                content_html: content.content_html,
                // Neither timestamp is exposed by the article detail page;
                // the index card's localized date text is not a reliable
                // publish/edit instant, so both stay unset rather than
                // storing a mis-parsed value.
                published_at: None,
                edited_at: None,
            },
        )
        .await;

        match result {
            Ok(_) => advanced += 1,
            Err(e) => {
                failed += 1;
                errors.push(format!("item {}: {e}", item.id));
            }
        }
    }

    StageResult::new(advanced, failed, errors, elapsed_ms(start))
}

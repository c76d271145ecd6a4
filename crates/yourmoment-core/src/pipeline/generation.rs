//! Generation stage worker: renders each `prepared` item's prompt template,
//! calls its configured LLM provider, and advances it to `generated`.

use std::collections::HashMap;
use std::time::Instant;

use uuid::Uuid;

use crate::llm::{self, GenerationParams};
use crate::storage::llm_providers::{self, LlmProviderConfig};
use crate::storage::prompt_templates::{self, PromptTemplate};
use crate::storage::work_items::{self, GeneratedFields, WorkItemStatus};
use crate::storage::DbPool;
use crate::vault::VaultKey;

use super::placeholders;
use super::{elapsed_ms, StageResult};

/// Run one Generation pass over every `prepared` item for `process_id`.
///
/// LLM provider configurations and prompt templates are fetched once per
/// batch (API keys decrypted once, not per item) and cached by id for the
/// remainder of the pass. LLM calls are not subject to the upstream rate
/// limiter -- it guards a different endpoint.
pub async fn run(
    pool: &DbPool,
    process_id: Uuid,
    vault_key: &VaultKey,
    disclosure_prefix: &str,
) -> StageResult {
    let start = Instant::now();
    let items = match work_items::list_by_stage(pool, process_id, WorkItemStatus::Prepared).await {
        Ok(items) => items,
        Err(e) => return StageResult::stage_exception(e.to_string(), elapsed_ms(start)),
    };

    if items.is_empty() {
        return StageResult::new(0, 0, vec![], elapsed_ms(start));
    }

    let mut provider_cache: HashMap<Uuid, LlmProviderConfig> = HashMap::new();
    let mut template_cache: HashMap<Uuid, PromptTemplate> = HashMap::new();

    let mut advanced = 0u32;
    let mut failed = 0u32;
    let mut errors = Vec::new();

    for item in items {
        let item_start = Instant::now();

        let (Some(provider_id), Some(template_id)) =
            (item.llm_provider_id, item.prompt_template_id)
        else {
            failed += 1;
            errors.push(format!("item {}: missing provider or template selection", item.id));
            let _ = work_items::mark_failed(pool, item.id, "missing provider or template selection").await;
            continue;
        };

        if !provider_cache.contains_key(&provider_id) {
            match llm_providers::get(pool, provider_id, vault_key).await {
                Ok(config) => {
                    provider_cache.insert(provider_id, config);
                }
                Err(e) => {
                    failed += 1;
                    errors.push(format!("item {}: {e}", item.id));
                    let _ = work_items::mark_failed(pool, item.id, &e.to_string()).await;
                    continue;
                }
            }
        }
        if !template_cache.contains_key(&template_id) {
            match prompt_templates::get(pool, template_id).await {
                Ok(template) => {
                    template_cache.insert(template_id, template);
                }
                Err(e) => {
                    failed += 1;
                    errors.push(format!("item {}: {e}", item.id));
                    let _ = work_items::mark_failed(pool, item.id, &e.to_string()).await;
                    continue;
                }
            }
        }

        let config = &provider_cache[&provider_id];
        let template = &template_cache[&template_id];

        let user_prompt = placeholders::render(&template.user_prompt_template, &item);
        let provider = llm::factory::create_provider(config);
        let params = GenerationParams {
            max_tokens: config.max_tokens as u32,
            temperature: config.temperature as f32,
            system_prompt: None,
        };

        match provider.complete(&template.system_prompt, &user_prompt, &params).await {
            Ok(response) => {
                let comment_text = placeholders::with_disclosure_prefix(&response.text, disclosure_prefix);
                let result = work_items::update_to_generated(
                    pool,
                    item.id,
                    GeneratedFields {
                        comment_text,
                        llm_model_name: response.model,
                        llm_provider_name: config.provider_tag.as_str().to_string(),
                        generation_tokens: (response.usage.input_tokens + response.usage.output_tokens) as i64,
                        generation_time_ms: elapsed_ms(item_start) as i64,
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
            Err(e) => {
                failed += 1;
                errors.push(format!("item {}: {e}", item.id));
                let _ = work_items::mark_failed(pool, item.id, &e.to_string()).await;
            }
        }
    }

    StageResult::new(advanced, failed, errors, elapsed_ms(start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::init_test_db;

    #[tokio::test]
    async fn no_prepared_items_yields_success_with_zero_counts() {
        let pool = init_test_db().await.unwrap();
        let key = VaultKey::from_bytes(vec![0u8; 32]).unwrap();
        let result = run(&pool, Uuid::new_v4(), &key, "[AI]").await;
        assert_eq!(result.advanced, 0);
        assert_eq!(result.failed, 0);
        assert_eq!(result.status, super::super::StageOutcome::Success);
    }
}

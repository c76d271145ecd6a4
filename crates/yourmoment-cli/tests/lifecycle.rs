//! End-to-end exercise of the CLI's `Runtime` against an in-memory database:
//! build a process fixture directly through the storage layer, then drive it
//! through the same `Scheduler` calls the `start`/`tick`/`stop` subcommands
//! use.

use uuid::Uuid;
use yourmoment_core::config::test_config;
use yourmoment_core::storage::processes::{self, ProcessStatus};
use yourmoment_core::storage::{init_test_db, llm_providers, prompt_templates, upstream_logins};
use yourmoment_core::vault::VaultKey;

async fn fixture_process(pool: &yourmoment_core::storage::DbPool) -> Uuid {
    let owner = Uuid::new_v4();
    let key = VaultKey::from_bytes(vec![0u8; 32]).unwrap();

    let provider = llm_providers::create(
        pool,
        llm_providers::NewLlmProviderConfig {
            owner,
            provider_tag: llm_providers::ProviderTag::Openai,
            model_name: "gpt-3.5-turbo".to_string(),
            api_key_plaintext: "sk-test".to_string(),
            max_tokens: 512,
            temperature: 0.7,
        },
        &key,
    )
    .await
    .unwrap();

    let login = upstream_logins::create(
        pool,
        upstream_logins::NewUpstreamLogin {
            owner,
            display_name: "L".to_string(),
            username_plaintext: "u".to_string(),
            password_plaintext: "p".to_string(),
            is_admin: false,
        },
        &key,
    )
    .await
    .unwrap();

    let template = prompt_templates::create(
        pool,
        prompt_templates::NewPromptTemplate {
            owner: Some(owner),
            category: prompt_templates::TemplateCategory::User,
            name: "T".to_string(),
            description: None,
            system_prompt: "sp".to_string(),
            user_prompt_template: "{article_title}".to_string(),
        },
    )
    .await
    .unwrap();

    let process = processes::create(
        pool,
        processes::NewProcess {
            owner,
            name: "P".to_string(),
            description: None,
            max_duration_minutes: 60,
            generate_only: false,
            llm_provider_id: provider.id,
            filter: processes::ProcessFilter::default(),
            login_ids: vec![login.id],
            template_ids: vec![template.id],
        },
    )
    .await
    .unwrap();

    process.id
}

#[tokio::test]
async fn runtime_init_builds_a_working_scheduler() {
    let mut config = test_config();
    config.upstream.max_concurrent_sessions = 5;

    let pool = init_test_db().await.unwrap();
    let process_id = fixture_process(&pool).await;

    // `yourmoment-cli` has no lib target, so this mirrors `Runtime::init`'s
    // construction directly rather than calling it.
    let registry = std::sync::Arc::new(yourmoment_core::upstream::SessionRegistry::new(
        config.upstream.base_url.clone(),
        config.upstream.login_path.clone(),
        config.upstream.request_timeout_secs,
        config.upstream.max_redirect_hops,
        60,
        config.rate_limiter.requests_per_second,
    ));
    let vault_key = VaultKey::from_base64(config.vault_key.as_deref().unwrap()).unwrap();
    let scheduler = yourmoment_core::scheduler::Scheduler::new(
        pool.clone(),
        registry,
        vault_key,
        config.disclosure_prefix.clone(),
        config.upstream.base_url.clone(),
        config.scheduler.max_articles_per_request as usize,
    );

    let started = scheduler.start_process(process_id).await.unwrap();
    assert_eq!(started.status, ProcessStatus::Running);

    let stopped = scheduler.stop_process(process_id, "manual").await.unwrap();
    assert_eq!(stopped.status, ProcessStatus::Stopped);
    assert_eq!(stopped.stop_reason.as_deref(), Some("manual"));

    pool.close().await;
}

#[test]
fn load_and_validate_reports_missing_vault_key() {
    let errors = yourmoment_core::config::Config::load_and_validate(Some("/nonexistent/path.toml"));
    assert!(errors.is_err());
}

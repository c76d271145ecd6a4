//! Provider factory for creating LLM providers from a stored configuration.

use super::openai_compat::OpenAiCompatProvider;
use super::LlmProvider;
use crate::storage::llm_providers::{LlmProviderConfig, ProviderTag};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";

/// Construct the provider implementation for a stored configuration.
///
/// Both supported tags speak the OpenAI chat-completions wire format, so
/// both are served by [`OpenAiCompatProvider`], parameterized by base URL.
pub fn create_provider(config: &LlmProviderConfig) -> Box<dyn LlmProvider> {
    let base_url = match config.provider_tag {
        ProviderTag::Openai => OPENAI_BASE_URL,
        ProviderTag::Mistral => MISTRAL_BASE_URL,
    };

    Box::new(OpenAiCompatProvider::new(
        base_url.to_string(),
        config.api_key.clone(),
        config.model_name.clone(),
        config.provider_tag.as_str().to_string(),
    ))
}

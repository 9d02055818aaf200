//! Provider registry (C4, §4.9).
//!
//! Builds the active chat adapter and (optionally) the active embedding
//! adapter from a validated config snapshot plus the secrets document. The
//! hot-swap coordinator calls these functions off to the side — on success it
//! swaps the result into the [`crate::swap::SwappableProvider`] /
//! [`crate::swap::SwappableEmbeddingProvider`]; on failure the currently
//! live provider keeps serving traffic.

use crate::anthropic::AnthropicProvider;
use crate::bedrock::BedrockProvider;
use crate::google::GoogleProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::{EmbeddingProvider, LlmProvider};
use spaceduck_domain::config::EmbeddingProvider as EmbeddingProviderKind;
use spaceduck_domain::config::{AiConfig, AiProvider, Config, EmbeddingConfig, SecretsDocument};
use spaceduck_domain::error::{Error, Result};
use std::sync::Arc;

fn require_secret(secrets: &SecretsDocument, path: &str) -> Result<String> {
    secrets
        .get(path)
        .map(str::to_string)
        .ok_or_else(|| Error::Auth(format!("secret not set: {path}")))
}

/// Build the active chat provider from `/ai/*` config (§4.9 provider
/// rebuild, triggered by [`spaceduck_domain::config::PROVIDER_REBUILD_PATHS`]).
pub fn build_provider(config: &Config, secrets: &SecretsDocument) -> Result<Arc<dyn LlmProvider>> {
    let ai: &AiConfig = &config.ai;
    let provider: Arc<dyn LlmProvider> = match ai.provider {
        AiProvider::Anthropic => {
            let api_key = require_secret(secrets, AiProvider::Anthropic.secret_path())?;
            Arc::new(AnthropicProvider::new(
                ai.base_url.as_deref(),
                api_key,
                ai.model.clone(),
            )?)
        }
        AiProvider::OpenaiCompat => {
            let api_key = require_secret(secrets, AiProvider::OpenaiCompat.secret_path())?;
            Arc::new(OpenAiCompatProvider::new(
                ai.base_url.as_deref(),
                api_key,
                ai.model.clone(),
            )?)
        }
        AiProvider::Gemini => {
            let api_key = require_secret(secrets, AiProvider::Gemini.secret_path())?;
            Arc::new(GoogleProvider::new(
                ai.base_url.as_deref(),
                api_key,
                ai.model.clone(),
            )?)
        }
        AiProvider::Bedrock => Arc::new(BedrockProvider::new(ai.region.as_deref())?),
    };
    Ok(provider)
}

/// Build the active embedding provider from `/embedding/*` config (§4.9
/// embedding rebuild). Returns `None` when `/embedding/enabled` is false —
/// memory recall then falls back to textual matching (§4.10).
pub fn build_embedding_provider(
    config: &Config,
    secrets: &SecretsDocument,
) -> Result<Option<Arc<dyn EmbeddingProvider>>> {
    let embedding: &EmbeddingConfig = &config.embedding;
    if !embedding.enabled {
        return Ok(None);
    }

    let provider: Arc<dyn EmbeddingProvider> = match embedding.provider {
        EmbeddingProviderKind::OpenaiCompat => {
            let api_key = require_secret(secrets, "/embedding/secrets/apiKey")?;
            Arc::new(OpenAiCompatProvider::new_embedding(
                embedding.base_url.as_deref(),
                api_key,
                embedding.model.clone(),
                embedding.dimensions,
            )?)
        }
        EmbeddingProviderKind::Gemini => {
            let api_key = require_secret(secrets, "/embedding/secrets/apiKey")?;
            Arc::new(GoogleProvider::new_embedding(
                embedding.base_url.as_deref(),
                api_key,
                embedding.model.clone(),
                embedding.dimensions,
            )?)
        }
        EmbeddingProviderKind::Local => {
            return Err(Error::Validation(
                "embedding.provider = \"local\" is not yet implemented; \
                 set embedding.enabled = false or choose a hosted provider"
                    .into(),
            ));
        }
    };

    Ok(Some(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_disabled_returns_none() {
        let config = Config::default();
        let secrets = SecretsDocument::default();
        let result = build_embedding_provider(&config, &secrets).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn missing_secret_is_an_auth_error() {
        let config = Config::default();
        let secrets = SecretsDocument::default();
        let err = build_provider(&config, &secrets).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}

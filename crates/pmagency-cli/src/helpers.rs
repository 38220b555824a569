//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization, LLM provider resolution, and environment
//! variable utilities.

use anyhow::{Result, bail};
use pmagency_agent::{LlmClientConfig, LlmProvider};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// LLM provider resolution
// ---------------------------------------------------------------------------

const DEFAULT_MODEL: &str = "gpt-4o";

/// The chosen LLM endpoint plus the model every agent must use, if any.
#[derive(Debug, Clone)]
pub struct ResolvedLlm {
    pub config: LlmClientConfig,
    /// Set when the environment names a model (or Azure deployment)
    /// explicitly; it then overrides the per-agent models in `agency.toml`.
    pub pinned_model: Option<String>,
}

/// Resolve which LLM provider, API key, and model to use from the process
/// environment.
pub fn resolve_llm_config() -> Result<ResolvedLlm> {
    resolve_llm_config_from(env_non_empty)
}

/// Resolve the LLM configuration through `lookup`.
///
/// Resolution order:
///
/// 1. If `PMAGENCY_PROVIDER` is set (`openai` or `azure`), use that provider.
/// 2. Otherwise Azure when `AZURE_OPENAI_API_KEY` and `AZURE_OPENAI_ENDPOINT`
///    are both set, then OpenAI when `OPENAI_API_KEY` is set.
///
/// `PMAGENCY_MODEL` overrides the model and `PMAGENCY_API_BASE_URL` the base
/// URL (or Azure endpoint).
pub fn resolve_llm_config_from(lookup: impl Fn(&str) -> Option<String>) -> Result<ResolvedLlm> {
    let explicit_provider = lookup("PMAGENCY_PROVIDER");
    let model_override = lookup("PMAGENCY_MODEL");
    let base_url_override = lookup("PMAGENCY_API_BASE_URL");

    let try_azure = || -> Option<ResolvedLlm> {
        let key = lookup("AZURE_OPENAI_API_KEY")?;
        let endpoint = base_url_override
            .clone()
            .or_else(|| lookup("AZURE_OPENAI_ENDPOINT"))?;
        let pinned_model = lookup("AZURE_OPENAI_DEPLOYMENT").or_else(|| model_override.clone());
        let deployment = pinned_model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_owned());
        Some(ResolvedLlm {
            config: LlmClientConfig::azure(key, endpoint, deployment, lookup("OPENAI_API_VERSION")),
            pinned_model,
        })
    };

    let try_openai = || -> Option<ResolvedLlm> {
        let key = lookup("OPENAI_API_KEY")?;
        let model = model_override
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_owned());
        let config = match base_url_override.clone() {
            Some(url) => LlmClientConfig::openai_compatible(key, model, url),
            None => LlmClientConfig::openai(key, model),
        };
        Some(ResolvedLlm {
            config,
            pinned_model: model_override.clone(),
        })
    };

    if let Some(provider) = explicit_provider {
        return match provider.to_ascii_lowercase().as_str() {
            "azure" | "azure_openai" => try_azure().ok_or_else(|| {
                anyhow::anyhow!(
                    "azure provider selected but AZURE_OPENAI_API_KEY or AZURE_OPENAI_ENDPOINT is not set"
                )
            }),
            "openai" => try_openai().ok_or_else(|| {
                anyhow::anyhow!("openai provider selected but OPENAI_API_KEY is not set")
            }),
            other => bail!("unknown PMAGENCY_PROVIDER `{other}`; expected `openai` or `azure`"),
        };
    }

    if let Some(resolved) = try_azure().or_else(try_openai) {
        return Ok(resolved);
    }

    bail!(
        "no LLM credentials found; set OPENAI_API_KEY, or AZURE_OPENAI_API_KEY and \
         AZURE_OPENAI_ENDPOINT"
    )
}

/// Short human label for the banner.
pub fn provider_label(config: &LlmClientConfig) -> &'static str {
    match config.provider {
        LlmProvider::OpenAI => "OpenAI",
        LlmProvider::AzureOpenAI => "Azure OpenAI",
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Read an environment variable, treating empty values as unset.
pub fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn azure_wins_when_fully_configured() {
        let resolved = resolve_llm_config_from(env(&[
            ("OPENAI_API_KEY", "sk-1"),
            ("AZURE_OPENAI_API_KEY", "az-1"),
            ("AZURE_OPENAI_ENDPOINT", "https://vrsen.openai.azure.com/"),
            ("OPENAI_API_VERSION", "2024-02-15-preview"),
        ]))
        .unwrap();
        assert_eq!(resolved.config.provider, LlmProvider::AzureOpenAI);
        assert_eq!(resolved.config.base_url, "https://vrsen.openai.azure.com");
        assert_eq!(resolved.config.default_model, DEFAULT_MODEL);
        assert_eq!(resolved.config.api_version.as_deref(), Some("2024-02-15-preview"));
        assert!(resolved.pinned_model.is_none());
    }

    #[test]
    fn azure_key_without_endpoint_falls_back_to_openai() {
        let resolved = resolve_llm_config_from(env(&[
            ("AZURE_OPENAI_API_KEY", "az-1"),
            ("OPENAI_API_KEY", "sk-1"),
        ]))
        .unwrap();
        assert_eq!(resolved.config.provider, LlmProvider::OpenAI);
        assert_eq!(resolved.config.api_key, "sk-1");
    }

    #[test]
    fn azure_deployment_pins_every_agent() {
        let resolved = resolve_llm_config_from(env(&[
            ("AZURE_OPENAI_API_KEY", "az-1"),
            ("AZURE_OPENAI_ENDPOINT", "https://x.openai.azure.com"),
            ("AZURE_OPENAI_DEPLOYMENT", "pm-gpt4o"),
        ]))
        .unwrap();
        assert_eq!(resolved.config.default_model, "pm-gpt4o");
        assert_eq!(resolved.pinned_model.as_deref(), Some("pm-gpt4o"));
    }

    #[test]
    fn explicit_openai_with_overrides() {
        let resolved = resolve_llm_config_from(env(&[
            ("PMAGENCY_PROVIDER", "openai"),
            ("OPENAI_API_KEY", "sk-1"),
            ("AZURE_OPENAI_API_KEY", "az-1"),
            ("AZURE_OPENAI_ENDPOINT", "https://x.openai.azure.com"),
            ("PMAGENCY_MODEL", "gpt-4o-mini"),
            ("PMAGENCY_API_BASE_URL", "http://localhost:8080/v1/"),
        ]))
        .unwrap();
        assert_eq!(resolved.config.provider, LlmProvider::OpenAI);
        assert_eq!(resolved.config.base_url, "http://localhost:8080/v1");
        assert_eq!(resolved.config.default_model, "gpt-4o-mini");
        assert_eq!(resolved.pinned_model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn explicit_provider_without_key_is_an_error() {
        let err = resolve_llm_config_from(env(&[("PMAGENCY_PROVIDER", "azure")])).unwrap_err();
        assert!(err.to_string().contains("AZURE_OPENAI_API_KEY"));
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let err = resolve_llm_config_from(env(&[("PMAGENCY_PROVIDER", "anthropic")])).unwrap_err();
        assert!(err.to_string().contains("anthropic"));
    }

    #[test]
    fn nothing_configured_is_an_error() {
        assert!(resolve_llm_config_from(env(&[])).is_err());
    }
}

//! Gateway router: builds the model gateway and retriever from config.

use std::sync::Arc;
use std::time::Duration;

use ragent_config::{AppConfig, RetrievalConfig};
use ragent_core::{GatewayError, ModelGateway, RetrievalError, Retriever};
use ragent_memory::{InMemoryRetriever, NoopRetriever};
use tracing::info;

use crate::gemini::GeminiGateway;
use crate::http_retriever::HttpRetriever;
use crate::openai_compat::OpenAiCompatGateway;

/// Build the gateway for `config.default_provider`.
///
/// A `[providers.<name>]` section may override the API key, base URL and
/// model; otherwise the top-level values apply.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn ModelGateway>, GatewayError> {
    let name = config.default_provider.as_str();
    let provider_config = config.providers.get(name);

    let api_key = provider_config
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone());
    let model = provider_config
        .and_then(|p| p.default_model.clone())
        .unwrap_or_else(|| config.default_model.clone());
    let base_url = provider_config
        .and_then(|p| p.api_url.clone())
        .unwrap_or_else(|| default_base_url(name));

    let api_key = match (api_key, requires_api_key(name)) {
        (Some(key), _) => key,
        (None, false) => String::new(),
        (None, true) => {
            return Err(GatewayError::NotConfigured(format!(
                "no API key for provider '{name}'"
            )));
        }
    };

    info!(provider = name, model = %model, "Building model gateway");

    let gateway: Arc<dyn ModelGateway> = if name == "gemini" {
        Arc::new(
            GeminiGateway::new(api_key, model)?
                .with_base_url(base_url)
                .with_temperature(config.default_temperature),
        )
    } else {
        Arc::new(
            OpenAiCompatGateway::new(name, base_url, api_key, model)?
                .with_temperature(config.default_temperature),
        )
    };
    Ok(gateway)
}

/// Build the retrieval backend named by `retrieval.backend`.
pub fn build_retriever(config: &RetrievalConfig) -> Result<Arc<dyn Retriever>, RetrievalError> {
    let retriever: Arc<dyn Retriever> = match config.backend.as_str() {
        "memory" => Arc::new(memory_retriever(config)?),
        "http" => {
            let url = config.url.as_deref().ok_or_else(|| {
                RetrievalError::Unavailable("retrieval.url is not configured".into())
            })?;
            Arc::new(HttpRetriever::new(url, Duration::from_secs(30))?)
        }
        _ => Arc::new(NoopRetriever),
    };
    info!(backend = retriever.name(), "Retrieval backend ready");
    Ok(retriever)
}

/// Collect the inline documents and those in `documents_path`.
fn memory_retriever(config: &RetrievalConfig) -> Result<InMemoryRetriever, RetrievalError> {
    let retriever = InMemoryRetriever::with_documents(config.documents.iter().cloned());

    if let Some(path) = &config.documents_path {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RetrievalError::Unavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .for_each(|line| retriever.add(line));
    }

    info!(documents = retriever.len(), "Loaded in-memory documents");
    Ok(retriever)
}

fn requires_api_key(provider_name: &str) -> bool {
    !matches!(provider_name, "ollama" | "vllm" | "llamacpp")
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "gemini" => crate::gemini::DEFAULT_BASE_URL.into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" => "http://localhost:8080/v1".into(),
        _ => "https://api.openai.com/v1".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragent_config::ProviderConfig;

    fn config_with_key() -> AppConfig {
        AppConfig {
            api_key: Some("test-key".into()),
            ..AppConfig::default()
        }
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("gemini").contains("generativelanguage.googleapis.com"));
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn build_default_gemini() {
        let gateway = build_from_config(&config_with_key()).unwrap();
        assert_eq!(gateway.name(), "gemini");
    }

    #[test]
    fn build_openai_compatible() {
        let mut config = config_with_key();
        config.default_provider = "openrouter".into();
        let gateway = build_from_config(&config).unwrap();
        assert_eq!(gateway.name(), "openrouter");
    }

    #[test]
    fn missing_key_is_rejected() {
        let config = AppConfig::default();
        let err = build_from_config(&config).err().unwrap();
        assert!(matches!(err, GatewayError::NotConfigured(_)));
    }

    #[test]
    fn provider_section_supplies_key() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "gemini".into(),
            ProviderConfig {
                api_key: Some("section-key".into()),
                api_url: None,
                default_model: Some("gemini-2.5-pro".into()),
            },
        );
        assert!(build_from_config(&config).is_ok());
    }

    #[test]
    fn ollama_needs_no_key() {
        let mut config = AppConfig::default();
        config.default_provider = "ollama".into();
        assert!(build_from_config(&config).is_ok());
    }

    #[test]
    fn retriever_selection() {
        let none = build_retriever(&RetrievalConfig::default()).unwrap();
        assert_eq!(none.name(), "none");

        let memory = build_retriever(&RetrievalConfig {
            backend: "memory".into(),
            ..RetrievalConfig::default()
        })
        .unwrap();
        assert_eq!(memory.name(), "memory");

        let http = build_retriever(&RetrievalConfig {
            backend: "http".into(),
            url: Some("http://localhost:8000/search".into()),
            ..RetrievalConfig::default()
        })
        .unwrap();
        assert_eq!(http.name(), "http");
    }

    #[tokio::test]
    async fn memory_retriever_serves_configured_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faq.txt");
        std::fs::write(&path, "Shipping is free over fifty euros.\n\n  \n").unwrap();

        let retriever = build_retriever(&RetrievalConfig {
            backend: "memory".into(),
            documents: vec!["Refunds are processed within five days.".into()],
            documents_path: Some(path),
            ..RetrievalConfig::default()
        })
        .unwrap();

        let docs = retriever.search("how do refunds work", 3).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].text.starts_with("Refunds"));

        let docs = retriever.search("is shipping free", 3).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].text.starts_with("Shipping"));
    }

    #[test]
    fn unreadable_documents_file_is_an_error() {
        let result = build_retriever(&RetrievalConfig {
            backend: "memory".into(),
            documents_path: Some("/nonexistent/ragent/faq.txt".into()),
            ..RetrievalConfig::default()
        });
        assert!(matches!(result, Err(RetrievalError::Unavailable(_))));
    }

    #[test]
    fn http_retriever_requires_url() {
        let result = build_retriever(&RetrievalConfig {
            backend: "http".into(),
            url: None,
            ..RetrievalConfig::default()
        });
        assert!(result.is_err());
    }
}

//! Provider subsystem for text-generation backends.
//!
//! Each backend implements the [`Provider`] trait defined in [`traits`] and is
//! selected by [`create_provider`] from the `[inference]` config section.

pub mod ollama;
pub mod traits;

pub use ollama::{InferenceError, OllamaProvider};
pub use traits::Provider;

use crate::config::InferenceConfig;
use std::sync::Arc;
use std::time::Duration;

const MAX_ERROR_BODY_CHARS: usize = 200;

/// Truncate a backend error body so it can be echoed to callers.
pub fn truncate_error_body(input: &str) -> String {
    let trimmed = input.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((end, _)) => format!("{}...", &trimmed[..end]),
        None => trimmed.to_string(),
    }
}

/// Factory: create the configured provider.
pub fn create_provider(config: &InferenceConfig) -> anyhow::Result<Arc<dyn Provider>> {
    match config.provider.trim() {
        "ollama" => Ok(Arc::new(OllamaProvider::with_timeouts(
            &config.base_url,
            &config.model,
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
        ))),
        "" => anyhow::bail!("inference.provider cannot be empty. Supported values: ollama"),
        other => anyhow::bail!("Unknown provider '{other}'. Supported values: ollama"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_ollama() {
        let provider = create_provider(&InferenceConfig::default()).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.model(), "llama3");
    }

    #[test]
    fn factory_unknown_errors() {
        let cfg = InferenceConfig {
            provider: "openai".into(),
            ..InferenceConfig::default()
        };
        match create_provider(&cfg) {
            Err(err) => assert!(err.to_string().contains("Unknown provider")),
            Ok(_) => panic!("unknown provider should error"),
        }
    }

    #[test]
    fn factory_empty_errors() {
        let cfg = InferenceConfig {
            provider: String::new(),
            ..InferenceConfig::default()
        };
        match create_provider(&cfg) {
            Err(err) => assert!(err.to_string().contains("cannot be empty")),
            Ok(_) => panic!("empty provider should error"),
        }
    }

    #[test]
    fn short_error_body_is_kept() {
        assert_eq!(truncate_error_body("  model not found\n"), "model not found");
    }

    #[test]
    fn long_error_body_is_truncated_on_char_boundary() {
        let body = "é".repeat(300);
        let out = truncate_error_body(&body);
        assert_eq!(out, format!("{}...", "é".repeat(MAX_ERROR_BODY_CHARS)));
    }

    #[test]
    fn body_of_exactly_max_chars_is_kept() {
        let body = "ü".repeat(MAX_ERROR_BODY_CHARS);
        assert_eq!(truncate_error_body(&body), body);
    }
}

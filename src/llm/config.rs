//! LLM configuration types
//!
//! Model selection and sampling settings, set once per provider and
//! optionally overridden per node.

use serde::{Deserialize, Serialize};

/// Model used when nothing else is configured
pub const DEFAULT_MODEL: &str = "gpt-4.1";

/// LLM Provider configuration
///
/// # Example
///
/// ```
/// use sqlflow::llm::LLMConfig;
///
/// let config = LLMConfig::new("gpt-4.1")
///     .with_temperature(0.0)
///     .with_max_tokens(1024);
///
/// assert_eq!(config.model, "gpt-4.1");
/// assert_eq!(config.temperature, Some(0.0));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Model identifier
    pub model: String,
    /// Sampling temperature (0.0 - 2.0). SQL generation wants this low.
    pub temperature: Option<f64>,
    /// Maximum tokens to generate in the response
    pub max_tokens: Option<u64>,
    /// API key (optional, can use environment variable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// API base URL (optional, for custom endpoints)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

impl LLMConfig {
    /// Create a new configuration with the specified model
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: None,
            api_key: None,
            api_base: None,
        }
    }

    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, tokens: u64) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    /// Apply per-node overrides. `None` keeps the current value.
    pub fn overridden(&self, model: Option<&str>, temperature: Option<f64>) -> Self {
        let mut config = self.clone();
        if let Some(model) = model {
            config.model = model.to_string();
        }
        if temperature.is_some() {
            config.temperature = temperature;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_config_builder() {
        let config = LLMConfig::new("gpt-4.1-mini")
            .with_temperature(0.2)
            .with_max_tokens(2048);

        assert_eq!(config.model, "gpt-4.1-mini");
        assert_eq!(config.temperature, Some(0.2));
        assert_eq!(config.max_tokens, Some(2048));
        assert_eq!(LLMConfig::default().model, DEFAULT_MODEL);
    }

    #[test]
    fn test_overrides() {
        let base = LLMConfig::new("gpt-4.1").with_temperature(0.0);

        let same = base.overridden(None, None);
        assert_eq!(same, base);

        let changed = base.overridden(Some("gpt-4o"), Some(0.5));
        assert_eq!(changed.model, "gpt-4o");
        assert_eq!(changed.temperature, Some(0.5));
    }

    #[test]
    fn test_llm_config_serialization() {
        let config = LLMConfig::new("gpt-4.1").with_temperature(0.5);

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("gpt-4.1"));
        assert!(json.contains("0.5"));
        assert!(!json.contains("api_key"));
    }
}

//! LLM Provider trait definition
//!
//! The engine treats the language model as an external capability:
//! messages go in, text comes out. Implementations bridge to specific
//! providers via Rig.

use async_trait::async_trait;

use super::config::LLMConfig;
use crate::error::LlmError;
use crate::state::{Message, Role};

/// LLM completion response
#[derive(Debug, Clone, PartialEq)]
pub struct LLMResponse {
    /// The assistant's response message
    pub message: Message,
}

impl LLMResponse {
    pub fn new(message: Message) -> Self {
        Self { message }
    }

    /// Response text
    pub fn content(&self) -> &str {
        &self.message.content
    }
}

/// Core LLM Provider trait
///
/// # Example Implementation
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use sqlflow::llm::{LLMConfig, LLMProvider, LLMResponse};
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl LLMProvider for MyProvider {
///     async fn complete(
///         &self,
///         messages: &[Message],
///         config: Option<&LLMConfig>,
///     ) -> Result<LLMResponse, LlmError> {
///         // Implementation here
///     }
///
///     fn name(&self) -> &str { "my-provider" }
///     fn default_model(&self) -> &str { "my-model" }
/// }
/// ```
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion for a conversation.
    ///
    /// `config` overrides the provider defaults for this call only.
    async fn complete(
        &self,
        messages: &[Message],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, LlmError>;

    /// Provider name for logging/debugging
    fn name(&self) -> &str;

    /// Default model identifier for this provider
    fn default_model(&self) -> &str;
}

/// Join all system messages into a single preamble
pub fn extract_system_preamble(messages: &[Message]) -> Option<String> {
    let system_messages: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    if system_messages.is_empty() {
        None
    } else {
        Some(system_messages.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl LLMProvider for EchoProvider {
        async fn complete(
            &self,
            messages: &[Message],
            config: Option<&LLMConfig>,
        ) -> Result<LLMResponse, LlmError> {
            let last = messages.last().ok_or(LlmError::EmptyResponse)?;
            let model = config.map(|c| c.model.as_str()).unwrap_or("echo-model");
            Ok(LLMResponse::new(Message::assistant(&format!(
                "{}: {}",
                model, last.content
            ))))
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn default_model(&self) -> &str {
            "echo-model"
        }
    }

    #[tokio::test]
    async fn test_provider_complete() {
        let provider = EchoProvider;
        let response = provider
            .complete(&[Message::user("Hello")], None)
            .await
            .unwrap();

        assert_eq!(response.content(), "echo-model: Hello");
        assert_eq!(response.message.role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_provider_with_config_and_error() {
        let provider = EchoProvider;
        let config = LLMConfig::new("custom");
        let response = provider
            .complete(&[Message::user("Hi")], Some(&config))
            .await
            .unwrap();
        assert!(response.content().starts_with("custom"));

        let err = provider.complete(&[], None).await.unwrap_err();
        assert_eq!(err, LlmError::EmptyResponse);
    }

    #[test]
    fn test_extract_system_preamble() {
        let messages = vec![
            Message::system("You write PostgreSQL."),
            Message::user("count users"),
            Message::system("Return only SQL."),
        ];
        assert_eq!(
            extract_system_preamble(&messages).as_deref(),
            Some("You write PostgreSQL.\n\nReturn only SQL.")
        );
        assert!(extract_system_preamble(&[Message::user("x")]).is_none());
    }
}

//! OpenAI LLM Provider implementation via Rig

use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::openai::Client;

use super::config::{LLMConfig, DEFAULT_MODEL};
use super::provider::{extract_system_preamble, LLMProvider, LLMResponse};
use crate::error::LlmError;
use crate::state::{Message, Role};

/// OpenAI LLM Provider
///
/// # Example
///
/// ```rust,ignore
/// use sqlflow::llm::OpenAIProvider;
///
/// // Create from environment (OPENAI_API_KEY)
/// let provider = OpenAIProvider::from_env();
///
/// // Or with explicit configuration
/// let provider = OpenAIProvider::new("sk-...", "gpt-4.1");
/// ```
pub struct OpenAIProvider {
    client: Client,
    default_config: LLMConfig,
}

impl OpenAIProvider {
    /// Create a provider with the API key from OPENAI_API_KEY
    pub fn from_env() -> Self {
        Self::from_env_with_config(LLMConfig::new(DEFAULT_MODEL))
    }

    pub fn from_env_with_config(config: LLMConfig) -> Self {
        Self {
            client: Client::from_env(),
            default_config: config,
        }
    }

    /// Create with explicit API key and model
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let api_key = api_key.into();
        Self {
            client: Client::from_val(api_key.into()),
            default_config: LLMConfig::new(model),
        }
    }

    fn effective_config<'a>(&'a self, runtime: Option<&'a LLMConfig>) -> &'a LLMConfig {
        runtime.unwrap_or(&self.default_config)
    }

    /// Flatten the non-system conversation into a single prompt. The final
    /// user message is the actual request; earlier turns are context.
    fn build_prompt(messages: &[Message]) -> String {
        let turns: Vec<&Message> = messages.iter().filter(|m| m.role != Role::System).collect();
        match turns.as_slice() {
            [] => String::new(),
            [only] => only.content.clone(),
            [history @ .., last] => {
                let mut prompt = String::new();
                for message in history {
                    let speaker = match message.role {
                        Role::Assistant => "Assistant",
                        _ => "User",
                    };
                    prompt.push_str(&format!("{}: {}\n", speaker, message.content));
                }
                prompt.push('\n');
                prompt.push_str(&last.content);
                prompt
            }
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn complete(
        &self,
        messages: &[Message],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, LlmError> {
        let config = self.effective_config(config);

        let mut agent_builder = self.client.agent(&config.model);

        if let Some(preamble) = extract_system_preamble(messages) {
            agent_builder = agent_builder.preamble(&preamble);
        }

        if let Some(temp) = config.temperature {
            agent_builder = agent_builder.temperature(temp);
        }

        if let Some(max_tokens) = config.max_tokens {
            agent_builder = agent_builder.max_tokens(max_tokens);
        }

        let agent = agent_builder.build();
        let prompt = Self::build_prompt(messages);

        let response = agent
            .prompt(prompt.as_str())
            .await
            .map_err(|e| LlmError::Request(format!("OpenAI completion failed: {}", e)))?;

        if response.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(LLMResponse::new(Message::assistant(&response)))
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.default_config.model
    }
}

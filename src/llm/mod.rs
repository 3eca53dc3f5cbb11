//! LLM Provider abstractions
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   SQL generate / SQL execute vertices   │
//! └─────────────────┬───────────────────────┘
//!                   │ uses
//!                   ▼
//! ┌─────────────────────────────────────────┐
//! │        LLMProvider (trait)              │
//! │  - complete(messages, config)           │
//! └─────────────────┬───────────────────────┘
//!                   │ implemented by
//!                   ▼
//! ┌─────────────────────────────────────────┐
//! │   OpenAIProvider (rig-core client)      │
//! └─────────────────────────────────────────┘
//! ```

mod config;
mod openai;
mod provider;

pub use config::{LLMConfig, DEFAULT_MODEL};
pub use openai::OpenAIProvider;
pub use provider::{extract_system_preamble, LLMProvider, LLMResponse};

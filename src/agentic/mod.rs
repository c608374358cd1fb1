//! Language model plumbing for the congregation.
//!
//! - `llm`: the client trait every persona call goes through
//! - `anthropic`: the production client
//! - `prompt`: context and instruction assembly
//! - `action`: parsing and validating tick output

pub mod action;
pub mod anthropic;
pub mod llm;
pub mod prompt;

pub use action::{ActionKind, AgentAction, CANNED_BLESSING};
pub use anthropic::AnthropicClient;
pub use llm::{LlmClient, LlmRequest, LlmResponse};
pub use prompt::PersonaPrompt;

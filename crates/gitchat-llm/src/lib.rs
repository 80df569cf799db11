//! Shared LLM chat-completion client.
//!
//! The query planner (C6) and code analysis agent (C8) both need the same
//! thing from an LLM: send a message transcript, optionally offer tools,
//! optionally force JSON-only output, get back content and/or tool calls.
//! This crate provides that client once rather than duplicating a retrying
//! HTTP chat-completions call in each component.
//!
//! # Example
//!
//! ```no_run
//! use gitchat_llm::{build_provider, ChatRequest, Message};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = gitchat_config::LlmConfig::default();
//! let provider = build_provider(&config)?;
//! let response = provider
//!     .chat(ChatRequest::new(vec![Message::user("hello")]))
//!     .await?;
//! println!("{:?}", response.content);
//! # Ok(())
//! # }
//! ```

mod error;
mod factory;
mod openai;
mod provider;
mod types;

pub use error::{LlmError, Result};
pub use factory::build_provider;
pub use openai::{OpenAiChatClient, OpenAiChatConfig};
pub use provider::ChatProvider;
pub use types::{
    ChatRequest, ChatResponse, FunctionCall, FunctionDefinition, Message, ResponseFormat, Role,
    ToolCall, ToolDefinition,
};

//! Pluggable chat-completion provider.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ChatRequest;
use crate::ChatResponse;

/// A chat-completion backend. `gitchat-config::LlmProviderType` currently
/// only names one variant (OpenAI-compatible), but the query planner and
/// code analysis agent depend on this trait rather than a concrete client
/// so a second provider can be added without touching either caller.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run one chat-completion call.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;
}

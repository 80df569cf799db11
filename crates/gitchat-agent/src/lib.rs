//! Code analysis agent (C8): a bounded tool-use loop that lets an LLM
//! explore a cloned repository on disk to answer a natural-language
//! question about it.
//!
//! [`CodeAnalysisAgent::analyze`] hands the model four tools (`search_code`,
//! `read_file`, `list_directory`, `find_definitions`) behind a [`path`]
//! validator that confines every filesystem access to the repository root,
//! and runs at most ten request/tool-execute round trips before giving up.

mod agent;
mod error;
mod path;
mod tools;

pub use agent::{AgentAnswer, CodeAnalysisAgent, ToolCallRecord};
pub use error::{AgentError, Result};
pub use tools::tool_definitions;

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use gitchat_llm::{ChatProvider, ChatRequest, ChatResponse, FunctionCall, Result as LlmResult, ToolCall};

    use super::*;

    struct StubProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatProvider for StubProvider {
        async fn chat(&self, _request: ChatRequest) -> LlmResult<ChatResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                Ok(ChatResponse {
                    content: None,
                    tool_calls: vec![ToolCall {
                        id: "call_1".to_string(),
                        call_type: "function".to_string(),
                        function: FunctionCall {
                            name: "list_directory".to_string(),
                            arguments: "{\"dir_path\": \".\"}".to_string(),
                        },
                    }],
                    finish_reason: "tool_calls".to_string(),
                })
            } else {
                Ok(ChatResponse {
                    content: Some("Found the README in the root.".to_string()),
                    tool_calls: Vec::new(),
                    finish_reason: "stop".to_string(),
                })
            }
        }
    }

    struct LoopingProvider;

    #[async_trait]
    impl ChatProvider for LoopingProvider {
        async fn chat(&self, _request: ChatRequest) -> LlmResult<ChatResponse> {
            Ok(ChatResponse {
                content: None,
                tool_calls: vec![ToolCall {
                    id: "call_x".to_string(),
                    call_type: "function".to_string(),
                    function: FunctionCall {
                        name: "list_directory".to_string(),
                        arguments: "{\"dir_path\": \".\"}".to_string(),
                    },
                }],
                finish_reason: "tool_calls".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn analyze_reports_uncloned_repository() {
        let agent = CodeAnalysisAgent::new(Arc::new(StubProvider {
            calls: AtomicUsize::new(0),
        }));
        let answer = agent
            .analyze(Path::new("/definitely/not/cloned"), "what does this do?")
            .await
            .unwrap();
        assert!(answer.answer.contains("has not been cloned"));
        assert!(answer.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn analyze_executes_a_tool_call_then_returns_final_answer() {
        let tmp = tempfile::tempdir().unwrap();
        let agent = CodeAnalysisAgent::new(Arc::new(StubProvider {
            calls: AtomicUsize::new(0),
        }));
        let answer = agent.analyze(tmp.path(), "what files exist?").await.unwrap();

        assert_eq!(answer.answer, "Found the README in the root.");
        assert_eq!(answer.tool_calls.len(), 1);
        assert_eq!(answer.tool_calls[0].tool, "list_directory");
    }

    #[tokio::test]
    async fn analyze_stops_at_the_iteration_cap() {
        let tmp = tempfile::tempdir().unwrap();
        let agent = CodeAnalysisAgent::new(Arc::new(LoopingProvider));
        let answer = agent.analyze(tmp.path(), "infinite question").await.unwrap();

        assert!(answer.answer.contains("maximum iterations"));
        assert_eq!(answer.tool_calls.len(), 10);
    }
}

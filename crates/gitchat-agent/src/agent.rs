//! The bounded tool-use loop.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use gitchat_llm::{ChatProvider, ChatRequest, Message};

use crate::error::Result;
use crate::tools::{execute_tool, tool_definitions};

const MAX_ITERATIONS: usize = 10;

const SYSTEM_PROMPT: &str = "You are a code analysis agent. You have access to a cloned repository and can use tools to explore it.

Your goal is to answer questions about the codebase by:
1. Searching for relevant code patterns using ripgrep
2. Reading specific files to understand implementation details
3. Listing directories to understand project structure
4. Finding function/class definitions

Available tools:
- search_code: Search for patterns in code using ripgrep
- read_file: Read contents of a specific file
- list_directory: List files and directories
- find_definitions: Find function/class definitions matching a pattern

When you have gathered enough information, provide your final answer with:
- Clear explanation of what you found
- Specific file paths and line numbers when referencing code
- Code snippets when relevant

If you cannot find relevant information, say so clearly.";

/// One tool invocation the agent made while answering a query, exposed to
/// the caller for transparency/debugging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub arguments: Value,
}

/// The agent's final answer plus every tool call it made to get there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAnswer {
    pub answer: String,
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Explores a cloned repository with a bounded tool-use loop to answer a
/// natural-language question about its code.
pub struct CodeAnalysisAgent {
    provider: Arc<dyn ChatProvider>,
}

impl CodeAnalysisAgent {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self { provider }
    }

    /// Answer `query` about the repository checked out at `repo_path`.
    pub async fn analyze(&self, repo_path: &Path, query: &str) -> Result<AgentAnswer> {
        if !repo_path.exists() {
            return Ok(AgentAnswer {
                answer: "Repository has not been cloned. Please index the project first."
                    .to_string(),
                tool_calls: Vec::new(),
            });
        }

        let mut messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(format!(
                "Repository: {}\n\nQuestion: {query}",
                repo_path.display()
            )),
        ];
        let mut tool_calls_made = Vec::new();

        for _ in 0..MAX_ITERATIONS {
            let request = ChatRequest::new(messages.clone()).with_tools(tool_definitions());
            let response = self.provider.chat(request).await?;

            if !response.has_tool_calls() {
                return Ok(AgentAnswer {
                    answer: response
                        .content
                        .unwrap_or_else(|| "Unable to find relevant information.".to_string()),
                    tool_calls: tool_calls_made,
                });
            }

            messages.push(Message::assistant_tool_calls(response.tool_calls.clone()));

            for tool_call in &response.tool_calls {
                let arguments: Value = serde_json::from_str(&tool_call.function.arguments)
                    .unwrap_or_else(|e| {
                        warn!(
                            "malformed tool arguments for {}: {e}",
                            tool_call.function.name
                        );
                        Value::Object(Default::default())
                    });

                tool_calls_made.push(ToolCallRecord {
                    tool: tool_call.function.name.clone(),
                    arguments: arguments.clone(),
                });

                let result = execute_tool(repo_path, &tool_call.function.name, &arguments).await;
                messages.push(Message::tool_result(tool_call.id.clone(), result));
            }
        }

        Ok(AgentAnswer {
            answer: "Analysis reached maximum iterations. Please try a more specific query."
                .to_string(),
            tool_calls: tool_calls_made,
        })
    }
}

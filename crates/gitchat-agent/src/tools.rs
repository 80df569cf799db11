//! The four tools offered to the model, and their JSON Schema definitions.
//!
//! Every tool returns a plain string: errors are rendered as `"Error: ..."`
//! text for the model to read and react to, never propagated as a Rust
//! error, since a bad tool call is something the model itself should
//! recover from within the loop rather than aborting it.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::process::Command;

use gitchat_llm::ToolDefinition;

use crate::path::validate_path;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_READ_CHARS: usize = 10_000;

/// The four tool definitions offered to the model, OpenAI function-calling
/// shaped.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "search_code",
            "Search for patterns in code using ripgrep. Returns matching lines with context.",
            json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "The search pattern (regex supported)"
                    },
                    "file_type": {
                        "type": "string",
                        "description": "Optional: filter by file type (python, javascript, typescript, go, rust, java)"
                    }
                },
                "required": ["pattern"]
            }),
        ),
        ToolDefinition::new(
            "read_file",
            "Read the contents of a specific file",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the file relative to repository root"
                    }
                },
                "required": ["file_path"]
            }),
        ),
        ToolDefinition::new(
            "list_directory",
            "List files and directories in a path",
            json!({
                "type": "object",
                "properties": {
                    "dir_path": {
                        "type": "string",
                        "description": "Directory path relative to repository root (use '.' for root)"
                    }
                },
                "required": ["dir_path"]
            }),
        ),
        ToolDefinition::new(
            "find_definitions",
            "Find function or class definitions matching a pattern",
            json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Name pattern to search for (partial matches work)"
                    },
                    "language": {
                        "type": "string",
                        "description": "Optional: filter by language"
                    }
                },
                "required": ["pattern"]
            }),
        ),
    ]
}

fn ripgrep_type(file_type: &str) -> &str {
    match file_type {
        "python" => "py",
        "javascript" => "js",
        "typescript" => "ts",
        "go" => "go",
        "rust" => "rust",
        "java" => "java",
        other => other,
    }
}

/// `rg --json -C 2 -m 20 <pattern>`, optionally `-t <type>`, rendered into a
/// human-readable `path\n  line: text` transcript.
pub async fn search_code(repo_path: &Path, pattern: &str, file_type: Option<&str>) -> String {
    let mut cmd = Command::new("rg");
    cmd.args(["--json", "-C", "2", "-m", "20", pattern])
        .current_dir(repo_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(file_type) = file_type {
        cmd.args(["-t", ripgrep_type(file_type)]);
    }

    let output = match tokio::time::timeout(SEARCH_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return format!("Search error: {e}"),
        Err(_) => return "Search timed out.".to_string(),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut matches = Vec::new();
    let mut current_file: Option<String> = None;

    for line in stdout.lines() {
        if line.is_empty() {
            continue;
        }
        let Ok(parsed) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if parsed.get("type").and_then(Value::as_str) != Some("match") {
            continue;
        }
        let data = &parsed["data"];
        let Some(path) = data["path"]["text"].as_str() else {
            continue;
        };
        let Some(line_number) = data["line_number"].as_u64() else {
            continue;
        };
        let text = data["lines"]["text"].as_str().unwrap_or("").trim();

        if current_file.as_deref() != Some(path) {
            current_file = Some(path.to_string());
            matches.push(format!("\n--- {path} ---"));
        }
        matches.push(format!("  {line_number}: {text}"));
    }

    if matches.is_empty() {
        "No matches found.".to_string()
    } else {
        matches.join("\n")
    }
}

/// Read a file's contents, truncated at [`MAX_READ_CHARS`].
pub fn read_file(repo_path: &Path, file_path: &str) -> String {
    let Some(full_path) = validate_path(repo_path, file_path) else {
        return format!("Error: Invalid path - {file_path}");
    };
    if !full_path.exists() {
        return format!("Error: File not found - {file_path}");
    }
    if !full_path.is_file() {
        return format!("Error: Not a file - {file_path}");
    }

    match std::fs::read(&full_path) {
        Ok(bytes) => {
            let content = String::from_utf8_lossy(&bytes);
            if content.chars().count() > MAX_READ_CHARS {
                let truncated: String = content.chars().take(MAX_READ_CHARS).collect();
                format!("{truncated}\n... (truncated)")
            } else {
                content.into_owned()
            }
        }
        Err(e) => format!("Error reading file: {e}"),
    }
}

/// List the immediate, non-hidden contents of a directory.
pub fn list_directory(repo_path: &Path, dir_path: &str) -> String {
    let Some(full_path) = validate_path(repo_path, dir_path) else {
        return format!("Error: Invalid path - {dir_path}");
    };
    if !full_path.exists() {
        return format!("Error: Directory not found - {dir_path}");
    }
    if !full_path.is_dir() {
        return format!("Error: Not a directory - {dir_path}");
    }

    let entries = match std::fs::read_dir(&full_path) {
        Ok(entries) => entries,
        Err(e) => return format!("Error listing directory: {e}"),
    };

    let mut items = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let prefix = if is_dir { "[DIR] " } else { "[FILE]" };
        items.push((name, prefix));
    }
    items.sort();

    if items.is_empty() {
        "Empty directory.".to_string()
    } else {
        items
            .into_iter()
            .map(|(name, prefix)| format!("{prefix} {name}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

const DEFINITION_PREFIXES: &[&str] = &[
    "def ",
    "class ",
    "function ",
    "const ",
    "async def ",
    "async function ",
];

/// Expand `pattern` into a family of definition-keyword searches (`def
/// foo`, `class foo`, ...) and concatenate whichever ones hit.
pub async fn find_definitions(repo_path: &Path, pattern: &str, language: Option<&str>) -> String {
    let mut results = Vec::new();
    for prefix in DEFINITION_PREFIXES {
        let search_pattern = format!("{prefix}{pattern}");
        let result = search_code(repo_path, &search_pattern, language).await;
        if result != "No matches found." {
            results.push(result);
        }
    }

    if results.is_empty() {
        format!("No definitions found for '{pattern}'.")
    } else {
        results.join("\n")
    }
}

/// Dispatch a model-requested tool call by name, returning its rendered
/// result text. An unrecognized tool name or malformed arguments are
/// reported back to the model rather than treated as a hard error.
pub async fn execute_tool(repo_path: &Path, tool_name: &str, arguments: &Value) -> String {
    match tool_name {
        "search_code" => {
            let Some(pattern) = arguments.get("pattern").and_then(Value::as_str) else {
                return "Error: missing required argument 'pattern'".to_string();
            };
            let file_type = arguments.get("file_type").and_then(Value::as_str);
            search_code(repo_path, pattern, file_type).await
        }
        "read_file" => {
            let Some(file_path) = arguments.get("file_path").and_then(Value::as_str) else {
                return "Error: missing required argument 'file_path'".to_string();
            };
            read_file(repo_path, file_path)
        }
        "list_directory" => {
            let dir_path = arguments.get("dir_path").and_then(Value::as_str).unwrap_or(".");
            list_directory(repo_path, dir_path)
        }
        "find_definitions" => {
            let Some(pattern) = arguments.get("pattern").and_then(Value::as_str) else {
                return "Error: missing required argument 'pattern'".to_string();
            };
            let language = arguments.get("language").and_then(Value::as_str);
            find_definitions(repo_path, pattern, language).await
        }
        other => format!("Unknown tool: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_file_rejects_path_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let result = read_file(tmp.path(), "../../etc/passwd");
        assert!(result.starts_with("Error: Invalid path"));
    }

    #[test]
    fn read_file_reports_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let result = read_file(tmp.path(), "nope.txt");
        assert!(result.starts_with("Error: File not found"));
    }

    #[test]
    fn read_file_truncates_long_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("big.txt");
        std::fs::write(&path, "x".repeat(MAX_READ_CHARS + 500)).unwrap();
        let result = read_file(tmp.path(), "big.txt");
        assert!(result.ends_with("... (truncated)"));
    }

    #[test]
    fn list_directory_skips_hidden_entries() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(".hidden"), "").unwrap();
        std::fs::write(tmp.path().join("visible.rs"), "").unwrap();
        let result = list_directory(tmp.path(), ".");
        assert!(result.contains("visible.rs"));
        assert!(!result.contains(".hidden"));
    }

    #[test]
    fn list_directory_reports_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(list_directory(tmp.path(), "."), "Empty directory.");
    }
}

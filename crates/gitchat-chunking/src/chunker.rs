//! Content-aware chunking for GitLab issues, merge requests, comments,
//! code files and READMEs.

use regex::Regex;

use gitchat_gitlab::{Issue, MergeRequest, Note};

use crate::error::Result;
use crate::tokenizer::Tokenizer;
use crate::types::{
    Chunk, ChunkMetadata, CodeMetadata, CommentMetadata, IssueMetadata, MergeRequestMetadata,
    ReadmeMetadata, Subtype,
};

/// Languages for which syntax-aware splitting is attempted before falling
/// back to line-window chunking.
const SYNTAX_AWARE_LANGUAGES: &[&str] = &["python", "javascript", "typescript"];

/// Number of trailing lines carried into the next window when the
/// line-based fallback chunker overflows.
const LINE_OVERLAP: usize = 5;

/// Content-aware chunking strategy, parameterized by a token budget and
/// overlap measured in the same BPE vocabulary the embedding pipeline uses.
pub struct Chunker {
    tokenizer: Tokenizer,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Ok(Self {
            tokenizer: Tokenizer::new()?,
            chunk_size,
            chunk_overlap,
        })
    }

    /// Split text on paragraph boundaries, greedily filling chunks up to
    /// `chunk_size` tokens and seeding each new chunk with an overlap tail
    /// from the previous one. Oversized paragraphs fall through to
    /// fixed-size token-window splitting.
    pub fn semantic_chunk(&self, text: &str, metadata: &ChunkMetadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let paragraphs = split_paragraphs(text);
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_tokens = 0usize;

        for para in paragraphs {
            let para_tokens = self.tokenizer.count(para);

            if para_tokens > self.chunk_size {
                if !current.is_empty() {
                    chunks.push(Chunk {
                        content: current.trim().to_string(),
                        metadata: metadata.clone(),
                        token_count: current_tokens,
                    });
                    current.clear();
                    current_tokens = 0;
                }
                chunks.extend(self.split_large_text(para, metadata));
                continue;
            }

            if current_tokens + para_tokens > self.chunk_size {
                if !current.is_empty() {
                    chunks.push(Chunk {
                        content: current.trim().to_string(),
                        metadata: metadata.clone(),
                        token_count: current_tokens,
                    });
                }
                let overlap_text = self.tokenizer.overlap_tail(&current, self.chunk_overlap);
                current = if overlap_text.is_empty() {
                    para.to_string()
                } else {
                    format!("{overlap_text}\n\n{para}")
                };
                current_tokens = self.tokenizer.count(&current);
            } else if current.is_empty() {
                current = para.to_string();
                current_tokens = para_tokens;
            } else {
                current = format!("{current}\n\n{para}");
                current_tokens += para_tokens;
            }
        }

        if !current.trim().is_empty() {
            chunks.push(Chunk {
                content: current.trim().to_string(),
                metadata: metadata.clone(),
                token_count: self.tokenizer.count(&current),
            });
        }

        chunks
    }

    /// Split text larger than `chunk_size` into fixed token windows with
    /// `chunk_overlap` tokens carried between consecutive windows.
    fn split_large_text(&self, text: &str, metadata: &ChunkMetadata) -> Vec<Chunk> {
        let tokens = self.tokenizer.encode(text);
        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < tokens.len() {
            let end = (start + self.chunk_size).min(tokens.len());
            let window = &tokens[start..end];
            chunks.push(Chunk {
                content: self.tokenizer.decode(window),
                metadata: metadata.clone(),
                token_count: window.len(),
            });
            start = if end < tokens.len() {
                end - self.chunk_overlap
            } else {
                end
            };
        }

        chunks
    }

    /// Chunk an issue: a whole metadata card, followed by a semantically
    /// chunked description.
    pub fn chunk_issue(&self, issue: &Issue, project_id: i64) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        let mut title_content = format!("Issue #{}: {}\n\n", issue.iid, issue.title);
        title_content.push_str(&format!("State: {}\n", issue.state));
        title_content.push_str(&format!("Author: {}\n", issue.author.username));
        if !issue.labels.is_empty() {
            title_content.push_str(&format!("Labels: {}\n", issue.labels.join(", ")));
        }
        if let Some(ref milestone) = issue.milestone {
            title_content.push_str(&format!("Milestone: {}\n", milestone.title));
        }
        title_content.push_str(&format!("Created: {}\n", issue.created_at));
        if let Some(ref closed_at) = issue.closed_at {
            title_content.push_str(&format!("Closed: {closed_at}\n"));
        }
        title_content.push_str(&format!("URL: {}", issue.web_url));

        let card_metadata = ChunkMetadata::Issue(IssueMetadata {
            subtype: Subtype::Metadata,
            project_id,
            issue_id: issue.id,
            issue_iid: issue.iid,
            title: issue.title.clone(),
            state: Some(issue.state.clone()),
            labels: issue.labels.clone(),
            created_at: Some(issue.created_at.clone()),
            web_url: issue.web_url.clone(),
        });
        chunks.push(Chunk {
            token_count: self.tokenizer.count(&title_content),
            content: title_content,
            metadata: card_metadata,
        });

        if let Some(ref description) = issue.description {
            if !description.trim().is_empty() {
                let desc_metadata = ChunkMetadata::Issue(IssueMetadata {
                    subtype: Subtype::Description,
                    project_id,
                    issue_id: issue.id,
                    issue_iid: issue.iid,
                    title: issue.title.clone(),
                    state: None,
                    labels: Vec::new(),
                    created_at: None,
                    web_url: issue.web_url.clone(),
                });
                chunks.extend(self.semantic_chunk(description, &desc_metadata));
            }
        }

        chunks
    }

    /// Chunk a merge request: a whole metadata card, followed by a
    /// semantically chunked description.
    pub fn chunk_merge_request(&self, mr: &MergeRequest, project_id: i64) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        let mut title_content = format!("Merge Request !{}: {}\n\n", mr.iid, mr.title);
        title_content.push_str(&format!("State: {}\n", mr.state));
        title_content.push_str(&format!("Author: {}\n", mr.author.username));
        title_content.push_str(&format!(
            "Source: {} -> {}\n",
            mr.source_branch, mr.target_branch
        ));
        if !mr.labels.is_empty() {
            title_content.push_str(&format!("Labels: {}\n", mr.labels.join(", ")));
        }
        title_content.push_str(&format!("Created: {}\n", mr.created_at));
        if let Some(ref merged_at) = mr.merged_at {
            title_content.push_str(&format!("Merged: {merged_at}\n"));
        }
        title_content.push_str(&format!("URL: {}", mr.web_url));

        let card_metadata = ChunkMetadata::MergeRequest(MergeRequestMetadata {
            subtype: Subtype::Metadata,
            project_id,
            mr_id: mr.id,
            mr_iid: mr.iid,
            title: mr.title.clone(),
            state: Some(mr.state.clone()),
            labels: mr.labels.clone(),
            source_branch: Some(mr.source_branch.clone()),
            target_branch: Some(mr.target_branch.clone()),
            created_at: Some(mr.created_at.clone()),
            web_url: mr.web_url.clone(),
        });
        chunks.push(Chunk {
            token_count: self.tokenizer.count(&title_content),
            content: title_content,
            metadata: card_metadata,
        });

        if let Some(ref description) = mr.description {
            if !description.trim().is_empty() {
                let desc_metadata = ChunkMetadata::MergeRequest(MergeRequestMetadata {
                    subtype: Subtype::Description,
                    project_id,
                    mr_id: mr.id,
                    mr_iid: mr.iid,
                    title: mr.title.clone(),
                    state: None,
                    labels: Vec::new(),
                    source_branch: None,
                    target_branch: None,
                    created_at: None,
                    web_url: mr.web_url.clone(),
                });
                chunks.extend(self.semantic_chunk(description, &desc_metadata));
            }
        }

        chunks
    }

    /// Chunk a comment/note with its parent context. System-generated
    /// notes and empty bodies produce no chunks.
    pub fn chunk_comment(
        &self,
        note: &Note,
        parent_type: &str,
        parent_iid: i64,
        project_id: i64,
    ) -> Vec<Chunk> {
        if note.system {
            return Vec::new();
        }
        let Some(ref body) = note.body else {
            return Vec::new();
        };
        if body.trim().is_empty() {
            return Vec::new();
        }

        let metadata = ChunkMetadata::Comment(CommentMetadata {
            project_id,
            parent_type: parent_type.to_string(),
            parent_iid,
            comment_id: note.id,
            author: note.author.username.clone(),
            created_at: note.created_at.clone(),
        });

        self.semantic_chunk(body, &metadata)
    }

    /// Chunk a code file: syntax-aware splitting for a handful of
    /// languages, falling back to line windows for everything else.
    pub fn chunk_code_file(&self, file_path: &str, content: &str, project_id: i64) -> Vec<Chunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let language = detect_language(file_path);

        if SYNTAX_AWARE_LANGUAGES.contains(&language) {
            let chunks = self.chunk_by_syntax(content, language, file_path, project_id);
            if !chunks.is_empty() {
                return chunks;
            }
        }

        self.chunk_by_lines(content, file_path, language, project_id)
    }

    fn chunk_by_syntax(
        &self,
        content: &str,
        language: &str,
        file_path: &str,
        project_id: i64,
    ) -> Vec<Chunk> {
        let patterns = syntax_patterns(language);
        if patterns.is_empty() {
            return Vec::new();
        }

        let lines: Vec<&str> = content.split('\n').collect();
        let mut chunks = Vec::new();
        let mut current_block: Vec<&str> = Vec::new();
        let mut current_type = "module".to_string();
        let mut block_start_line = 0usize;

        let emit_block =
            |chunks: &mut Vec<Chunk>, block: &[&str], block_type: &str, start: usize, end: usize| {
                let block_content = block.join("\n");
                if block_content.trim().is_empty() {
                    return;
                }
                let metadata = ChunkMetadata::Code(CodeMetadata {
                    project_id,
                    file_path: file_path.to_string(),
                    language: language.to_string(),
                    block_type: Some(block_type.to_string()),
                    start_line: start as u32 + 1,
                    end_line: end as u32,
                });
                chunks.extend(self.semantic_chunk(&block_content, &metadata));
            };

        for (i, line) in lines.iter().enumerate() {
            let matched_type = patterns
                .iter()
                .find(|(re, _)| re.is_match(line.trim_start()))
                .map(|(_, block_type)| *block_type);

            if let Some(block_type) = matched_type {
                if !current_block.is_empty() {
                    emit_block(&mut chunks, &current_block, &current_type, block_start_line, i);
                }
                current_block = vec![*line];
                current_type = block_type.to_string();
                block_start_line = i;
            } else {
                current_block.push(line);
            }
        }

        if !current_block.is_empty() {
            emit_block(
                &mut chunks,
                &current_block,
                &current_type,
                block_start_line,
                lines.len(),
            );
        }

        chunks
    }

    fn chunk_by_lines(
        &self,
        content: &str,
        file_path: &str,
        language: &str,
        project_id: i64,
    ) -> Vec<Chunk> {
        let lines: Vec<&str> = content.split('\n').collect();
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_tokens = 0usize;
        let mut start_line = 0usize;

        let make_metadata = |start: usize, end: usize| {
            ChunkMetadata::Code(CodeMetadata {
                project_id,
                file_path: file_path.to_string(),
                language: language.to_string(),
                block_type: None,
                start_line: start as u32 + 1,
                end_line: end as u32,
            })
        };

        for (i, line) in lines.iter().enumerate() {
            let line_tokens = self.tokenizer.count(&format!("{line}\n"));

            if current_tokens + line_tokens > self.chunk_size && !current.is_empty() {
                chunks.push(Chunk {
                    content: current.join("\n"),
                    metadata: make_metadata(start_line, i),
                    token_count: current_tokens,
                });

                let overlap_start = current.len().saturating_sub(LINE_OVERLAP);
                let overlap: Vec<&str> = if current.len() > LINE_OVERLAP {
                    current[overlap_start..].to_vec()
                } else {
                    Vec::new()
                };
                let overlap_len = overlap.len();
                let mut next = overlap;
                next.push(line);
                start_line = i - overlap_len;
                current_tokens = self.tokenizer.count(&next.join("\n"));
                current = next;
            } else {
                current.push(line);
                current_tokens += line_tokens;
            }
        }

        if !current.is_empty() {
            let token_count = self.tokenizer.count(&current.join("\n"));
            chunks.push(Chunk {
                content: current.join("\n"),
                metadata: make_metadata(start_line, lines.len()),
                token_count,
            });
        }

        chunks
    }

    /// Chunk a README, prepending a project-context preamble before
    /// semantic chunking the whole document.
    pub fn chunk_readme(
        &self,
        content: &str,
        project_id: i64,
        project_name: &str,
        web_url: &str,
    ) -> Vec<Chunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let header = format!("# Project README: {project_name}\n\nURL: {web_url}\n\n---\n\n");
        let full_text = format!("{header}{content}");

        let metadata = ChunkMetadata::Readme(ReadmeMetadata {
            project_id,
            project_name: project_name.to_string(),
            web_url: web_url.to_string(),
            file_path: "README.md".to_string(),
        });

        self.semantic_chunk(&full_text, &metadata)
    }
}

/// Split on blank-line paragraph boundaries, discarding empty paragraphs.
fn split_paragraphs(text: &str) -> Vec<&str> {
    let re = blank_line_re();
    re.split(text)
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect()
}

fn blank_line_re() -> &'static Regex {
    use std::sync::OnceLock;
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").unwrap())
}

/// Detect a language tag from a file's extension. `"unknown"` when no
/// mapping applies.
pub fn detect_language(file_path: &str) -> &'static str {
    let lower = file_path.to_lowercase();
    let map: &[(&str, &str)] = &[
        (".py", "python"),
        (".js", "javascript"),
        (".jsx", "javascript"),
        (".ts", "typescript"),
        (".tsx", "typescript"),
        (".java", "java"),
        (".go", "go"),
        (".rs", "rust"),
        (".rb", "ruby"),
        (".php", "php"),
        (".c", "c"),
        (".cpp", "cpp"),
        (".h", "c"),
        (".hpp", "cpp"),
        (".cs", "csharp"),
        (".swift", "swift"),
        (".kt", "kotlin"),
        (".scala", "scala"),
        (".vue", "vue"),
        (".svelte", "svelte"),
        (".md", "markdown"),
        (".json", "json"),
        (".yaml", "yaml"),
        (".yml", "yaml"),
        (".toml", "toml"),
        (".xml", "xml"),
        (".html", "html"),
        (".css", "css"),
        (".scss", "scss"),
        (".sql", "sql"),
        (".sh", "bash"),
        (".bash", "bash"),
        (".zsh", "zsh"),
    ];
    for (ext, lang) in map {
        if lower.ends_with(ext) {
            return lang;
        }
    }
    "unknown"
}

fn syntax_patterns(language: &str) -> Vec<(Regex, &'static str)> {
    match language {
        "python" => vec![
            (Regex::new(r"^class\s+\w+").unwrap(), "class"),
            (Regex::new(r"^async\s+def\s+\w+").unwrap(), "async_function"),
            (Regex::new(r"^def\s+\w+").unwrap(), "function"),
        ],
        "javascript" | "typescript" => vec![
            (Regex::new(r"^class\s+\w+").unwrap(), "class"),
            (
                Regex::new(r"^export\s+(default\s+)?(async\s+)?function").unwrap(),
                "function",
            ),
            (Regex::new(r"^function\s+\w+").unwrap(), "function"),
            (
                Regex::new(r"^const\s+\w+\s*=\s*(async\s*)?\(").unwrap(),
                "arrow_function",
            ),
        ],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitchat_gitlab::UserRef;

    fn chunker() -> Chunker {
        Chunker::new(512, 50).unwrap()
    }

    fn make_issue() -> Issue {
        Issue {
            id: 1,
            iid: 7,
            title: "Login fails".to_string(),
            state: "opened".to_string(),
            description: Some("Step 1\n\nStep 2\n\nStep 3".to_string()),
            labels: vec!["bug".to_string()],
            author: UserRef {
                username: "alice".to_string(),
            },
            milestone: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
            closed_at: None,
            web_url: "https://gitlab.example.com/g/p/-/issues/7".to_string(),
        }
    }

    #[test]
    fn chunk_issue_emits_metadata_card_then_description() {
        let c = chunker();
        let issue = make_issue();
        let chunks = c.chunk_issue(&issue, 100);

        assert_eq!(chunks.len(), 2);
        match &chunks[0].metadata {
            ChunkMetadata::Issue(m) => {
                assert_eq!(m.subtype, Subtype::Metadata);
                assert_eq!(m.issue_iid, 7);
            }
            _ => panic!("expected issue metadata"),
        }
        assert!(chunks[0].content.starts_with("Issue #7: Login fails"));
        match &chunks[1].metadata {
            ChunkMetadata::Issue(m) => assert_eq!(m.subtype, Subtype::Description),
            _ => panic!("expected issue metadata"),
        }
    }

    #[test]
    fn chunk_issue_without_description_is_metadata_only() {
        let c = chunker();
        let mut issue = make_issue();
        issue.description = None;
        let chunks = c.chunk_issue(&issue, 100);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn chunk_comment_skips_system_notes() {
        let c = chunker();
        let note = Note {
            id: 1,
            body: Some("auto-closed".to_string()),
            author: UserRef {
                username: "bot".to_string(),
            },
            created_at: "2024-01-01T00:00:00Z".to_string(),
            system: true,
        };
        assert!(c.chunk_comment(&note, "issue", 7, 100).is_empty());
    }

    #[test]
    fn chunk_comment_skips_empty_body() {
        let c = chunker();
        let note = Note {
            id: 1,
            body: Some("   ".to_string()),
            author: UserRef {
                username: "alice".to_string(),
            },
            created_at: "2024-01-01T00:00:00Z".to_string(),
            system: false,
        };
        assert!(c.chunk_comment(&note, "issue", 7, 100).is_empty());
    }

    #[test]
    fn chunk_comment_tags_parent_context() {
        let c = chunker();
        let note = Note {
            id: 42,
            body: Some("Looks good to me".to_string()),
            author: UserRef {
                username: "bob".to_string(),
            },
            created_at: "2024-01-02T00:00:00Z".to_string(),
            system: false,
        };
        let chunks = c.chunk_comment(&note, "merge_request", 3, 100);
        assert_eq!(chunks.len(), 1);
        match &chunks[0].metadata {
            ChunkMetadata::Comment(m) => {
                assert_eq!(m.parent_type, "merge_request");
                assert_eq!(m.parent_iid, 3);
                assert_eq!(m.comment_id, 42);
            }
            _ => panic!("expected comment metadata"),
        }
    }

    #[test]
    fn all_chunk_token_counts_respect_budget() {
        let c = Chunker::new(20, 5).unwrap();
        let text = (0..50)
            .map(|i| format!("paragraph number {i} with a little bit of extra text in it"))
            .collect::<Vec<_>>()
            .join("\n\n");
        let metadata = ChunkMetadata::Readme(ReadmeMetadata {
            project_id: 1,
            project_name: "demo".to_string(),
            web_url: "https://example.com".to_string(),
            file_path: "README.md".to_string(),
        });
        let chunks = c.semantic_chunk(&text, &metadata);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.token_count <= 20 + 5, "chunk exceeded budget with overlap slack");
        }
    }

    #[test]
    fn detect_language_by_extension() {
        assert_eq!(detect_language("src/main.rs"), "rust");
        assert_eq!(detect_language("lib/app.py"), "python");
        assert_eq!(detect_language("README"), "unknown");
    }

    #[test]
    fn chunk_code_file_python_splits_on_def() {
        let c = chunker();
        let content = "import os\n\ndef foo():\n    return 1\n\n\ndef bar():\n    return 2\n";
        let chunks = c.chunk_code_file("pkg/mod.py", content, 1);
        assert!(chunks.len() >= 2);
        let block_types: Vec<_> = chunks
            .iter()
            .filter_map(|ch| match &ch.metadata {
                ChunkMetadata::Code(m) => m.block_type.clone(),
                _ => None,
            })
            .collect();
        assert!(block_types.contains(&"function".to_string()));
    }

    #[test]
    fn chunk_code_file_unknown_language_uses_line_fallback() {
        let c = chunker();
        let content = (0..200)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = c.chunk_code_file("data/file.bin.txt", &content, 1);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            match &chunk.metadata {
                ChunkMetadata::Code(m) => assert!(m.block_type.is_none()),
                _ => panic!("expected code metadata"),
            }
        }
    }

    #[test]
    fn chunk_code_file_empty_content_is_empty() {
        let c = chunker();
        assert!(c.chunk_code_file("empty.py", "   \n  ", 1).is_empty());
    }

    #[test]
    fn chunk_readme_prepends_preamble() {
        let c = chunker();
        let chunks = c.chunk_readme("Install with cargo.", 1, "demo", "https://example.com");
        assert!(!chunks.is_empty());
        assert!(chunks[0].content.contains("Project README: demo"));
        assert!(chunks[0].content.contains("Install with cargo."));
    }
}

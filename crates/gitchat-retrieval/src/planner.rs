//! Query planner (C6): turns a natural-language query into a [`SearchPlan`]
//! using an LLM constrained to a JSON-only response.
//!
//! Grounded in the original filter-extraction prompt: one LLM call, asked
//! for a fixed JSON shape, with graceful degradation to an unfiltered
//! vector search whenever the model's output can't be parsed.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use gitchat_llm::{ChatProvider, ChatRequest, Message};

use crate::types::{ApiParams, DateFilter, QueryKind, SearchPlan, Strategy, SubQuery};

/// Lexical trigger set for routing a code-flavored query to `CODE_DEEP`.
const CODE_KEYWORDS: &[&str] = &[
    "code",
    "function",
    "class",
    "method",
    "implementation",
    "file",
    "module",
    "import",
    "api",
    "endpoint",
    "handler",
    "component",
    "hook",
    "variable",
    "constant",
];

fn has_code_keyword(query: &str) -> bool {
    let lower = query.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| CODE_KEYWORDS.contains(&word))
}

/// The raw shape the planner asks the LLM to emit. All fields are
/// optional; a field the model omits is treated as "not mentioned" rather
/// than an error.
#[derive(Debug, Default, Deserialize)]
struct RawFilters {
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    search_terms: Option<String>,
    #[serde(default)]
    date_filter: Option<DateFilter>,
    #[serde(default)]
    content_types: Vec<String>,
    #[serde(default)]
    issue_iid: Option<i64>,
    #[serde(default)]
    mr_iid: Option<i64>,
    #[serde(default)]
    needs_api_query: bool,
}

fn build_prompt(query: &str) -> String {
    format!(
        "You are a query analyzer for a GitLab content search system. Extract \
         structured filters from the user's query and return ONLY a JSON object, \
         no prose, no code fences.\n\n\
         Recognized fields (all optional):\n\
         - labels: array of label names mentioned\n\
         - state: \"opened\", \"closed\", \"merged\", or \"all\"\n\
         - search_terms: key terms for text matching\n\
         - date_filter: {{\"after\": ISO date, \"before\": ISO date}}\n\
         - content_types: array drawn from \"issue\", \"merge_request\", \"code\", \"comment\"\n\
         - issue_iid: a specific issue number if one is mentioned\n\
         - mr_iid: a specific merge request number if one is mentioned\n\
         - needs_api_query: true if the query needs data fresher than the vector index\n\n\
         Query: \"{query}\"\n\
         JSON:"
    )
}

/// Produces a [`SearchPlan`] for a query by asking an LLM to extract
/// structured filters, then mapping those filters onto sub-queries and a
/// strategy.
pub struct QueryPlanner {
    llm: Arc<dyn ChatProvider>,
}

impl QueryPlanner {
    pub fn new(llm: Arc<dyn ChatProvider>) -> Self {
        Self { llm }
    }

    /// Plan a query. Never fails: any LLM error or malformed JSON output
    /// degrades to an unfiltered vector-only plan rather than surfacing an
    /// error to the caller.
    pub async fn plan(&self, query: &str) -> SearchPlan {
        let request = ChatRequest::new(vec![Message::user(build_prompt(query))])
            .with_json_response()
            .with_temperature(0.0);

        let response = match self.llm.chat(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("query planner LLM call failed, degrading to vector-only: {e}");
                return SearchPlan::vector_only(query);
            }
        };

        let content = response.content.unwrap_or_default();
        let filters: RawFilters = match serde_json::from_str(content.trim()) {
            Ok(filters) => filters,
            Err(e) => {
                debug!("query planner JSON did not parse ({e}), degrading to vector-only");
                return SearchPlan::vector_only(query);
            }
        };

        Self::build_plan(query, filters)
    }

    fn build_plan(query: &str, filters: RawFilters) -> SearchPlan {
        let content_types = filters.content_types.clone();

        if filters.issue_iid.is_some() || filters.mr_iid.is_some() {
            let mut sub_queries = Vec::new();
            if let Some(issue_iid) = filters.issue_iid {
                sub_queries.push(SubQuery {
                    kind: QueryKind::Api,
                    query_text: query.to_string(),
                    params: ApiParams {
                        issue_iid: Some(issue_iid),
                        ..Default::default()
                    },
                    priority: 10,
                    content_types: vec!["issue".to_string()],
                });
            }
            if let Some(mr_iid) = filters.mr_iid {
                sub_queries.push(SubQuery {
                    kind: QueryKind::Api,
                    query_text: query.to_string(),
                    params: ApiParams {
                        mr_iid: Some(mr_iid),
                        ..Default::default()
                    },
                    priority: 10,
                    content_types: vec!["merge_request".to_string()],
                });
            }
            return SearchPlan {
                original_query: query.to_string(),
                strategy: Strategy::ApiFirst,
                sub_queries,
                content_priority: content_types,
            };
        }

        if content_types.iter().any(|t| t == "code") && has_code_keyword(query) {
            let sub_queries = vec![SubQuery {
                kind: QueryKind::Vector,
                query_text: query.to_string(),
                params: ApiParams::default(),
                priority: 5,
                content_types: content_types.clone(),
            }];
            return SearchPlan {
                original_query: query.to_string(),
                strategy: Strategy::CodeDeep,
                sub_queries,
                content_priority: content_types,
            };
        }

        let has_filters = !filters.labels.is_empty()
            || filters.state.is_some()
            || filters.search_terms.is_some()
            || filters.date_filter.is_some();

        let mut sub_queries = vec![SubQuery {
            kind: QueryKind::Vector,
            query_text: query.to_string(),
            params: ApiParams::default(),
            priority: 5,
            content_types: content_types.clone(),
        }];

        if has_filters || filters.needs_api_query {
            sub_queries.push(SubQuery {
                kind: QueryKind::Api,
                query_text: query.to_string(),
                params: ApiParams {
                    labels: filters.labels,
                    state: filters.state,
                    search_terms: filters.search_terms,
                    date_filter: filters.date_filter,
                    issue_iid: None,
                    mr_iid: None,
                },
                priority: 8,
                content_types: content_types.clone(),
            });
        }

        SearchPlan {
            original_query: query.to_string(),
            strategy: Strategy::Parallel,
            sub_queries,
            content_priority: content_types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gitchat_llm::{ChatResponse, Result as LlmResult};
    use std::sync::Mutex;

    struct StubLlm {
        response: Mutex<Option<String>>,
    }

    impl StubLlm {
        fn returning(content: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Some(content.to_string())),
            })
        }
    }

    #[async_trait]
    impl ChatProvider for StubLlm {
        async fn chat(&self, _request: ChatRequest) -> LlmResult<ChatResponse> {
            let content = self.response.lock().unwrap().clone();
            Ok(ChatResponse {
                content,
                tool_calls: Vec::new(),
                finish_reason: "stop".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn plan_degrades_to_vector_only_on_malformed_json() {
        let planner = QueryPlanner::new(StubLlm::returning("not json at all"));
        let plan = planner.plan("how does auth work").await;
        assert_eq!(plan.strategy, Strategy::VectorOnly);
        assert_eq!(plan.sub_queries.len(), 1);
        assert_eq!(plan.sub_queries[0].kind, QueryKind::Vector);
    }

    #[tokio::test]
    async fn plan_api_first_for_issue_iid() {
        let planner = QueryPlanner::new(StubLlm::returning(
            r#"{"issue_iid": 123, "content_types": ["issue"]}"#,
        ));
        let plan = planner.plan("what is issue #123 about?").await;
        assert_eq!(plan.strategy, Strategy::ApiFirst);
        assert_eq!(plan.sub_queries.len(), 1);
        assert_eq!(plan.sub_queries[0].params.issue_iid, Some(123));
    }

    #[test]
    fn build_plan_code_deep_for_code_keyword_query() {
        let filters = RawFilters {
            content_types: vec!["code".to_string()],
            ..Default::default()
        };
        let plan = QueryPlanner::build_plan("code that handles authentication", filters);
        assert_eq!(plan.strategy, Strategy::CodeDeep);
    }

    #[test]
    fn build_plan_parallel_with_api_subquery_when_labels_present() {
        let filters = RawFilters {
            labels: vec!["bug".to_string()],
            content_types: vec!["issue".to_string()],
            ..Default::default()
        };
        let plan = QueryPlanner::build_plan("issues labeled bug", filters);
        assert_eq!(plan.strategy, Strategy::Parallel);
        assert_eq!(plan.sub_queries.len(), 2);
        assert!(plan.sub_queries.iter().any(|sq| sq.kind == QueryKind::Api));
    }

    #[test]
    fn build_plan_vector_only_shape_when_no_filters() {
        let plan = QueryPlanner::build_plan("recent merge requests", RawFilters::default());
        assert_eq!(plan.strategy, Strategy::Parallel);
        assert_eq!(plan.sub_queries.len(), 1);
    }

    #[test]
    fn code_keyword_detection_matches_whole_words_only() {
        assert!(has_code_keyword("the function signature changed"));
        assert!(!has_code_keyword("functional programming style"));
    }
}

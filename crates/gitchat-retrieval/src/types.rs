//! Search plan types shared by the query planner and the hybrid retriever.

use serde::{Deserialize, Serialize};

/// Execution strategy chosen by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Parallel,
    ApiFirst,
    VectorFirst,
    ApiOnly,
    VectorOnly,
    CodeDeep,
}

/// What kind of work a sub-query represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Vector,
    Api,
    CodeAnalysis,
}

/// A date range extracted from a natural-language query. Both ends are
/// left as opaque strings; the planner does not attempt to parse dates,
/// it only passes through what the LLM extracted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFilter {
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
}

/// Filter parameters an API sub-query runs with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiParams {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub search_terms: Option<String>,
    #[serde(default)]
    pub date_filter: Option<DateFilter>,
    #[serde(default)]
    pub issue_iid: Option<i64>,
    #[serde(default)]
    pub mr_iid: Option<i64>,
}

/// A single unit of retrieval work within a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubQuery {
    pub kind: QueryKind,
    pub query_text: String,
    #[serde(default)]
    pub params: ApiParams,
    pub priority: u8,
    #[serde(default)]
    pub content_types: Vec<String>,
}

/// The planner's output: how to answer one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPlan {
    pub original_query: String,
    pub strategy: Strategy,
    pub sub_queries: Vec<SubQuery>,
    /// Ordered content types whose scores get a priority boost during
    /// fusion. Earlier entries are boosted more.
    #[serde(default)]
    pub content_priority: Vec<String>,
}

impl SearchPlan {
    /// The degraded plan used when the planner's LLM output can't be
    /// parsed as JSON: a single unfiltered vector sub-query.
    pub fn vector_only(original_query: impl Into<String>) -> Self {
        let original_query = original_query.into();
        Self {
            sub_queries: vec![SubQuery {
                kind: QueryKind::Vector,
                query_text: original_query.clone(),
                params: ApiParams::default(),
                priority: 0,
                content_types: Vec::new(),
            }],
            original_query,
            strategy: Strategy::VectorOnly,
            content_priority: Vec::new(),
        }
    }
}

/// One retrieved record, from either the vector store or the GitLab API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalRecord {
    pub id: String,
    pub score: f32,
    pub content: String,
    pub content_type: String,
    pub metadata: serde_json::Value,
}

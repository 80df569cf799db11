//! Hybrid retriever (C7): executes a [`SearchPlan`] against the vector
//! store and the GitLab API, fuses the results and returns a ranked,
//! deduplicated list of records.
//!
//! Grounded in the teacher's `HybridSearcher` for the fan-out/fuse/dedup
//! shape, adapted from two Qdrant collections with RRF fusion to a single
//! `gitlab_content` collection with content-priority re-weighting.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use gitchat_gitlab::{GitlabClient, Issue, MergeRequest};
use gitchat_search::{EmbeddingProvider, QdrantStore, SearchHit};

use crate::error::{RetrievalError, Result};
use crate::types::{ApiParams, QueryKind, RetrievalRecord, SearchPlan, Strategy, SubQuery};

/// API sub-queries fan out across at most this many projects.
const MAX_API_PROJECTS: usize = 3;

/// Hybrid retriever combining vector search over `gitlab_content` with
/// direct GitLab API lookups.
pub struct HybridRetriever {
    store: Arc<QdrantStore>,
    embeddings: Arc<dyn EmbeddingProvider>,
    gitlab: Arc<GitlabClient>,
    collection_name: String,
}

impl HybridRetriever {
    pub fn new(
        store: Arc<QdrantStore>,
        embeddings: Arc<dyn EmbeddingProvider>,
        gitlab: Arc<GitlabClient>,
    ) -> Self {
        Self {
            store,
            embeddings,
            gitlab,
            collection_name: gitchat_search::COLLECTION_NAME.to_string(),
        }
    }

    /// Execute a plan and return ranked, deduplicated records, truncated to
    /// `top_k`. Individual sub-query failures are logged and skipped
    /// rather than failing the whole retrieval.
    pub async fn retrieve(
        &self,
        plan: &SearchPlan,
        project_ids: &[i64],
        top_k: usize,
    ) -> Vec<RetrievalRecord> {
        let vector_sqs: Vec<&SubQuery> = plan
            .sub_queries
            .iter()
            .filter(|sq| sq.kind == QueryKind::Vector)
            .collect();
        let api_sqs: Vec<&SubQuery> = plan
            .sub_queries
            .iter()
            .filter(|sq| sq.kind == QueryKind::Api)
            .collect();
        let pool = (top_k as u64).max(1);

        let mut records = match plan.strategy {
            Strategy::ApiOnly => self.run_api(&api_sqs, project_ids).await,
            Strategy::VectorOnly => self.run_vector(&vector_sqs, project_ids, pool).await,
            Strategy::ApiFirst => {
                let mut records = self.run_api(&api_sqs, project_ids).await;
                if records.len() < top_k {
                    records.extend(self.run_vector(&vector_sqs, project_ids, pool).await);
                }
                records
            }
            Strategy::VectorFirst => {
                let mut records = self.run_vector(&vector_sqs, project_ids, pool).await;
                if records.len() < top_k / 2 {
                    records.extend(self.run_api(&api_sqs, project_ids).await);
                }
                records
            }
            // CODE_DEEP retrieves the same way as PARALLEL; the caller
            // decides separately whether to also invoke the code analysis
            // agent for a deeper, file-level answer.
            Strategy::Parallel | Strategy::CodeDeep => {
                let (vector_records, api_records) = tokio::join!(
                    self.run_vector(&vector_sqs, project_ids, pool),
                    self.run_api(&api_sqs, project_ids),
                );
                let mut records = vector_records;
                records.extend(api_records);
                records
            }
        };

        apply_content_priority(&mut records, &plan.content_priority);
        dedupe_and_rank(records, top_k)
    }

    async fn run_vector(
        &self,
        sub_queries: &[&SubQuery],
        project_ids: &[i64],
        limit: u64,
    ) -> Vec<RetrievalRecord> {
        let futs = sub_queries
            .iter()
            .map(|sq| self.vector_search(&sq.query_text, project_ids, &sq.content_types, limit));
        let results = futures::future::join_all(futs).await;

        results
            .into_iter()
            .filter_map(|r| match r {
                Ok(records) => Some(records),
                Err(e) => {
                    warn!("vector sub-query failed: {e}");
                    None
                }
            })
            .flatten()
            .collect()
    }

    async fn vector_search(
        &self,
        query_text: &str,
        project_ids: &[i64],
        content_types: &[String],
        limit: u64,
    ) -> Result<Vec<RetrievalRecord>> {
        let vector = self
            .embeddings
            .embed(vec![query_text.to_string()])
            .await
            .map_err(RetrievalError::Search)?
            .into_iter()
            .next()
            .unwrap_or_default();

        let type_refs: Vec<&str> = content_types.iter().map(|s| s.as_str()).collect();
        let type_filter = if type_refs.is_empty() {
            None
        } else {
            Some(type_refs.as_slice())
        };

        let scopes: Vec<Option<i64>> = if project_ids.is_empty() {
            vec![None]
        } else {
            project_ids.iter().map(|id| Some(*id)).collect()
        };

        let mut records = Vec::new();
        for scope in scopes {
            let hits = self
                .store
                .search(&self.collection_name, vector.clone(), limit, scope, type_filter)
                .await
                .map_err(RetrievalError::Search)?;
            records.extend(hits.into_iter().map(hit_to_record));
        }
        Ok(records)
    }

    async fn run_api(
        &self,
        sub_queries: &[&SubQuery],
        project_ids: &[i64],
    ) -> Vec<RetrievalRecord> {
        let mut records = Vec::new();

        for &project_id in project_ids.iter().take(MAX_API_PROJECTS) {
            for sq in sub_queries {
                if let Some(issue_iid) = sq.params.issue_iid {
                    match self.gitlab.get_issue(project_id, issue_iid).await {
                        Ok(issue) => records.push(issue_record(project_id, &issue)),
                        Err(e) => warn!(
                            "api sub-query get_issue({project_id}, {issue_iid}) failed: {e}"
                        ),
                    }
                }

                if let Some(mr_iid) = sq.params.mr_iid {
                    match self.gitlab.get_merge_request(project_id, mr_iid).await {
                        Ok(mr) => records.push(mr_record(project_id, &mr)),
                        Err(e) => warn!(
                            "api sub-query get_merge_request({project_id}, {mr_iid}) failed: {e}"
                        ),
                    }
                }

                let wants_issue_search = sq.params.issue_iid.is_none()
                    && sq.params.mr_iid.is_none()
                    && (!sq.params.labels.is_empty()
                        || sq.params.search_terms.is_some()
                        || sq.params.state.is_some());

                if wants_issue_search {
                    match self.gitlab.get_all_issues(project_id).await {
                        Ok(issues) => {
                            records.extend(
                                filter_issues(issues, &sq.params)
                                    .into_iter()
                                    .take(5)
                                    .map(|issue| issue_record(project_id, &issue)),
                            );
                        }
                        Err(e) => {
                            warn!("api sub-query list issues for project {project_id} failed: {e}")
                        }
                    }
                }
            }
        }

        records
    }
}

fn filter_issues(issues: Vec<Issue>, params: &ApiParams) -> Vec<Issue> {
    issues
        .into_iter()
        .filter(|issue| {
            if !params.labels.is_empty() && !params.labels.iter().any(|l| issue.labels.contains(l))
            {
                return false;
            }
            if let Some(state) = &params.state {
                if state != "all" && &issue.state != state {
                    return false;
                }
            }
            if let Some(terms) = &params.search_terms {
                let haystack = format!(
                    "{} {}",
                    issue.title,
                    issue.description.as_deref().unwrap_or("")
                )
                .to_lowercase();
                if !haystack.contains(&terms.to_lowercase()) {
                    return false;
                }
            }
            true
        })
        .collect()
}

fn issue_record(project_id: i64, issue: &Issue) -> RetrievalRecord {
    let mut content = format!("Issue #{}: {}\n\n", issue.iid, issue.title);
    if let Some(description) = &issue.description {
        content.push_str(description);
    }

    RetrievalRecord {
        id: format!("api_issue_{project_id}_{}", issue.id),
        score: 1.0,
        content,
        content_type: "issue".to_string(),
        metadata: serde_json::json!({
            "project_id": project_id,
            "issue_id": issue.id,
            "issue_iid": issue.iid,
            "title": issue.title,
            "state": issue.state,
            "labels": issue.labels,
            "web_url": issue.web_url,
            "source": "api",
        }),
    }
}

fn mr_record(project_id: i64, mr: &MergeRequest) -> RetrievalRecord {
    let mut content = format!("Merge Request !{}: {}\n\n", mr.iid, mr.title);
    if let Some(description) = &mr.description {
        content.push_str(description);
    }

    RetrievalRecord {
        id: format!("api_mr_{project_id}_{}", mr.id),
        score: 1.0,
        content,
        content_type: "merge_request".to_string(),
        metadata: serde_json::json!({
            "project_id": project_id,
            "mr_id": mr.id,
            "mr_iid": mr.iid,
            "title": mr.title,
            "state": mr.state,
            "labels": mr.labels,
            "web_url": mr.web_url,
            "source": "api",
        }),
    }
}

fn hit_to_record(hit: SearchHit) -> RetrievalRecord {
    let content_type = hit.item_type().unwrap_or_default();

    let mut metadata = serde_json::json!({
        "project_id": hit.project_id(),
        "type": content_type,
        "token_count": hit.token_count(),
        "source": "vector",
    });

    if let Some(map) = metadata.as_object_mut() {
        if let Some(file_path) = hit.get_string("file_path") {
            map.insert("file_path".to_string(), serde_json::Value::String(file_path));
        }
        if let Some(start_line) = hit.get_i64("start_line") {
            map.insert("start_line".to_string(), serde_json::json!(start_line));
        }
        if let Some(issue_iid) = hit.get_i64("issue_iid") {
            map.insert("issue_iid".to_string(), serde_json::json!(issue_iid));
        }
        if let Some(mr_iid) = hit.get_i64("mr_iid") {
            map.insert("mr_iid".to_string(), serde_json::json!(mr_iid));
        }
        if let Some(comment_id) = hit.get_i64("comment_id") {
            map.insert("comment_id".to_string(), serde_json::json!(comment_id));
        }
    }

    RetrievalRecord {
        id: hit.id.to_string(),
        score: hit.score,
        content: hit.content().unwrap_or_default(),
        content_type,
        metadata,
    }
}

/// Multiply each record's score by `1.0 + 0.1 * (len(priority) - index)`
/// for its content type's position in the priority list; records whose
/// type isn't listed are left unchanged.
fn apply_content_priority(records: &mut [RetrievalRecord], priority: &[String]) {
    for record in records.iter_mut() {
        if let Some(index) = priority.iter().position(|t| t == &record.content_type) {
            let multiplier = 1.0 + 0.1 * (priority.len() as f32 - index as f32);
            record.score *= multiplier;
        }
    }
}

fn meta_i64(record: &RetrievalRecord, key: &str) -> String {
    record
        .metadata
        .get(key)
        .and_then(|v| v.as_i64())
        .map(|v| v.to_string())
        .unwrap_or_default()
}

fn meta_str(record: &RetrievalRecord, key: &str) -> String {
    record
        .metadata
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

fn dedup_key(record: &RetrievalRecord, index: usize) -> String {
    match record.content_type.as_str() {
        "issue" => format!(
            "issue_{}_{}",
            meta_i64(record, "project_id"),
            meta_i64(record, "issue_iid")
        ),
        "merge_request" => format!(
            "mr_{}_{}",
            meta_i64(record, "project_id"),
            meta_i64(record, "mr_iid")
        ),
        "code" => format!(
            "code_{}_{}_{}",
            meta_i64(record, "project_id"),
            meta_str(record, "file_path"),
            meta_i64(record, "start_line")
        ),
        "comment" => format!("comment_{}", meta_i64(record, "comment_id")),
        _ if !record.id.is_empty() => record.id.clone(),
        _ => index.to_string(),
    }
}

/// Sort by score descending, keep the first (highest-scoring) record per
/// dedup key, then truncate to `top_k`.
fn dedupe_and_rank(mut records: Vec<RetrievalRecord>, top_k: usize) -> Vec<RetrievalRecord> {
    records.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        let key = dedup_key(&record, index);
        if seen.insert(key) {
            out.push(record);
            if out.len() >= top_k {
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content_type: &str, score: f32, metadata: serde_json::Value) -> RetrievalRecord {
        RetrievalRecord {
            id: format!("{content_type}-{score}"),
            score,
            content: String::new(),
            content_type: content_type.to_string(),
            metadata,
        }
    }

    #[test]
    fn content_priority_boosts_earlier_listed_types_more() {
        let mut records = vec![
            record("issue", 0.5, serde_json::json!({})),
            record("code", 0.5, serde_json::json!({})),
        ];
        apply_content_priority(&mut records, &["issue".to_string(), "code".to_string()]);
        // issue is index 0 of 2 -> multiplier 1.2; code is index 1 -> multiplier 1.1
        assert!((records[0].score - 0.6).abs() < 1e-6);
        assert!((records[1].score - 0.55).abs() < 1e-6);
    }

    #[test]
    fn dedup_keeps_highest_scoring_duplicate() {
        let records = vec![
            record(
                "issue",
                0.4,
                serde_json::json!({"project_id": 1, "issue_iid": 7}),
            ),
            record(
                "issue",
                0.9,
                serde_json::json!({"project_id": 1, "issue_iid": 7}),
            ),
        ];
        let out = dedupe_and_rank(records, 10);
        assert_eq!(out.len(), 1);
        assert!((out[0].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn dedup_truncates_to_top_k() {
        let records = (0..5)
            .map(|i| record("comment", i as f32, serde_json::json!({"comment_id": i})))
            .collect();
        let out = dedupe_and_rank(records, 2);
        assert_eq!(out.len(), 2);
        assert!((out[0].score - 4.0).abs() < 1e-6);
        assert!((out[1].score - 3.0).abs() < 1e-6);
    }

    #[test]
    fn filter_issues_matches_labels_and_state() {
        let issues = vec![
            Issue {
                id: 1,
                iid: 1,
                title: "a".to_string(),
                state: "opened".to_string(),
                description: None,
                labels: vec!["bug".to_string()],
                author: gitchat_gitlab::UserRef {
                    username: "alice".to_string(),
                },
                milestone: None,
                created_at: "2024-01-01T00:00:00Z".to_string(),
                updated_at: "2024-01-01T00:00:00Z".to_string(),
                closed_at: None,
                web_url: "https://example.com/1".to_string(),
            },
            Issue {
                id: 2,
                iid: 2,
                title: "b".to_string(),
                state: "closed".to_string(),
                description: None,
                labels: vec!["feature".to_string()],
                author: gitchat_gitlab::UserRef {
                    username: "bob".to_string(),
                },
                milestone: None,
                created_at: "2024-01-01T00:00:00Z".to_string(),
                updated_at: "2024-01-01T00:00:00Z".to_string(),
                closed_at: None,
                web_url: "https://example.com/2".to_string(),
            },
        ];
        let params = ApiParams {
            labels: vec!["bug".to_string()],
            ..Default::default()
        };
        let filtered = filter_issues(issues, &params);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, 1);
    }
}

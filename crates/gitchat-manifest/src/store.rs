//! SQLite-backed manifest store: CRUD over `projects` and `indexed_items`.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{ManifestError, Result};
use crate::schema::{
    MANIFEST_SCHEMA_VERSION, SCHEMA_CREATE_INDEXED_ITEMS, SCHEMA_CREATE_INDEXES,
    SCHEMA_CREATE_METADATA, SCHEMA_CREATE_PROJECTS,
};
use crate::types::{IndexedItem, IndexingStatus, ItemType, Project};

/// Projects whose `indexing_status` is `syncing` and whose `last_indexed_at`
/// is older than this are considered dead and reset on the next sweep.
pub const STALE_SYNC_THRESHOLD: TimeDelta = TimeDelta::minutes(2);

/// A connection to the manifest database.
pub struct ManifestStore {
    conn: Connection,
}

impl ManifestStore {
    /// Open (creating if absent) the manifest database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self::from_connection(conn)?;
        Ok(store)
    }

    /// Open an in-memory manifest database, for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        Self::configure_connection(&conn)?;
        conn.execute(SCHEMA_CREATE_PROJECTS, [])?;
        conn.execute(SCHEMA_CREATE_INDEXED_ITEMS, [])?;
        conn.execute(SCHEMA_CREATE_METADATA, [])?;
        conn.execute_batch(SCHEMA_CREATE_INDEXES)?;

        let store = Self { conn };
        store.check_schema_version()?;
        Ok(store)
    }

    fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(())
    }

    fn check_schema_version(&self) -> Result<()> {
        match self.get_metadata("schema_version")? {
            Some(version) if version == MANIFEST_SCHEMA_VERSION => Ok(()),
            Some(version) => Err(ManifestError::SchemaVersionMismatch {
                expected: MANIFEST_SCHEMA_VERSION.to_string(),
                found: version,
            }),
            None => self.set_metadata("schema_version", MANIFEST_SCHEMA_VERSION),
        }
    }

    fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM manifest_metadata WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO manifest_metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // =====================================================================
    // Project operations
    // =====================================================================

    /// Insert a project if its `gitlab_id` is new, or update its mutable
    /// fields (name, path, branch, url) if it already exists.
    pub fn upsert_project(
        &self,
        gitlab_id: i64,
        name: &str,
        path_with_namespace: &str,
        default_branch: &str,
        http_url_to_repo: &str,
    ) -> Result<Project> {
        let now = Utc::now();
        self.conn.execute(
            r#"
            INSERT INTO projects
                (gitlab_id, name, path_with_namespace, default_branch, http_url_to_repo, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(gitlab_id) DO UPDATE SET
                name = excluded.name,
                path_with_namespace = excluded.path_with_namespace,
                default_branch = excluded.default_branch,
                http_url_to_repo = excluded.http_url_to_repo,
                updated_at = excluded.updated_at
            "#,
            params![
                gitlab_id,
                name,
                path_with_namespace,
                default_branch,
                http_url_to_repo,
                format_timestamp(now),
            ],
        )?;
        self.get_project(gitlab_id)?
            .ok_or(ManifestError::ProjectNotFound(gitlab_id))
    }

    /// Look up a project by its GitLab id.
    pub fn get_project(&self, gitlab_id: i64) -> Result<Option<Project>> {
        self.conn
            .query_row(
                &format!("{PROJECT_COLUMNS} FROM projects WHERE gitlab_id = ?1"),
                [gitlab_id],
                row_to_project,
            )
            .optional()?
            .transpose()
    }

    /// Look up a project by its local row id (the foreign key used by
    /// `indexed_items`).
    pub fn get_project_by_local_id(&self, id: i64) -> Result<Option<Project>> {
        self.conn
            .query_row(
                &format!("{PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
                [id],
                row_to_project,
            )
            .optional()?
            .transpose()
    }

    /// All known projects.
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROJECT_COLUMNS} FROM projects ORDER BY id"))?;
        let rows = stmt.query_map([], row_to_project)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .collect()
    }

    /// Projects currently selected for chat/indexing.
    pub fn list_selected_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PROJECT_COLUMNS} FROM projects WHERE is_selected = 1 ORDER BY id"
        ))?;
        let rows = stmt.query_map([], row_to_project)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .collect()
    }

    /// Mark a project selected or deselected.
    pub fn set_selected(&self, gitlab_id: i64, selected: bool) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE projects SET is_selected = ?1, updated_at = ?2 WHERE gitlab_id = ?3",
            params![selected, format_timestamp(Utc::now()), gitlab_id],
        )?;
        if updated == 0 {
            return Err(ManifestError::ProjectNotFound(gitlab_id));
        }
        Ok(())
    }

    /// Attempt to transition a project into an active run (`indexing` or
    /// `syncing`). Returns `false` (the orchestrator's `already_indexing`
    /// case) if a run is already active, without changing anything.
    pub fn try_start_run(&self, gitlab_id: i64, target: IndexingStatus) -> Result<bool> {
        let project = self
            .get_project(gitlab_id)?
            .ok_or(ManifestError::ProjectNotFound(gitlab_id))?;
        if project.indexing_status.is_active() {
            return Ok(false);
        }
        self.conn.execute(
            "UPDATE projects SET indexing_status = ?1, indexing_error = NULL, updated_at = ?2 WHERE gitlab_id = ?3",
            params![target.as_str(), format_timestamp(Utc::now()), gitlab_id],
        )?;
        Ok(true)
    }

    /// Mark a run finished successfully: status -> `completed`,
    /// `is_indexed = true`, `last_indexed_at = now`, error cleared, and
    /// (if given) `last_indexed_commit` updated.
    pub fn complete_run(&self, gitlab_id: i64, commit: Option<&str>) -> Result<()> {
        let now = format_timestamp(Utc::now());
        let updated = self.conn.execute(
            r#"
            UPDATE projects SET
                indexing_status = 'completed',
                is_indexed = 1,
                indexing_error = NULL,
                last_indexed_at = ?1,
                last_indexed_commit = COALESCE(?2, last_indexed_commit),
                updated_at = ?1
            WHERE gitlab_id = ?3
            "#,
            params![now, commit, gitlab_id],
        )?;
        if updated == 0 {
            return Err(ManifestError::ProjectNotFound(gitlab_id));
        }
        Ok(())
    }

    /// Mark a run failed: status -> `error`, with a message.
    pub fn fail_run(&self, gitlab_id: i64, message: &str) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE projects SET indexing_status = 'error', indexing_error = ?1, updated_at = ?2 WHERE gitlab_id = ?3",
            params![message, format_timestamp(Utc::now()), gitlab_id],
        )?;
        if updated == 0 {
            return Err(ManifestError::ProjectNotFound(gitlab_id));
        }
        Ok(())
    }

    /// Mark a run stopped by user request: status -> `stopped`.
    pub fn stop_run(&self, gitlab_id: i64) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE projects SET indexing_status = 'stopped', updated_at = ?1 WHERE gitlab_id = ?2",
            params![format_timestamp(Utc::now()), gitlab_id],
        )?;
        if updated == 0 {
            return Err(ManifestError::ProjectNotFound(gitlab_id));
        }
        Ok(())
    }

    /// Reset projects stuck in `syncing` with a stale `last_indexed_at` back
    /// to `completed`, so the next sync sweep can pick them up again.
    /// Returns the number of rows recovered.
    pub fn recover_stale_syncing(&self) -> Result<usize> {
        let cutoff = format_timestamp(Utc::now() - STALE_SYNC_THRESHOLD);
        let recovered = self.conn.execute(
            r#"
            UPDATE projects SET indexing_status = 'completed', updated_at = ?1
            WHERE indexing_status = 'syncing' AND last_indexed_at IS NOT NULL AND last_indexed_at < ?1
            "#,
            params![cutoff],
        )?;
        if recovered > 0 {
            tracing::warn!(count = recovered, "recovered stale syncing projects");
        }
        Ok(recovered)
    }

    /// Delete a project and (via `ON DELETE CASCADE`) all of its indexed
    /// items.
    pub fn delete_project(&self, gitlab_id: i64) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM projects WHERE gitlab_id = ?1", [gitlab_id])?;
        if deleted == 0 {
            return Err(ManifestError::ProjectNotFound(gitlab_id));
        }
        Ok(())
    }

    // =====================================================================
    // Indexed item operations
    // =====================================================================

    /// Insert or replace an item's manifest row.
    pub fn upsert_indexed_item(
        &self,
        project_id: i64,
        item_type: ItemType,
        item_id: &str,
        item_iid: Option<&str>,
        point_ids: &[Uuid],
        last_updated_at: Option<DateTime<Utc>>,
    ) -> Result<IndexedItem> {
        let point_ids_json = serde_json::to_string(point_ids)?;
        self.conn.execute(
            r#"
            INSERT INTO indexed_items
                (project_id, item_type, item_id, item_iid, qdrant_point_ids, last_updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(project_id, item_type, item_id) DO UPDATE SET
                item_iid = excluded.item_iid,
                qdrant_point_ids = excluded.qdrant_point_ids,
                last_updated_at = excluded.last_updated_at
            "#,
            params![
                project_id,
                item_type.as_str(),
                item_id,
                item_iid,
                point_ids_json,
                last_updated_at.map(format_timestamp),
            ],
        )?;
        self.get_indexed_item(project_id, item_type, item_id)?
            .ok_or_else(|| ManifestError::InvalidItemType(item_type.to_string()))
    }

    /// Merge `new_ids` into an existing item's point-id set (set union) and
    /// bump `last_updated_at`. Used by the incremental code sync stage,
    /// which never replaces a file's points wholesale.
    pub fn merge_point_ids(
        &self,
        project_id: i64,
        item_type: ItemType,
        item_id: &str,
        new_ids: &[Uuid],
        last_updated_at: Option<DateTime<Utc>>,
    ) -> Result<IndexedItem> {
        let existing = self.get_indexed_item(project_id, item_type, item_id)?;
        let mut merged: Vec<Uuid> = existing.map(|e| e.qdrant_point_ids).unwrap_or_default();
        for id in new_ids {
            if !merged.contains(id) {
                merged.push(*id);
            }
        }
        self.upsert_indexed_item(project_id, item_type, item_id, None, &merged, last_updated_at)
    }

    /// Look up a single item's manifest row.
    pub fn get_indexed_item(
        &self,
        project_id: i64,
        item_type: ItemType,
        item_id: &str,
    ) -> Result<Option<IndexedItem>> {
        self.conn
            .query_row(
                &format!(
                    "{ITEM_COLUMNS} FROM indexed_items WHERE project_id = ?1 AND item_type = ?2 AND item_id = ?3"
                ),
                params![project_id, item_type.as_str(), item_id],
                row_to_item,
            )
            .optional()?
            .transpose()
    }

    /// List all items of one (or, if `None`, every) type for a project.
    pub fn list_indexed_items(
        &self,
        project_id: i64,
        item_type: Option<ItemType>,
    ) -> Result<Vec<IndexedItem>> {
        let rows = match item_type {
            Some(t) => {
                let mut stmt = self.conn.prepare(&format!(
                    "{ITEM_COLUMNS} FROM indexed_items WHERE project_id = ?1 AND item_type = ?2 ORDER BY id"
                ))?;
                stmt.query_map(params![project_id, t.as_str()], row_to_item)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "{ITEM_COLUMNS} FROM indexed_items WHERE project_id = ?1 ORDER BY id"
                ))?;
                stmt.query_map(params![project_id], row_to_item)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        rows.into_iter().collect()
    }

    /// The upstream ids of every item of `item_type` currently tracked for
    /// a project, used by the cleanup-deletions sync stage to diff against
    /// the live remote id set.
    pub fn list_item_ids(&self, project_id: i64, item_type: ItemType) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT item_id FROM indexed_items WHERE project_id = ?1 AND item_type = ?2",
        )?;
        let ids = stmt
            .query_map(params![project_id, item_type.as_str()], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Delete a single item's manifest row, returning it (so the caller can
    /// delete its vector points) if it existed.
    pub fn delete_indexed_item(
        &self,
        project_id: i64,
        item_type: ItemType,
        item_id: &str,
    ) -> Result<Option<IndexedItem>> {
        let existing = self.get_indexed_item(project_id, item_type, item_id)?;
        if existing.is_some() {
            self.conn.execute(
                "DELETE FROM indexed_items WHERE project_id = ?1 AND item_type = ?2 AND item_id = ?3",
                params![project_id, item_type.as_str(), item_id],
            )?;
        }
        Ok(existing)
    }
}

const PROJECT_COLUMNS: &str = r#"SELECT
    id, gitlab_id, name, path_with_namespace, default_branch, http_url_to_repo,
    is_indexed, is_selected, indexing_status, indexing_error, last_indexed_at,
    last_indexed_commit, created_at, updated_at"#;

const ITEM_COLUMNS: &str = r#"SELECT
    id, project_id, item_type, item_id, item_iid, qdrant_point_ids, last_updated_at"#;

/// Millisecond-precision, fixed-width RFC 3339. Timestamps are compared as
/// plain TEXT in SQL (the stale-recovery query in particular); the default
/// variable-precision `to_rfc3339()` output would make that comparison
/// unreliable.
fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[cfg(test)]
impl ManifestStore {
    /// Back-date a project straight into `syncing`, bypassing the normal
    /// `try_start_run` path, so the stale-recovery sweep can be exercised
    /// without waiting in real time.
    pub fn test_force_syncing_at(&self, gitlab_id: i64, last_indexed_at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE projects SET indexing_status = 'syncing', last_indexed_at = ?1 WHERE gitlab_id = ?2",
            params![format_timestamp(last_indexed_at), gitlab_id],
        )?;
        Ok(())
    }
}

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Project>> {
    let status_str: String = row.get(8)?;
    let last_indexed_at: Option<String> = row.get(10)?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;

    let project = (|| -> Result<Project> {
        Ok(Project {
            id: row.get(0)?,
            gitlab_id: row.get(1)?,
            name: row.get(2)?,
            path_with_namespace: row.get(3)?,
            default_branch: row.get(4)?,
            http_url_to_repo: row.get(5)?,
            is_indexed: row.get(6)?,
            is_selected: row.get(7)?,
            indexing_status: status_str.parse()?,
            indexing_error: row.get(9)?,
            last_indexed_at: last_indexed_at.map(|s| parse_timestamp(&s)).transpose()?,
            last_indexed_commit: row.get(11)?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    })();
    Ok(project)
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<IndexedItem>> {
    let item_type_str: String = row.get(2)?;
    let point_ids_json: String = row.get(5)?;
    let last_updated_at: Option<String> = row.get(6)?;

    let item = (|| -> Result<IndexedItem> {
        Ok(IndexedItem {
            id: row.get(0)?,
            project_id: row.get(1)?,
            item_type: item_type_str.parse()?,
            item_id: row.get(3)?,
            item_iid: row.get(4)?,
            qdrant_point_ids: serde_json::from_str(&point_ids_json)?,
            last_updated_at: last_updated_at.map(|s| parse_timestamp(&s)).transpose()?,
        })
    })();
    Ok(item)
}

//! SQLite schema definitions for the manifest database.
//!
//! The manifest is a single SQLite database holding two tables: `projects`
//! and `indexed_items`. Unlike a partition database (one file per subtree of
//! a repository) this is one file for the whole instance, since the
//! manifest's job is cross-project bookkeeping rather than per-project
//! content.

/// Schema version for the manifest database.
pub const MANIFEST_SCHEMA_VERSION: &str = "1";

/// SQL to create the `projects` table.
pub const SCHEMA_CREATE_PROJECTS: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    gitlab_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    path_with_namespace TEXT NOT NULL,
    default_branch TEXT NOT NULL DEFAULT 'main',
    http_url_to_repo TEXT NOT NULL,
    is_indexed INTEGER NOT NULL DEFAULT 0,
    is_selected INTEGER NOT NULL DEFAULT 0,
    indexing_status TEXT NOT NULL DEFAULT 'pending',
    indexing_error TEXT,
    last_indexed_at TEXT,
    last_indexed_commit TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// SQL to create the `indexed_items` table.
///
/// `item_iid` is nullable TEXT rather than the upstream integer IID so that
/// README rows can repurpose the slot for an 8-hex content-hash prefix
/// without being coerced through an integer column (see DESIGN.md).
/// `qdrant_point_ids` is a JSON array of point id strings; deleting a
/// project cascades into this table via `ON DELETE CASCADE`.
pub const SCHEMA_CREATE_INDEXED_ITEMS: &str = r#"
CREATE TABLE IF NOT EXISTS indexed_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    item_type TEXT NOT NULL,
    item_id TEXT NOT NULL,
    item_iid TEXT,
    qdrant_point_ids TEXT NOT NULL DEFAULT '[]',
    last_updated_at TEXT,
    UNIQUE(project_id, item_type, item_id)
)
"#;

/// SQL to create indexes supporting the manifest's lookup and
/// stale-recovery queries.
pub const SCHEMA_CREATE_INDEXES: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_projects_gitlab_id ON projects(gitlab_id);
CREATE INDEX IF NOT EXISTS idx_projects_status ON projects(indexing_status);
CREATE INDEX IF NOT EXISTS idx_items_project_type ON indexed_items(project_id, item_type, item_id);
"#;

/// SQL to create the metadata table (schema version bookkeeping).
pub const SCHEMA_CREATE_METADATA: &str = r#"
CREATE TABLE IF NOT EXISTS manifest_metadata (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(SCHEMA_CREATE_PROJECTS, []).unwrap();
        conn.execute(SCHEMA_CREATE_INDEXED_ITEMS, []).unwrap();
        conn.execute(SCHEMA_CREATE_METADATA, []).unwrap();
        conn.execute_batch(SCHEMA_CREATE_INDEXES).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();

        assert!(tables.contains(&"projects".to_string()));
        assert!(tables.contains(&"indexed_items".to_string()));
        assert!(tables.contains(&"manifest_metadata".to_string()));
    }

    #[test]
    fn cascade_delete_removes_indexed_items() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        conn.execute(SCHEMA_CREATE_PROJECTS, []).unwrap();
        conn.execute(SCHEMA_CREATE_INDEXED_ITEMS, []).unwrap();

        conn.execute(
            "INSERT INTO projects (gitlab_id, name, path_with_namespace, http_url_to_repo, created_at, updated_at) VALUES (1, 'a', 'ns/a', 'http://x', 't', 't')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO indexed_items (project_id, item_type, item_id) VALUES (1, 'issue', '1')",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM projects WHERE id = 1", []).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM indexed_items", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}

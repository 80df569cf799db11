//! Relational manifest of indexed GitLab projects and content.
//!
//! A single SQLite database tracks two tables: `projects` (one row per
//! GitLab project, with its indexing status and last-synced commit) and
//! `indexed_items` (one row per issue/MR/comment/readme/code entry, owning
//! the set of vector point ids it was embedded into). The orchestrator
//! drives both through [`ManifestStore`]; nothing outside this crate writes
//! to the database directly.
//!
//! # Example
//!
//! ```
//! use gitchat_manifest::ManifestStore;
//!
//! let store = ManifestStore::in_memory().unwrap();
//! let project = store
//!     .upsert_project(42, "demo", "group/demo", "main", "https://gitlab.example/group/demo.git")
//!     .unwrap();
//! assert!(!project.is_indexed);
//! ```

mod error;
mod schema;
mod store;
mod types;

pub use error::{ManifestError, Result};
pub use store::{ManifestStore, STALE_SYNC_THRESHOLD};
pub use types::{IndexedItem, IndexingStatus, ItemType, Project};

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn upsert_project_creates_then_updates() {
        let store = ManifestStore::in_memory().unwrap();
        let p1 = store
            .upsert_project(1, "demo", "g/demo", "main", "https://x/demo.git")
            .unwrap();
        assert_eq!(p1.indexing_status, IndexingStatus::Pending);
        assert!(!p1.is_indexed);

        let p2 = store
            .upsert_project(1, "demo-renamed", "g/demo", "main", "https://x/demo.git")
            .unwrap();
        assert_eq!(p2.id, p1.id);
        assert_eq!(p2.name, "demo-renamed");
    }

    #[test]
    fn try_start_run_guards_against_concurrent_runs() {
        let store = ManifestStore::in_memory().unwrap();
        store
            .upsert_project(1, "demo", "g/demo", "main", "https://x/demo.git")
            .unwrap();

        assert!(store.try_start_run(1, IndexingStatus::Indexing).unwrap());
        assert!(!store.try_start_run(1, IndexingStatus::Indexing).unwrap());
        assert!(!store.try_start_run(1, IndexingStatus::Syncing).unwrap());

        store.complete_run(1, Some(&"a".repeat(40))).unwrap();
        let project = store.get_project(1).unwrap().unwrap();
        assert_eq!(project.indexing_status, IndexingStatus::Completed);
        assert!(project.is_indexed);
        assert!(project.last_indexed_at.is_some());
        assert_eq!(project.last_indexed_commit.as_deref(), Some("a".repeat(40).as_str()));

        assert!(store.try_start_run(1, IndexingStatus::Syncing).unwrap());
    }

    #[test]
    fn fail_run_records_error_and_clears_on_next_success() {
        let store = ManifestStore::in_memory().unwrap();
        store
            .upsert_project(1, "demo", "g/demo", "main", "https://x/demo.git")
            .unwrap();
        store.try_start_run(1, IndexingStatus::Indexing).unwrap();
        store.fail_run(1, "clone timed out").unwrap();

        let project = store.get_project(1).unwrap().unwrap();
        assert_eq!(project.indexing_status, IndexingStatus::Error);
        assert_eq!(project.indexing_error.as_deref(), Some("clone timed out"));

        store.try_start_run(1, IndexingStatus::Indexing).unwrap();
        store.complete_run(1, None).unwrap();
        let project = store.get_project(1).unwrap().unwrap();
        assert!(project.indexing_error.is_none());
    }

    #[test]
    fn delete_project_cascades_indexed_items() {
        let store = ManifestStore::in_memory().unwrap();
        let project = store
            .upsert_project(1, "demo", "g/demo", "main", "https://x/demo.git")
            .unwrap();
        store
            .upsert_indexed_item(
                project.id,
                ItemType::Issue,
                "100",
                Some("7"),
                &[Uuid::new_v4()],
                None,
            )
            .unwrap();

        store.delete_project(1).unwrap();
        assert!(store.get_project(1).unwrap().is_none());
        assert!(store
            .list_indexed_items(project.id, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn merge_point_ids_is_a_union_not_a_replace() {
        let store = ManifestStore::in_memory().unwrap();
        let project = store
            .upsert_project(1, "demo", "g/demo", "main", "https://x/demo.git")
            .unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store
            .upsert_indexed_item(project.id, ItemType::Code, "1", None, &[a], None)
            .unwrap();
        let merged = store
            .merge_point_ids(project.id, ItemType::Code, "1", &[b], None)
            .unwrap();

        assert_eq!(merged.qdrant_point_ids.len(), 2);
        assert!(merged.qdrant_point_ids.contains(&a));
        assert!(merged.qdrant_point_ids.contains(&b));

        let merged_again = store
            .merge_point_ids(project.id, ItemType::Code, "1", &[a], None)
            .unwrap();
        assert_eq!(merged_again.qdrant_point_ids.len(), 2);
    }

    #[test]
    fn recover_stale_syncing_resets_dead_runs() {
        let store = ManifestStore::in_memory().unwrap();
        store
            .upsert_project(1, "demo", "g/demo", "main", "https://x/demo.git")
            .unwrap();
        store
            .upsert_project(2, "other", "g/other", "main", "https://x/other.git")
            .unwrap();

        // Project 1: syncing, but its last_indexed_at is recent -- not stale.
        store.try_start_run(1, IndexingStatus::Indexing).unwrap();
        store.complete_run(1, None).unwrap();
        store.try_start_run(1, IndexingStatus::Syncing).unwrap();

        // Project 2: syncing with a last_indexed_at from well over the
        // 2-minute threshold ago -- a dead run that should be recovered.
        store
            .test_force_syncing_at(2, chrono::Utc::now() - chrono::Duration::minutes(10))
            .unwrap();

        let recovered = store.recover_stale_syncing().unwrap();
        assert_eq!(recovered, 1);
        assert_eq!(
            store.get_project(1).unwrap().unwrap().indexing_status,
            IndexingStatus::Syncing
        );
        assert_eq!(
            store.get_project(2).unwrap().unwrap().indexing_status,
            IndexingStatus::Completed
        );
    }

    #[test]
    fn list_item_ids_reflects_upserted_items() {
        let store = ManifestStore::in_memory().unwrap();
        let project = store
            .upsert_project(1, "demo", "g/demo", "main", "https://x/demo.git")
            .unwrap();
        store
            .upsert_indexed_item(project.id, ItemType::Issue, "100", Some("1"), &[], None)
            .unwrap();
        store
            .upsert_indexed_item(project.id, ItemType::Issue, "101", Some("2"), &[], None)
            .unwrap();

        let ids = store.list_item_ids(project.id, ItemType::Issue).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"100".to_string()));
        assert!(ids.contains(&"101".to_string()));
    }

    #[test]
    fn delete_indexed_item_returns_the_removed_row() {
        let store = ManifestStore::in_memory().unwrap();
        let project = store
            .upsert_project(1, "demo", "g/demo", "main", "https://x/demo.git")
            .unwrap();
        store
            .upsert_indexed_item(project.id, ItemType::Comment, "5", None, &[], None)
            .unwrap();

        let deleted = store
            .delete_indexed_item(project.id, ItemType::Comment, "5")
            .unwrap();
        assert!(deleted.is_some());
        assert!(store
            .delete_indexed_item(project.id, ItemType::Comment, "5")
            .unwrap()
            .is_none());
    }
}

//! Durable job queue backing the worker plane (§5): one SQLite table, two
//! logical queues (`indexing`, `gitlab_sync`), acks-late semantics via an
//! explicit running/done/failed status column. No Celery/Redis equivalent
//! exists in the corpus; this generalizes the worker-pool's poll-loop shape
//! onto the same database file the manifest store already owns.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use crate::error::Result;

/// The two logical queues the worker plane schedules onto.
pub const QUEUE_INDEXING: &str = "indexing";
pub const QUEUE_GITLAB_SYNC: &str = "gitlab_sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    FullIndex,
    Sync,
}

impl JobKind {
    fn as_str(&self) -> &'static str {
        match self {
            JobKind::FullIndex => "full_index",
            JobKind::Sync => "sync",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "full_index" => Some(JobKind::FullIndex),
            "sync" => Some(JobKind::Sync),
            _ => None,
        }
    }
}

/// A single queued unit of work.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: i64,
    pub gitlab_id: i64,
    pub kind: JobKind,
}

/// SQLite-backed FIFO job queue, safe to share across worker tasks via the
/// internal mutex (a single `rusqlite::Connection` is `Send` but not
/// `Sync`).
pub struct JobQueue {
    conn: Mutex<Connection>,
}

impl JobQueue {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue TEXT NOT NULL,
                gitlab_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'queued',
                created_at TEXT NOT NULL,
                started_at TEXT,
                finished_at TEXT,
                error TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_queue_status ON jobs(queue, status, id);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            r#"
            CREATE TABLE jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue TEXT NOT NULL,
                gitlab_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'queued',
                created_at TEXT NOT NULL,
                started_at TEXT,
                finished_at TEXT,
                error TEXT
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Enqueue a job, returning its id.
    pub fn enqueue(&self, queue: &str, gitlab_id: i64, kind: JobKind) -> Result<i64> {
        let conn = self.conn.lock().expect("job queue mutex poisoned");
        conn.execute(
            "INSERT INTO jobs (queue, gitlab_id, kind, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![queue, gitlab_id, kind.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Atomically claim the oldest queued job on `queue`, marking it
    /// running. Returns `None` when the queue is empty.
    pub fn dequeue_next(&self, queue: &str) -> Result<Option<Job>> {
        let conn = self.conn.lock().expect("job queue mutex poisoned");
        let row = conn
            .query_row(
                "SELECT id, gitlab_id, kind FROM jobs WHERE queue = ?1 AND status = 'queued' ORDER BY id LIMIT 1",
                params![queue],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, gitlab_id, kind_str)) = row else {
            return Ok(None);
        };

        let Some(kind) = JobKind::from_str(&kind_str) else {
            warn!("job {id} has unrecognized kind {kind_str:?}, marking failed");
            conn.execute(
                "UPDATE jobs SET status = 'failed', error = 'unrecognized job kind', finished_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), id],
            )?;
            return Ok(None);
        };

        conn.execute(
            "UPDATE jobs SET status = 'running', started_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;

        Ok(Some(Job { id, gitlab_id, kind }))
    }

    pub fn complete(&self, job_id: i64) -> Result<()> {
        let conn = self.conn.lock().expect("job queue mutex poisoned");
        conn.execute(
            "UPDATE jobs SET status = 'done', finished_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), job_id],
        )?;
        Ok(())
    }

    pub fn fail(&self, job_id: i64, message: &str) -> Result<()> {
        let conn = self.conn.lock().expect("job queue mutex poisoned");
        conn.execute(
            "UPDATE jobs SET status = 'failed', error = ?1, finished_at = ?2 WHERE id = ?3",
            params![message, Utc::now().to_rfc3339(), job_id],
        )?;
        Ok(())
    }

    /// Revoke every queued or running job for `gitlab_id` (user stop).
    /// Returns the number of jobs revoked.
    pub fn revoke_for_project(&self, gitlab_id: i64) -> Result<usize> {
        let conn = self.conn.lock().expect("job queue mutex poisoned");
        let revoked = conn.execute(
            "UPDATE jobs SET status = 'revoked', finished_at = ?1 WHERE gitlab_id = ?2 AND status IN ('queued', 'running')",
            params![Utc::now().to_rfc3339(), gitlab_id],
        )?;
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_then_dequeue_returns_job_in_fifo_order() {
        let queue = JobQueue::in_memory().unwrap();
        queue.enqueue(QUEUE_INDEXING, 1, JobKind::FullIndex).unwrap();
        queue.enqueue(QUEUE_INDEXING, 2, JobKind::Sync).unwrap();

        let first = queue.dequeue_next(QUEUE_INDEXING).unwrap().unwrap();
        assert_eq!(first.gitlab_id, 1);
        assert_eq!(first.kind, JobKind::FullIndex);

        let second = queue.dequeue_next(QUEUE_INDEXING).unwrap().unwrap();
        assert_eq!(second.gitlab_id, 2);

        assert!(queue.dequeue_next(QUEUE_INDEXING).unwrap().is_none());
    }

    #[test]
    fn dequeue_does_not_cross_queues() {
        let queue = JobQueue::in_memory().unwrap();
        queue.enqueue(QUEUE_GITLAB_SYNC, 1, JobKind::Sync).unwrap();
        assert!(queue.dequeue_next(QUEUE_INDEXING).unwrap().is_none());
        assert!(queue.dequeue_next(QUEUE_GITLAB_SYNC).unwrap().is_some());
    }

    #[test]
    fn revoke_marks_queued_jobs_revoked() {
        let queue = JobQueue::in_memory().unwrap();
        queue.enqueue(QUEUE_INDEXING, 5, JobKind::FullIndex).unwrap();
        let revoked = queue.revoke_for_project(5).unwrap();
        assert_eq!(revoked, 1);
        assert!(queue.dequeue_next(QUEUE_INDEXING).unwrap().is_none());
    }

    #[test]
    fn complete_and_fail_update_status() {
        let queue = JobQueue::in_memory().unwrap();
        let id = queue.enqueue(QUEUE_INDEXING, 1, JobKind::FullIndex).unwrap();
        queue.dequeue_next(QUEUE_INDEXING).unwrap();
        queue.complete(id).unwrap();

        let id2 = queue.enqueue(QUEUE_INDEXING, 2, JobKind::Sync).unwrap();
        queue.dequeue_next(QUEUE_INDEXING).unwrap();
        queue.fail(id2, "boom").unwrap();
    }
}

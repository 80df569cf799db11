//! Worker plane: a small pool of polling tasks draining the job queue.
//!
//! Grounded in the worker-pool's poll-loop shape: each worker checks a
//! shared shutdown flag every iteration, backs off gently on an empty
//! queue and more aggressively after an error, and is joined via a
//! `JoinSet` on shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use gitchat_manifest::ManifestStore;

use crate::orchestrator::Orchestrator;
use crate::queue::{Job, JobKind, JobQueue, QUEUE_GITLAB_SYNC, QUEUE_INDEXING};

/// Worker pool tuning. Defaults match the worker plane's documented
/// concurrency (4 workers, acks-late).
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub poll_interval_ms: u64,
    pub concurrency: usize,
    /// How often the stale-sync recovery sweep runs, independent of
    /// whether anyone requests a sync for the stuck project.
    pub stale_recovery_interval_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            concurrency: 4,
            stale_recovery_interval_secs: 300,
        }
    }
}

/// Owns the job queue and a handle to the orchestrator, and drives a fixed
/// pool of polling workers until told to shut down.
pub struct WorkerPool {
    queue: Arc<JobQueue>,
    orchestrator: Arc<Orchestrator>,
    manifest: Arc<std::sync::Mutex<ManifestStore>>,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<JobQueue>,
        orchestrator: Arc<Orchestrator>,
        manifest: Arc<std::sync::Mutex<ManifestStore>>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            manifest,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle other tasks can use to request shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Spawn `config.concurrency` workers plus the stale-sync recovery
    /// sweep, and block until every one has observed the shutdown signal
    /// and drained.
    pub async fn run(&self) {
        let mut workers = JoinSet::new();

        for id in 0..self.config.concurrency {
            let queue = self.queue.clone();
            let orchestrator = self.orchestrator.clone();
            let shutdown = self.shutdown.clone();
            let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
            workers.spawn(async move {
                worker_loop(id, queue, orchestrator, shutdown, poll_interval).await;
            });
        }

        {
            let manifest = self.manifest.clone();
            let shutdown = self.shutdown.clone();
            let sweep_interval = Duration::from_secs(self.config.stale_recovery_interval_secs);
            workers.spawn(async move {
                stale_recovery_loop(manifest, shutdown, sweep_interval).await;
            });
        }

        while workers.join_next().await.is_some() {}
    }
}

/// Periodically reclaims projects stuck in `syncing` (e.g. the process
/// that started a sync crashed mid-run), independent of any incoming sync
/// request for that project.
async fn stale_recovery_loop(
    manifest: Arc<std::sync::Mutex<ManifestStore>>,
    shutdown: Arc<AtomicBool>,
    interval: Duration,
) {
    while !shutdown.load(Ordering::Relaxed) {
        tokio::time::sleep(interval).await;
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let recovered = {
            let manifest = manifest.lock().expect("manifest mutex poisoned");
            manifest.recover_stale_syncing()
        };
        match recovered {
            Ok(0) => {}
            Ok(n) => info!("stale-sync recovery reclaimed {n} project(s)"),
            Err(e) => warn!("stale-sync recovery sweep failed: {e}"),
        }
    }
}

async fn worker_loop(
    id: usize,
    queue: Arc<JobQueue>,
    orchestrator: Arc<Orchestrator>,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    info!("worker {id} starting");

    while !shutdown.load(Ordering::Relaxed) {
        let next = queue
            .dequeue_next(QUEUE_INDEXING)
            .and_then(|found| match found {
                Some(job) => Ok(Some(job)),
                None => queue.dequeue_next(QUEUE_GITLAB_SYNC),
            });

        match next {
            Ok(Some(job)) => process_job(&queue, &orchestrator, job).await,
            Ok(None) => tokio::time::sleep(poll_interval).await,
            Err(e) => {
                warn!("worker {id} failed to poll job queue: {e}");
                tokio::time::sleep(poll_interval * 5).await;
            }
        }
    }

    info!("worker {id} shutting down");
}

async fn process_job(queue: &JobQueue, orchestrator: &Orchestrator, job: Job) {
    let result = match job.kind {
        JobKind::FullIndex => orchestrator.run_full_index(job.gitlab_id).await,
        JobKind::Sync => orchestrator.run_sync(job.gitlab_id).await,
    };

    match result {
        Ok(_) => {
            if let Err(e) = queue.complete(job.id) {
                error!("failed to mark job {} complete: {e}", job.id);
            }
        }
        Err(e) => {
            error!("job {} (project {}) failed: {e}", job.id, job.gitlab_id);
            if let Err(e) = queue.fail(job.id, &e.to_string()) {
                error!("failed to mark job {} failed: {e}", job.id);
            }
        }
    }
}

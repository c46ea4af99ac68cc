//! Worker pool that drives queued jobs through the orchestrator.

use crate::error::ConversionError;
use crate::orchestrator::JobOrchestrator;
use crate::queue::{JobQueue, DEQUEUE_TIMEOUT};
use crate::telemetry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Heartbeat every this many dispatched jobs.
const HEARTBEAT_EVERY: u64 = 10;

/// Pool settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub concurrency: usize,
    /// Terminal jobs older than this are evicted.
    pub job_ttl: Duration,
    pub purge_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            job_ttl: Duration::from_secs(86400),
            purge_interval: Duration::from_secs(60),
        }
    }
}

/// Dispatcher plus the janitor task.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl WorkerPool {
    /// Starts dispatching jobs from `queue`, at most `config.concurrency` at
    /// a time.
    pub fn start(orchestrator: Arc<JobOrchestrator>, queue: Arc<JobQueue>, config: PoolConfig) -> Self {
        let shutdown = CancellationToken::new();
        let concurrency = config.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));

        let handles = vec![
            tokio::spawn(worker_loop(
                orchestrator.clone(),
                queue,
                semaphore,
                concurrency as u32,
                shutdown.clone(),
            )),
            tokio::spawn(janitor_loop(
                orchestrator,
                config.job_ttl,
                config.purge_interval,
                shutdown.clone(),
            )),
        ];

        info!("Started worker pool: concurrency={}", concurrency);
        Self { handles, shutdown }
    }

    /// Stops taking jobs from the queue and waits for in-flight jobs to finish.
    pub async fn shutdown(self) {
        info!("Shutting down worker pool, waiting for workers to finish...");
        self.shutdown.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Worker task panicked: {}", e);
            }
        }
        info!("Worker pool shutdown complete");
    }
}

/// Main dispatch loop.
///
/// A permit is taken before each dequeue so a job only leaves the queue when
/// it can start. Each job runs on its own task holding that permit. On
/// shutdown the loop reclaims every permit, which waits out in-flight jobs.
async fn worker_loop(
    orchestrator: Arc<JobOrchestrator>,
    queue: Arc<JobQueue>,
    semaphore: Arc<Semaphore>,
    permits: u32,
    shutdown: CancellationToken,
) {
    let mut dispatched: u64 = 0;

    loop {
        let permit = tokio::select! {
            _ = shutdown.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(e) => {
                    error!("Worker semaphore closed: {}", e);
                    return;
                }
            },
        };

        let job_id = tokio::select! {
            _ = shutdown.cancelled() => break,
            job = queue.dequeue(DEQUEUE_TIMEOUT) => match job {
                Some(job_id) => job_id,
                None => continue,
            },
        };

        let orchestrator_clone = orchestrator.clone();
        tokio::spawn(async move {
            process_job(&orchestrator_clone, &job_id).await;
            drop(permit);
        });

        dispatched += 1;
        if dispatched % HEARTBEAT_EVERY == 0 {
            telemetry::record_worker_heartbeat(queue.queue_length(), orchestrator.jobs().len());
        }
    }

    if let Err(e) = semaphore.acquire_many(permits).await {
        error!("Failed to drain in-flight jobs: {}", e);
    }
    info!("Worker stopped after dispatching {} jobs", dispatched);
}

/// Processes a single job and records its telemetry.
async fn process_job(orchestrator: &JobOrchestrator, job_id: &str) {
    debug!("Processing job: job_id={}", job_id);

    match orchestrator.process(job_id).await {
        Ok(()) => {}
        Err(ConversionError::AlreadyProcessed { state, .. }) => {
            warn!(
                "Skipping job already handled elsewhere: job_id={}, state={}",
                job_id, state
            );
            return;
        }
        Err(e) => {
            error!("Failed to process job: job_id={}, error={}", job_id, e);
            return;
        }
    }

    match orchestrator.jobs().get(job_id) {
        Ok(job) => telemetry::record_job_telemetry(&job),
        Err(e) => warn!("Job vanished before telemetry: job_id={}, error={}", job_id, e),
    }
}

/// Periodically evicts expired terminal jobs.
async fn janitor_loop(
    orchestrator: Arc<JobOrchestrator>,
    ttl: Duration,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(1));
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let purged = orchestrator.jobs().purge_finished(ttl);
                if purged > 0 {
                    info!("Purged {} expired jobs", purged);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MemoryArtifactStore;
    use crate::converter::LabelPdfConverter;
    use crate::job::JobState;
    use crate::label::LabelSize;
    use crate::store::JobStore;
    use crate::zpl::{ConversionEngine, InstructionPolicy};
    use usvg::fontdb;

    fn orchestrator() -> Arc<JobOrchestrator> {
        let engine = ConversionEngine::with_converter(
            InstructionPolicy::Lenient,
            LabelPdfConverter::with_fonts(fontdb::Database::new()),
        );
        Arc::new(JobOrchestrator::new(
            Arc::new(JobStore::new()),
            Arc::new(engine),
            Arc::new(MemoryArtifactStore::new()),
        ))
    }

    async fn wait_terminal(orchestrator: &JobOrchestrator, job_id: &str) -> JobState {
        for _ in 0..500 {
            let state = orchestrator.status(job_id).unwrap().state;
            if state.is_terminal() {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", job_id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pool_processes_queued_jobs() {
        let orchestrator = orchestrator();
        let queue = Arc::new(JobQueue::new());
        let pool = WorkerPool::start(
            orchestrator.clone(),
            queue.clone(),
            PoolConfig {
                concurrency: 2,
                ..PoolConfig::default()
            },
        );

        let ok = orchestrator
            .submit("^XA^FO10,10^FDgood^FS^XZ", LabelSize::TwoByOne)
            .unwrap();
        let bad = orchestrator
            .submit("^XA^XZ^XA^FDbad", LabelSize::TwoByOne)
            .unwrap();
        queue.enqueue(ok.clone()).unwrap();
        queue.enqueue(bad.clone()).unwrap();
        // duplicate trigger is tolerated
        queue.enqueue(ok.clone()).unwrap();

        assert_eq!(wait_terminal(&orchestrator, &ok).await, JobState::Completed);
        assert_eq!(wait_terminal(&orchestrator, &bad).await, JobState::Failed);

        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_waits_for_dispatched_jobs() {
        let orchestrator = orchestrator();
        let queue = Arc::new(JobQueue::new());
        let pool = WorkerPool::start(
            orchestrator.clone(),
            queue.clone(),
            PoolConfig {
                concurrency: 2,
                ..PoolConfig::default()
            },
        );

        let mut ids = Vec::new();
        for i in 0..5 {
            let id = orchestrator
                .submit(&format!("^XA^FO10,10^FDlabel {}^FS^XZ", i), LabelSize::TwoByOne)
                .unwrap();
            queue.enqueue(id.clone()).unwrap();
            ids.push(id);
        }

        for _ in 0..500 {
            if queue.queue_length() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        pool.shutdown().await;

        for id in &ids {
            assert_eq!(orchestrator.status(id).unwrap().state, JobState::Completed);
        }
    }

    #[tokio::test]
    async fn test_janitor_purges_expired_jobs() {
        let orchestrator = orchestrator();
        let id = orchestrator
            .submit("^XA^FDx^FS^XZ", LabelSize::TwoByOne)
            .unwrap();
        orchestrator.process(&id).await.unwrap();

        let pool = WorkerPool::start(
            orchestrator.clone(),
            Arc::new(JobQueue::new()),
            PoolConfig {
                concurrency: 1,
                job_ttl: Duration::ZERO,
                purge_interval: Duration::from_millis(10),
            },
        );

        for _ in 0..100 {
            if orchestrator.jobs().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(orchestrator.jobs().is_empty());
        pool.shutdown().await;
    }
}

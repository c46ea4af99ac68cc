//! In-memory job store with per-job compare-and-set transitions.

use crate::error::StoreError;
use crate::job::{ArtifactRef, ConversionJob, FailureKind, JobState};
use crate::label::LabelSize;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, warn};

/// A single mutation applied to a job record.
#[derive(Debug, Clone)]
pub enum JobUpdate {
    Start,
    Progress(u8),
    Warn(String),
    Complete(ArtifactRef),
    Fail { kind: FailureKind, message: String },
}

impl JobUpdate {
    /// State the job is in after the update succeeds.
    pub fn target_state(&self) -> JobState {
        match self {
            JobUpdate::Start | JobUpdate::Progress(_) | JobUpdate::Warn(_) => JobState::Processing,
            JobUpdate::Complete(_) => JobState::Completed,
            JobUpdate::Fail { .. } => JobState::Failed,
        }
    }

    fn apply(self, job: &mut ConversionJob) -> Result<(), StoreError> {
        let job_id = job.id.clone();
        let result = match self {
            JobUpdate::Start => job.start_processing(),
            JobUpdate::Progress(progress) => job.set_progress(progress),
            JobUpdate::Warn(warning) => job.add_warning(warning),
            JobUpdate::Complete(artifact) => job.mark_complete(artifact),
            JobUpdate::Fail { kind, message } => job.mark_failed(kind, message),
        };
        result.map_err(|e| StoreError::InvalidTransition {
            job_id,
            from: e.from,
            to: e.to,
        })
    }
}

type JobCell = Arc<Mutex<ConversionJob>>;

/// Single source of truth for job records.
///
/// The map lock is held only long enough to look up a record. Transitions
/// serialize on the record's own mutex, so writers to different jobs never
/// contend.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, JobCell>>,
}

fn lock_job(cell: &JobCell) -> MutexGuard<'_, ConversionJob> {
    cell.lock().unwrap_or_else(|poisoned| {
        warn!("Job record lock was poisoned, recovering");
        PoisonError::into_inner(poisoned)
    })
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pending job and returns a snapshot of it.
    pub fn create(&self, source_content: String, label_size: LabelSize) -> ConversionJob {
        let job = ConversionJob::new(source_content, label_size);
        let snapshot = job.clone();

        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        jobs.insert(job.id.clone(), Arc::new(Mutex::new(job)));

        debug!(job_id = %snapshot.id, label_size = %label_size, "Created job");
        snapshot
    }

    fn cell(&self, job_id: &str) -> Result<JobCell, StoreError> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(job_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))
    }

    /// Returns a snapshot of the job.
    pub fn get(&self, job_id: &str) -> Result<ConversionJob, StoreError> {
        let cell = self.cell(job_id)?;
        let job = lock_job(&cell);
        Ok(job.clone())
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.cell(job_id).is_ok()
    }

    /// Applies `update` atomically and returns the resulting snapshot.
    pub fn update(&self, job_id: &str, update: JobUpdate) -> Result<ConversionJob, StoreError> {
        let cell = self.cell(job_id)?;
        let mut job = lock_job(&cell);
        update.apply(&mut job)?;
        Ok(job.clone())
    }

    /// Applies `update` only if the job is currently in `expected`.
    pub fn compare_and_set(
        &self,
        job_id: &str,
        expected: JobState,
        update: JobUpdate,
    ) -> Result<ConversionJob, StoreError> {
        let cell = self.cell(job_id)?;
        let mut job = lock_job(&cell);
        if job.state != expected {
            return Err(StoreError::InvalidTransition {
                job_id: job_id.to_string(),
                from: job.state,
                to: update.target_state(),
            });
        }
        update.apply(&mut job)?;
        Ok(job.clone())
    }

    /// Snapshots of all jobs, newest first.
    pub fn list(&self) -> Vec<ConversionJob> {
        let cells: Vec<JobCell> = {
            let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
            jobs.values().cloned().collect()
        };
        let mut result: Vec<ConversionJob> = cells.iter().map(|cell| lock_job(cell).clone()).collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes terminal jobs last updated more than `older_than` ago.
    pub fn purge_finished(&self, older_than: Duration) -> usize {
        let cutoff = Utc::now() - older_than;
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let before = jobs.len();
        jobs.retain(|_, cell| {
            let job = lock_job(cell);
            !(job.state.is_terminal() && job.updated_at <= cutoff)
        });
        before - jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    fn store_with_job() -> (JobStore, String) {
        let store = JobStore::new();
        let job = store.create("^XA^XZ".to_string(), LabelSize::FourBySix);
        (store, job.id)
    }

    #[test]
    fn test_create_and_get() {
        let (store, id) = store_with_job();
        let job = store.get(&id).unwrap();
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_id() {
        let store = JobStore::new();
        assert_eq!(
            store.get("missing").unwrap_err(),
            StoreError::NotFound("missing".to_string())
        );
        assert!(matches!(
            store.update("missing", JobUpdate::Start),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_compare_and_set_rejects_stale_expectation() {
        let (store, id) = store_with_job();
        store
            .compare_and_set(&id, JobState::Pending, JobUpdate::Start)
            .unwrap();

        let err = store
            .compare_and_set(&id, JobState::Pending, JobUpdate::Start)
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::InvalidTransition {
                job_id: id.clone(),
                from: JobState::Processing,
                to: JobState::Processing,
            }
        );
    }

    #[test]
    fn test_update_rejects_leaving_terminal_state() {
        let (store, id) = store_with_job();
        store.update(&id, JobUpdate::Start).unwrap();
        store
            .update(
                &id,
                JobUpdate::Fail {
                    kind: FailureKind::Render,
                    message: "boom".to_string(),
                },
            )
            .unwrap();

        let err = store.update(&id, JobUpdate::Progress(50)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: JobState::Failed,
                ..
            }
        ));
    }

    #[test]
    fn test_only_one_concurrent_claim_wins() {
        let (store, id) = store_with_job();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let id = id.clone();
                thread::spawn(move || {
                    store
                        .compare_and_set(&id, JobState::Pending, JobUpdate::Start)
                        .is_ok()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn test_ids_are_unique() {
        let store = JobStore::new();
        let ids: HashSet<String> = (0..100)
            .map(|_| store.create("^XA^XZ".to_string(), LabelSize::TwoByOne).id)
            .collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_list_is_newest_first() {
        let store = JobStore::new();
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(store.create("^XA^XZ".to_string(), LabelSize::TwoByOne).id);
            thread::sleep(std::time::Duration::from_millis(2));
        }
        store.update(&ids[1], JobUpdate::Start).unwrap();

        let listed = store.list();
        let listed_ids: Vec<&str> = listed.iter().map(|job| job.id.as_str()).collect();
        ids.reverse();
        assert_eq!(listed_ids, ids.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(listed[1].state, JobState::Processing);
    }

    #[test]
    fn test_purge_finished_keeps_active_jobs() {
        let store = JobStore::new();
        let pending = store.create("^XA^XZ".to_string(), LabelSize::TwoByOne).id;
        let failed = store.create("^XA^XZ".to_string(), LabelSize::TwoByOne).id;
        store.update(&failed, JobUpdate::Start).unwrap();
        store
            .update(
                &failed,
                JobUpdate::Fail {
                    kind: FailureKind::Storage,
                    message: "disk full".to_string(),
                },
            )
            .unwrap();

        assert_eq!(store.purge_finished(Duration::zero()), 1);
        assert!(store.contains(&pending));
        assert!(!store.contains(&failed));
    }
}

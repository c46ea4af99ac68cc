//! Coordinates validation, job state, rendering and artifact storage.

use crate::artifact::ArtifactStore;
use crate::error::{ConversionError, RenderError, StoreError};
use crate::job::{ArtifactRef, ConversionJob, FailureKind, JobState, JobStatusReport};
use crate::label::LabelSize;
use crate::store::{JobStore, JobUpdate};
use crate::validator::{self, DEFAULT_MAX_UPLOAD_BYTES};
use crate::zpl::ConversionEngine;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Progress once a worker owns the job.
const PROGRESS_CLAIMED: u8 = 10;
/// Progress reached when every label is laid out.
const PROGRESS_RENDERED: u8 = 90;
/// Progress while the document is being stored.
const PROGRESS_STORING: u8 = 95;

fn failure_kind(err: &RenderError) -> FailureKind {
    match err {
        RenderError::MalformedInput(_) => FailureKind::MalformedInput,
        RenderError::UnsupportedInstruction { .. } => FailureKind::UnsupportedInstruction,
        RenderError::Svg { .. } | RenderError::Preview(_) => FailureKind::Render,
    }
}

/// Front door of the conversion pipeline.
///
/// `submit` is synchronous and cheap. `process` does the actual work and may
/// be driven by the worker pool, by [`JobOrchestrator::spawn_process`], or by
/// any external caller holding a job id.
pub struct JobOrchestrator {
    jobs: Arc<JobStore>,
    engine: Arc<ConversionEngine>,
    artifacts: Arc<dyn ArtifactStore>,
    max_upload_bytes: usize,
}

impl JobOrchestrator {
    pub fn new(jobs: Arc<JobStore>, engine: Arc<ConversionEngine>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            jobs,
            engine,
            artifacts,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn jobs(&self) -> &Arc<JobStore> {
        &self.jobs
    }

    /// Validates `content` and creates a pending job.
    pub fn submit(&self, content: &str, label_size: LabelSize) -> Result<String, ConversionError> {
        validator::validate(content)?;
        let job = self.jobs.create(content.to_string(), label_size);
        info!(job_id = %job.id, label_size = %label_size, bytes = content.len(), "Submitted job");
        Ok(job.id)
    }

    /// Resolves an uploaded payload to text, then submits it.
    pub fn submit_upload(&self, bytes: &[u8], label_size: LabelSize) -> Result<String, ConversionError> {
        let content = validator::validate_upload(bytes, self.max_upload_bytes)?;
        self.submit(content, label_size)
    }

    /// Drives one pending job to a terminal state.
    ///
    /// Rendering and storage failures are recorded on the job and are not
    /// returned; callers learn about them through [`status`](Self::status).
    pub async fn process(&self, job_id: &str) -> Result<(), ConversionError> {
        let claimed = match self.jobs.compare_and_set(job_id, JobState::Pending, JobUpdate::Start) {
            Ok(job) => job,
            Err(StoreError::InvalidTransition { from, .. }) => {
                warn!(job_id = %job_id, state = %from, "Rejected duplicate processing request");
                return Err(ConversionError::AlreadyProcessed {
                    job_id: job_id.to_string(),
                    state: from,
                });
            }
            Err(e) => return Err(e.into()),
        };
        self.progress(job_id, PROGRESS_CLAIMED);

        info!(job_id = %job_id, label_size = %claimed.label_size, "Processing job");

        let rendered = {
            let engine = self.engine.clone();
            let jobs = self.jobs.clone();
            let id = job_id.to_string();
            let ConversionJob {
                source_content,
                label_size,
                ..
            } = claimed;

            tokio::task::spawn_blocking(move || {
                engine.render_with_progress(&source_content, label_size, &mut |done, total| {
                    let span = (PROGRESS_RENDERED - PROGRESS_CLAIMED) as usize;
                    let progress = PROGRESS_CLAIMED as usize + span * done / total.max(1);
                    if let Err(e) = jobs.update(&id, JobUpdate::Progress(progress as u8)) {
                        warn!(job_id = %id, "Failed to record progress: {}", e);
                    }
                })
            })
            .await
        };

        let document = match rendered {
            Ok(Ok(document)) => document,
            Ok(Err(e)) => return self.fail(job_id, failure_kind(&e), e.to_string()),
            Err(e) => {
                return self.fail(job_id, FailureKind::Render, format!("render task aborted: {}", e))
            }
        };

        for warning in &document.warnings {
            self.jobs.update(job_id, JobUpdate::Warn(warning.clone()))?;
        }
        self.progress(job_id, PROGRESS_STORING);

        match self.artifacts.store(job_id, &document).await {
            Ok(artifact) => {
                let job = self.jobs.update(job_id, JobUpdate::Complete(artifact))?;
                info!(
                    job_id = %job_id,
                    pages = document.page_count,
                    duration_ms = ?job.processing_duration_ms(),
                    "Job completed"
                );
                Ok(())
            }
            Err(e) => self.fail(job_id, FailureKind::Storage, e.to_string()),
        }
    }

    fn progress(&self, job_id: &str, progress: u8) {
        if let Err(e) = self.jobs.update(job_id, JobUpdate::Progress(progress)) {
            warn!(job_id = %job_id, "Failed to record progress: {}", e);
        }
    }

    fn fail(&self, job_id: &str, kind: FailureKind, message: String) -> Result<(), ConversionError> {
        error!(job_id = %job_id, kind = %kind, "Job failed: {}", message);
        self.jobs.update(job_id, JobUpdate::Fail { kind, message })?;
        Ok(())
    }

    /// Runs [`process`](Self::process) on a background task.
    pub fn spawn_process(self: &Arc<Self>, job_id: String) -> JoinHandle<Result<(), ConversionError>> {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.process(&job_id).await })
    }

    pub fn status(&self, job_id: &str) -> Result<JobStatusReport, ConversionError> {
        Ok(self.jobs.get(job_id)?.status_report())
    }

    /// Download reference of a completed job.
    pub async fn download(&self, job_id: &str) -> Result<ArtifactRef, ConversionError> {
        let job = self.jobs.get(job_id)?;
        if job.state != JobState::Completed {
            return Err(ConversionError::NotFound(format!(
                "artifact for job {} (state: {})",
                job_id, job.state
            )));
        }
        self.artifacts
            .resolve(job_id)
            .await
            .map_err(|e| ConversionError::NotFound(e.to_string()))
    }
}

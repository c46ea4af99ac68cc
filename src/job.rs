//! Job models and state management for label conversion.

use crate::label::LabelSize;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle state of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Transition table: pending -> processing -> completed | failed.
    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Processing)
                | (JobState::Processing, JobState::Processing)
                | (JobState::Processing, JobState::Completed)
                | (JobState::Processing, JobState::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Processing => write!(f, "processing"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// Why a job failed. Input faults are fixable by the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MalformedInput,
    UnsupportedInstruction,
    Render,
    Storage,
}

impl FailureKind {
    pub fn is_input_error(self) -> bool {
        matches!(
            self,
            FailureKind::MalformedInput | FailureKind::UnsupportedInstruction
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::MalformedInput => write!(f, "malformed input"),
            FailureKind::UnsupportedInstruction => write!(f, "unsupported instruction"),
            FailureKind::Render => write!(f, "render failure"),
            FailureKind::Storage => write!(f, "storage failure"),
        }
    }
}

/// Retrievable reference to a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub url: String,
    pub filename: String,
    pub size_bytes: u64,
}

/// Rejected state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub from: JobState,
    pub to: JobState,
}

/// Label conversion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionJob {
    pub id: String,
    pub state: JobState,
    pub progress: u8,
    pub message: String,
    pub label_size: LabelSize,
    pub source_content: String,
    pub artifact: Option<ArtifactRef>,
    pub failure: Option<FailureKind>,
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Poll view of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub job_id: String,
    pub state: JobState,
    pub progress: u8,
    pub message: String,
    pub label_size: LabelSize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ConversionJob {
    pub fn new(source_content: String, label_size: LabelSize) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            state: JobState::Pending,
            progress: 0,
            message: "Queued for conversion".to_string(),
            label_size,
            source_content,
            artifact: None,
            failure: None,
            warnings: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, to: JobState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(to) {
            return Err(InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn start_processing(&mut self) -> Result<(), InvalidTransition> {
        if self.state != JobState::Pending {
            return Err(InvalidTransition {
                from: self.state,
                to: JobState::Processing,
            });
        }
        self.transition(JobState::Processing)?;
        self.progress = 0;
        self.message = "Rendering labels".to_string();
        Ok(())
    }

    /// Raises progress. Lower values than the current one are ignored.
    pub fn set_progress(&mut self, progress: u8) -> Result<(), InvalidTransition> {
        self.transition(JobState::Processing)?;
        self.progress = self.progress.max(progress.min(100));
        Ok(())
    }

    pub fn add_warning(&mut self, warning: String) -> Result<(), InvalidTransition> {
        self.transition(JobState::Processing)?;
        self.warnings.push(warning);
        Ok(())
    }

    pub fn mark_complete(&mut self, artifact: ArtifactRef) -> Result<(), InvalidTransition> {
        self.transition(JobState::Completed)?;
        self.progress = 100;
        self.message = format!("Conversion complete: {}", artifact.filename);
        self.artifact = Some(artifact);
        self.failure = None;
        Ok(())
    }

    pub fn mark_failed(&mut self, kind: FailureKind, error: String) -> Result<(), InvalidTransition> {
        self.transition(JobState::Failed)?;
        self.message = format!("Conversion failed ({}): {}", kind, error);
        self.failure = Some(kind);
        self.artifact = None;
        Ok(())
    }

    pub fn processing_duration_ms(&self) -> Option<i64> {
        if self.state.is_terminal() {
            Some(self.updated_at.signed_duration_since(self.created_at).num_milliseconds())
        } else {
            None
        }
    }

    pub fn status_report(&self) -> JobStatusReport {
        JobStatusReport {
            job_id: self.id.clone(),
            state: self.state,
            progress: self.progress,
            message: self.message.clone(),
            label_size: self.label_size,
            failure: self.failure,
            warnings: self.warnings.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> ArtifactRef {
        ArtifactRef {
            url: "memory://artifacts/label-x.pdf".to_string(),
            filename: "label-x.pdf".to_string(),
            size_bytes: 10,
        }
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = ConversionJob::new("^XA^XZ".to_string(), LabelSize::FourBySix);
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.artifact.is_none());
        assert!(job.processing_duration_ms().is_none());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut job = ConversionJob::new("^XA^XZ".to_string(), LabelSize::FourBySix);
        job.start_processing().unwrap();
        job.set_progress(40).unwrap();
        job.set_progress(20).unwrap();
        assert_eq!(job.progress, 40);

        job.mark_complete(artifact()).unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.artifact.is_some());
        assert!(job.processing_duration_ms().is_some());
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        let mut job = ConversionJob::new("^XA^XZ".to_string(), LabelSize::TwoByOne);
        job.start_processing().unwrap();
        job.set_progress(30).unwrap();
        job.mark_failed(FailureKind::MalformedInput, "bad block".to_string())
            .unwrap();
        assert_eq!(job.progress, 30);
        assert!(job.message.contains("malformed input"));

        let err = job.start_processing().unwrap_err();
        assert_eq!(err.from, JobState::Failed);
        assert!(job.mark_complete(artifact()).is_err());
        assert!(job.set_progress(90).is_err());
        assert!(job.artifact.is_none());
    }

    #[test]
    fn test_pending_cannot_complete_directly() {
        let mut job = ConversionJob::new("^XA^XZ".to_string(), LabelSize::TwoByOne);
        let err = job.mark_complete(artifact()).unwrap_err();
        assert_eq!(
            err,
            InvalidTransition {
                from: JobState::Pending,
                to: JobState::Completed
            }
        );
    }
}

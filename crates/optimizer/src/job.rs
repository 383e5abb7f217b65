use std::path::PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::naming;

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Done,
    Error,
}

impl JobState {
    /// Done or Error, no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Error)
    }

    /// Whether `self -> next` is a legal step of `pending -> processing -> {done | error}`
    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Processing)
                | (JobState::Processing, JobState::Done)
                | (JobState::Processing, JobState::Error)
        )
    }
}

/// Outcome of the post-transcode delivery step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryReport {
    /// Uploaded; `files_deleted` is false when local cleanup was incomplete
    Delivered { files_deleted: bool },
    /// Upload failed; local files are untouched
    Failed { error: String },
}

/// One file's transcode-and-optionally-deliver unit of work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub index: usize,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub state: JobState,
    pub progress: f64,
    pub delivery_requested: bool,
    pub error_detail: Option<String>,
    pub delivery: Option<DeliveryReport>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a pending job; the output path is derived from the input
    pub fn new(index: usize, input_path: PathBuf, delivery_requested: bool) -> Self {
        let output_path = naming::optimized_path(&input_path);
        Self {
            index,
            input_path,
            output_path,
            state: JobState::Pending,
            progress: 0.0,
            delivery_requested,
            error_detail: None,
            delivery: None,
            started_at: None,
            finished_at: None,
        }
    }

    fn transition(&mut self, next: JobState) -> Result<(), StateError> {
        if !self.state.can_transition_to(next) {
            return Err(StateError {
                index: self.index,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    pub(crate) fn start(&mut self) -> Result<(), StateError> {
        self.transition(JobState::Processing)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Record a progress tick, returning the value to publish
    ///
    /// Values are clamped to [0, 100] and rounded to two decimals. A tick
    /// below the current progress publishes the current progress again, so
    /// every tick yields a value and the sequence never decreases. `None`
    /// only outside `Processing`.
    pub(crate) fn advance(&mut self, percent: f64) -> Option<f64> {
        if self.state != JobState::Processing {
            return None;
        }
        self.progress = clamp_percent(percent).max(self.progress);
        Some(self.progress)
    }

    pub(crate) fn finish(&mut self) -> Result<(), StateError> {
        self.transition(JobState::Done)?;
        self.progress = 100.0;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub(crate) fn fail(&mut self, detail: impl Into<String>) -> Result<(), StateError> {
        self.transition(JobState::Error)?;
        self.error_detail = Some(detail.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Get the input file name for display and captions
    pub fn file_name(&self) -> String {
        self.input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input_path.display().to_string())
    }
}

/// Clamp to [0, 100] and round to two decimals; NaN counts as 0
pub fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        return 0.0;
    }
    (percent.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

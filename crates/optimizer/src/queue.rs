use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::{Job, JobState};
use crate::naming;

/// Maximum number of jobs in one batch; extra submissions are discarded
pub const MAX_BATCH_SIZE: usize = 10;

/// Container MIME types accepted for transcoding
const VIDEO_CONTAINERS: &[&str] = &[
    "video/mp4",
    "video/x-m4v",
    "video/quicktime",
    "video/x-matroska",
    "video/webm",
    "video/x-msvideo",
];

/// Identity of one submission, carried by every event of that batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn new() -> Self {
        BatchId(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One submitted file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub input_path: PathBuf,
    pub delivery_requested: bool,
}

impl BatchEntry {
    pub fn new(input_path: impl Into<PathBuf>, delivery_requested: bool) -> Self {
        Self {
            input_path: input_path.into(),
            delivery_requested,
        }
    }
}

/// Per-state counts for a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub done: usize,
    pub failed: usize,
    pub pending: usize,
    pub delivered: usize,
}

/// Check whether a path names a recognized video container
pub fn is_video_container(path: &Path) -> bool {
    mime_guess::from_path(path)
        .iter()
        .any(|mime| VIDEO_CONTAINERS.contains(&mime.essence_str()))
}

/// Ordered, bounded list of jobs for one batch
#[derive(Debug, Clone)]
pub struct JobQueue {
    batch_id: BatchId,
    jobs: Vec<Job>,
}

impl JobQueue {
    /// Build a batch from submitted entries
    ///
    /// Entries that are not video containers are dropped before indices are
    /// assigned. The encoder overwrites its output and cleanup deletes both
    /// files, so an entry is also dropped when its derived output is any
    /// submitted input, or when its input or output is already claimed by an
    /// earlier job. At most [`MAX_BATCH_SIZE`] jobs are kept.
    pub fn submit(entries: Vec<BatchEntry>) -> Self {
        let batch_id = BatchId::new();
        let entries: Vec<BatchEntry> = entries
            .into_iter()
            .filter(|entry| {
                let video = is_video_container(&entry.input_path);
                if !video {
                    debug!("Dropping non-video input: {}", entry.input_path.display());
                }
                video
            })
            .collect();
        let submitted: HashSet<PathBuf> = entries.iter().map(|e| e.input_path.clone()).collect();
        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let mut jobs = Vec::with_capacity(entries.len().min(MAX_BATCH_SIZE));

        for entry in entries {
            let output = naming::optimized_path(&entry.input_path);
            if submitted.contains(&output) {
                warn!(
                    "Dropping {}: its output {} is a submitted input",
                    entry.input_path.display(),
                    output.display()
                );
                continue;
            }

            if claimed.contains(&entry.input_path) || claimed.contains(&output) {
                warn!(
                    "Dropping {}: it or its output {} already belongs to another job in this batch",
                    entry.input_path.display(),
                    output.display()
                );
                continue;
            }

            if jobs.len() == MAX_BATCH_SIZE {
                debug!("Batch is full, discarding {}", entry.input_path.display());
                continue;
            }

            claimed.insert(entry.input_path.clone());
            claimed.insert(output);
            jobs.push(Job::new(jobs.len(), entry.input_path, entry.delivery_requested));
        }

        info!("📥 Batch {} created with {} job(s)", batch_id, jobs.len());
        JobQueue { batch_id, jobs }
    }

    /// Build a batch where every file shares the same delivery flag
    pub fn submit_paths<I, P>(paths: I, delivery_requested: bool) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::submit(
            paths
                .into_iter()
                .map(|p| BatchEntry::new(p, delivery_requested))
                .collect(),
        )
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    pub fn job_at(&self, index: usize) -> Option<&Job> {
        self.jobs.get(index)
    }

    pub(crate) fn job_at_mut(&mut self, index: usize) -> Option<&mut Job> {
        self.jobs.get_mut(index)
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// True iff every job is done or errored (vacuously true when empty)
    pub fn all_terminal(&self) -> bool {
        self.jobs.iter().all(|j| j.state.is_terminal())
    }

    /// Indices of jobs still waiting, in ascending order
    pub(crate) fn pending_indices(&self) -> Vec<usize> {
        self.jobs
            .iter()
            .filter(|j| j.state == JobState::Pending)
            .map(|j| j.index)
            .collect()
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.jobs.len(),
            ..Default::default()
        };
        for job in &self.jobs {
            match job.state {
                JobState::Done => summary.done += 1,
                JobState::Error => summary.failed += 1,
                JobState::Pending | JobState::Processing => summary.pending += 1,
            }
            if matches!(job.delivery, Some(crate::job::DeliveryReport::Delivered { .. })) {
                summary.delivered += 1;
            }
        }
        summary
    }
}

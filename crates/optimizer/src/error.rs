use std::path::PathBuf;
use thiserror::Error;

use crate::job::JobState;

/// Input could not be read as a media container
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("file does not exist: {}", .0.display())]
    Missing(PathBuf),
    #[error("failed to execute ffprobe at {}: {source}", bin.display())]
    Spawn {
        bin: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ffprobe failed (exit code {exit_code}) for {}: {stderr}", path.display())]
    Failed {
        path: PathBuf,
        exit_code: i32,
        stderr: String,
    },
    #[error("unreadable ffprobe output for {}: {reason}", path.display())]
    InvalidOutput { path: PathBuf, reason: String },
    #[error("no video stream in {}", .0.display())]
    NoVideoStream(PathBuf),
}

/// Encode attempt failed or did not run to completion
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("failed to spawn ffmpeg at {}: {source}", bin.display())]
    Spawn {
        bin: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ffmpeg exited with code {exit_code}: {stderr}")]
    Failed { exit_code: i32, stderr: String },
    #[error("transcode cancelled")]
    Cancelled,
    #[error("transcoder stopped without reporting an outcome")]
    Interrupted,
    #[error("ffmpeg i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Remote sink did not accept the finished file
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery sink is not configured")]
    NotConfigured,
    #[error("delivery sink unreachable: {0}")]
    Unreachable(String),
    #[error("delivery sink rejected credentials (HTTP {0})")]
    Unauthorized(u16),
    #[error("delivery rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A job state change that would break the monotonic lifecycle
#[derive(Debug, Error, PartialEq, Eq)]
#[error("job {index}: illegal transition {from:?} -> {to:?}")]
pub struct StateError {
    pub index: usize,
    pub from: JobState,
    pub to: JobState,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported worker count {0}: only a single worker is available")]
    UnsupportedWorkers(usize),
}

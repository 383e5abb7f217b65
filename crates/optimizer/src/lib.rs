pub mod config;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod events;
pub mod ffmpeg;
pub mod ffprobe;
pub mod job;
pub mod naming;
pub mod open;
pub mod preferences;
pub mod queue;
pub mod scan;
pub mod transcoder;

pub use config::{OptimizerConfig, TelegramConfig};
pub use delivery::{DeliverySink, TelegramSink};
pub use engine::QueueEngine;
pub use error::{ConfigError, DeliveryError, ProbeError, StateError, TranscodeError};
pub use events::{EventChannel, JobEvent, Subscription};
pub use ffprobe::MediaInfo;
pub use job::{DeliveryReport, Job, JobState};
pub use preferences::Preferences;
pub use queue::{BatchEntry, BatchId, BatchSummary, JobQueue};
pub use transcoder::{FfmpegTranscoder, Transcoder};

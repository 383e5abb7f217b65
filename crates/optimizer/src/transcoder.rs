use std::path::{Path, PathBuf};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::OptimizerConfig;
use crate::error::{ProbeError, TranscodeError};
use crate::ffmpeg::{self, CommandBuilder};
use crate::ffprobe::{self, MediaInfo};

/// One item of a transcode run
#[derive(Debug)]
pub enum TranscodeUpdate {
    /// Percent complete as reported by the encoder (not yet clamped)
    Progress(f64),
    /// Terminal outcome; nothing follows it
    Finished(Result<(), TranscodeError>),
}

/// Lazy, finite stream of updates for a single encode attempt
///
/// Yields any number of `Progress` items followed by exactly one `Finished`.
/// A run cannot be restarted; start a new one instead.
pub struct TranscodeRun {
    rx: mpsc::UnboundedReceiver<TranscodeUpdate>,
    finished: bool,
}

impl TranscodeRun {
    /// Create a run together with the sender the encoder side reports through
    pub fn channel() -> (mpsc::UnboundedSender<TranscodeUpdate>, TranscodeRun) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, TranscodeRun { rx, finished: false })
    }

    /// Next update, or `None` once the terminal outcome has been yielded
    ///
    /// If the encoder side goes away without reporting an outcome, the run
    /// ends with `TranscodeError::Interrupted`.
    pub async fn next(&mut self) -> Option<TranscodeUpdate> {
        if self.finished {
            return None;
        }
        match self.rx.recv().await {
            Some(TranscodeUpdate::Finished(result)) => {
                self.finished = true;
                Some(TranscodeUpdate::Finished(result))
            }
            Some(update) => Some(update),
            None => {
                self.finished = true;
                Some(TranscodeUpdate::Finished(Err(TranscodeError::Interrupted)))
            }
        }
    }
}

/// Boundary to the external transcoding tool
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Read container metadata; fails when the file is missing or not a video
    async fn probe(&self, input: &Path) -> Result<MediaInfo, ProbeError>;

    /// Start one encode of `input` into `output`
    fn transcode(
        &self,
        input: &Path,
        output: &Path,
        media: &MediaInfo,
        cancel: CancellationToken,
    ) -> TranscodeRun;
}

/// Transcoder backed by local ffmpeg/ffprobe binaries
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_bin: PathBuf,
    ffprobe_bin: PathBuf,
    video_codec: String,
    audio_codec: String,
}

impl FfmpegTranscoder {
    pub fn new(config: &OptimizerConfig) -> Self {
        Self {
            ffmpeg_bin: config.ffmpeg_bin.clone(),
            ffprobe_bin: config.ffprobe_bin.clone(),
            video_codec: config.video_codec.clone(),
            audio_codec: config.audio_codec.clone(),
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn probe(&self, input: &Path) -> Result<MediaInfo, ProbeError> {
        ffprobe::probe_file(&self.ffprobe_bin, input).await
    }

    fn transcode(
        &self,
        input: &Path,
        output: &Path,
        media: &MediaInfo,
        cancel: CancellationToken,
    ) -> TranscodeRun {
        let (tx, run) = TranscodeRun::channel();
        let args = CommandBuilder::new(&self.video_codec, &self.audio_codec)
            .build_encode_command(input, output);
        let ffmpeg_bin = self.ffmpeg_bin.clone();
        let output = output.to_path_buf();
        let duration = media.duration_secs;

        tokio::spawn(async move {
            let progress_tx = tx.clone();
            let result = ffmpeg::run_encode(&ffmpeg_bin, args, &output, duration, &cancel, |percent| {
                let _ = progress_tx.send(TranscodeUpdate::Progress(percent));
            })
            .await;
            let _ = tx.send(TranscodeUpdate::Finished(result));
        });

        run
    }
}

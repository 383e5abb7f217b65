use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::error::TranscodeError;

/// Number of stderr lines kept for error reports
const STDERR_TAIL_LINES: usize = 20;

/// Command builder for generating FFmpeg command lines
pub struct CommandBuilder {
    video_codec: String,
    audio_codec: String,
}

impl CommandBuilder {
    pub fn new(video_codec: impl Into<String>, audio_codec: impl Into<String>) -> Self {
        CommandBuilder {
            video_codec: video_codec.into(),
            audio_codec: audio_codec.into(),
        }
    }

    /// Build the normalizing encode command
    ///
    /// Progress is written as `key=value` blocks to stdout; stats on stderr
    /// are suppressed so stderr only carries warnings and errors.
    pub fn build_encode_command(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args = Vec::new();

        args.push("-hide_banner".to_string());
        args.push("-nostats".to_string());
        args.push("-loglevel".to_string());
        args.push("warning".to_string());
        args.push("-y".to_string());
        args.push("-progress".to_string());
        args.push("pipe:1".to_string());

        // Input file
        args.push("-i".to_string());
        args.push(input.to_string_lossy().to_string());

        // Codec pair
        args.push("-c:v".to_string());
        args.push(self.video_codec.clone());
        args.push("-c:a".to_string());
        args.push(self.audio_codec.clone());

        // Output file
        args.push(output.to_string_lossy().to_string());

        args
    }
}

/// What a single `-progress` line meant
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressLine {
    /// Field recorded, nothing to report yet
    Continue,
    /// End of a progress block, with percent complete
    Report(f64),
    /// ffmpeg announced the final block
    End,
}

/// Incremental parser for ffmpeg's `-progress` output
#[derive(Debug, Clone)]
pub struct ProgressParser {
    duration_secs: Option<f64>,
    out_time_secs: f64,
}

impl ProgressParser {
    pub fn new(duration_secs: Option<f64>) -> Self {
        ProgressParser {
            duration_secs: duration_secs.filter(|d| *d > 0.0),
            out_time_secs: 0.0,
        }
    }

    pub fn feed(&mut self, line: &str) -> ProgressLine {
        let Some((key, value)) = line.trim().split_once('=') else {
            return ProgressLine::Continue;
        };

        match key {
            // out_time_ms is reported in microseconds as well
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_secs = us.max(0) as f64 / 1_000_000.0;
                }
                ProgressLine::Continue
            }
            "out_time" => {
                if let Some(secs) = parse_timestamp(value) {
                    self.out_time_secs = secs;
                }
                ProgressLine::Continue
            }
            "progress" if value == "end" => ProgressLine::End,
            "progress" => match self.duration_secs {
                Some(total) => ProgressLine::Report(self.out_time_secs / total * 100.0),
                None => ProgressLine::Continue,
            },
            _ => ProgressLine::Continue,
        }
    }
}

/// Parse `HH:MM:SS.ffffff` into seconds
fn parse_timestamp(value: &str) -> Option<f64> {
    let mut parts = value.trim().splitn(3, ':');
    let hours = parts.next()?.parse::<f64>().ok()?;
    let minutes = parts.next()?.parse::<f64>().ok()?;
    let seconds = parts.next()?.parse::<f64>().ok()?;
    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    (total >= 0.0).then_some(total)
}

/// Run one ffmpeg encode, reporting progress until the process exits
///
/// The child is killed when `cancel` fires. On any failure the partially
/// written `output` is removed; the input is never touched.
pub async fn run_encode(
    ffmpeg_bin: &Path,
    args: Vec<String>,
    output: &Path,
    duration_secs: Option<f64>,
    cancel: &CancellationToken,
    mut on_progress: impl FnMut(f64),
) -> Result<(), TranscodeError> {
    debug!("Executing FFmpeg: {} {}", ffmpeg_bin.display(), args.join(" "));

    let mut child = Command::new(ffmpeg_bin)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| TranscodeError::Spawn {
            bin: ffmpeg_bin.to_path_buf(),
            source,
        })?;

    let result = drive_child(&mut child, duration_secs, cancel, &mut on_progress).await;

    if let Err(e) = &result {
        warn!("FFmpeg did not finish {}: {}", output.display(), e);
        if let Err(rm) = tokio::fs::remove_file(output).await {
            debug!("No partial output removed for {}: {}", output.display(), rm);
        }
    } else {
        info!("FFmpeg execution completed successfully");
    }

    result
}

async fn drive_child(
    child: &mut Child,
    duration_secs: Option<f64>,
    cancel: &CancellationToken,
    on_progress: &mut impl FnMut(f64),
) -> Result<(), TranscodeError> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("Failed to capture FFmpeg stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("Failed to capture FFmpeg stderr"))?;

    // Drain stderr concurrently so a chatty encoder never blocks on a full pipe
    let stderr_handle = tokio::spawn(async move {
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        Vec::from(tail).join("\n")
    });

    let mut parser = ProgressParser::new(duration_secs);
    let mut lines = BufReader::new(stdout).lines();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(TranscodeError::Cancelled);
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let ProgressLine::Report(percent) = parser.feed(&line) {
                        on_progress(percent);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = child.kill().await;
                    return Err(TranscodeError::Io(e));
                }
            }
        }
    }

    let status = tokio::select! {
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            return Err(TranscodeError::Cancelled);
        }
        status = child.wait() => status?,
    };

    let stderr = stderr_handle.await.unwrap_or_default();

    if !status.success() {
        return Err(TranscodeError::Failed {
            exit_code: status.code().unwrap_or(-1),
            stderr,
        });
    }

    Ok(())
}

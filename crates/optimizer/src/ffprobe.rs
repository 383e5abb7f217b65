use std::collections::HashMap;
use std::path::Path;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::ProbeError;

/// Complete ffprobe output structure
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeData {
    #[serde(default)]
    pub streams: Vec<FFProbeStream>,
    pub format: FFProbeFormat,
}

/// Format-level metadata from ffprobe
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeFormat {
    pub format_name: String,
    pub duration: Option<String>,
    pub bit_rate: Option<String>,
    pub size: Option<String>,
    pub tags: Option<HashMap<String, String>>,
}

/// Stream-level metadata from ffprobe
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeStream {
    pub index: i32,
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration: Option<String>,
}

/// The probe facts the engine and delivery step rely on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub format_name: String,
    /// Container duration in seconds, when ffprobe reports one
    pub duration_secs: Option<f64>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

impl MediaInfo {
    /// Summarize probe output; a container without a video stream is rejected
    pub fn from_probe(path: &Path, data: &FFProbeData) -> Result<Self, ProbeError> {
        let video = data
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| ProbeError::NoVideoStream(path.to_path_buf()))?;
        let audio = data
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("audio"));

        // Container duration first, fall back to the video stream
        let duration_secs = data
            .format
            .duration
            .as_deref()
            .or(video.duration.as_deref())
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0);

        Ok(MediaInfo {
            format_name: data.format.format_name.clone(),
            duration_secs,
            video_codec: video.codec_name.clone(),
            audio_codec: audio.and_then(|a| a.codec_name.clone()),
            width: video.width,
            height: video.height,
        })
    }
}

/// Parse ffprobe's JSON output
pub fn parse_probe_output(path: &Path, json: &str) -> Result<FFProbeData, ProbeError> {
    serde_json::from_str(json).map_err(|e| ProbeError::InvalidOutput {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Run ffprobe on a file and summarize the result
pub async fn probe_file(ffprobe_bin: &Path, file_path: &Path) -> Result<MediaInfo, ProbeError> {
    // Verify file exists before trying to probe
    if !tokio::fs::try_exists(file_path).await.unwrap_or(false) {
        return Err(ProbeError::Missing(file_path.to_path_buf()));
    }

    debug!("Executing FFprobe for: {}", file_path.display());

    let output = Command::new(ffprobe_bin)
        .arg("-v")
        .arg("error")
        .arg("-print_format")
        .arg("json")
        .arg("-show_streams")
        .arg("-show_format")
        .arg(file_path)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ProbeError::Spawn {
            bin: ffprobe_bin.to_path_buf(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProbeError::Failed {
            path: file_path.to_path_buf(),
            exit_code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let json_str = String::from_utf8(output.stdout).map_err(|_| ProbeError::InvalidOutput {
        path: file_path.to_path_buf(),
        reason: "FFprobe output is not valid UTF-8".to_string(),
    })?;

    let data = parse_probe_output(file_path, &json_str)?;
    debug!("FFprobe found {} stream(s) in {}", data.streams.len(), file_path.display());
    MediaInfo::from_probe(file_path, &data)
}

use std::path::Path;
use std::time::Duration;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::config::TelegramConfig;
use crate::error::DeliveryError;

/// Connection timeout for Bot API requests
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Boundary to the remote sink that receives finished files
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Upload one output file with a caption
    async fn deliver(&self, output: &Path, caption: &str) -> Result<(), DeliveryError>;
}

fn build_client(timeout_secs: u64) -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(CONNECTION_TIMEOUT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}

/// Bot API response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Delivery sink that posts videos to a Telegram chat
pub struct TelegramSink {
    client: Client,
    base_url: String,
    chat_id: String,
}

impl TelegramSink {
    /// Build a sink from configuration; `None` when credentials are missing
    pub fn from_config(config: &TelegramConfig) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        let token = config.bot_token.as_deref()?;
        let chat_id = config.chat_id.clone()?;

        let client = match build_client(config.timeout_secs) {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to build HTTP client, delivery disabled: {}", e);
                return None;
            }
        };

        Some(Self {
            client,
            base_url: format!("{}/bot{}", config.api_base.trim_end_matches('/'), token),
            chat_id,
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Check that the bot can see the target chat
    pub async fn verify(&self) -> Result<(), DeliveryError> {
        let response = self
            .client
            .get(self.url("getChat"))
            .query(&[("chat_id", &self.chat_id)])
            .send()
            .await
            .map_err(|e| DeliveryError::Unreachable(e.without_url().to_string()))?;
        check_response(response).await?;
        info!("✅ Telegram chat {} reachable", self.chat_id);
        Ok(())
    }
}

#[async_trait]
impl DeliverySink for TelegramSink {
    async fn deliver(&self, output: &Path, caption: &str) -> Result<(), DeliveryError> {
        let io_err = |source| DeliveryError::Io {
            path: output.to_path_buf(),
            source,
        };
        let file = tokio::fs::File::open(output).await.map_err(io_err)?;
        let len = file.metadata().await.map_err(io_err)?.len();

        let file_name = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());
        let mime = mime_guess::from_path(output).first_or_octet_stream();

        let video = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), len)
            .file_name(file_name)
            .mime_str(mime.essence_str())
            .map_err(|e| DeliveryError::Unreachable(e.to_string()))?;
        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .text("supports_streaming", "true")
            .part("video", video);

        debug!("Uploading {} ({} bytes) to Telegram", output.display(), len);
        let response = self
            .client
            .post(self.url("sendVideo"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| DeliveryError::Unreachable(e.without_url().to_string()))?;

        check_response(response).await?;
        info!("📤 Delivered {}", output.display());
        Ok(())
    }
}

async fn check_response(response: reqwest::Response) -> Result<(), DeliveryError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(DeliveryError::Unauthorized(status.as_u16()));
    }

    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body: describe(&body),
        });
    }

    match serde_json::from_str::<ApiResponse>(&body) {
        Ok(api) if api.ok => Ok(()),
        Ok(api) => Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body: api.description.unwrap_or_else(|| "request not ok".to_string()),
        }),
        Err(_) => Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body: describe(&body),
        }),
    }
}

/// Prefer the Bot API description over the raw body
fn describe(body: &str) -> String {
    serde_json::from_str::<ApiResponse>(body)
        .ok()
        .and_then(|api| api.description)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Remove the input and output files after a successful delivery
///
/// Both removals are attempted even if the first fails. Returns true only if
/// both files were removed; nothing is retried or restored.
pub async fn cleanup_files(input: &Path, output: &Path) -> bool {
    let mut all_removed = true;
    for path in [input, output] {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("🗑️  Deleted {}", path.display()),
            Err(e) => {
                warn!("Failed to delete {}: {}", path.display(), e);
                all_removed = false;
            }
        }
    }
    all_removed
}

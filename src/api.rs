use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::files::SelectedFile;

pub const CHAT_ENDPOINT: &str = "/chat";
pub const UPLOAD_ENDPOINT: &str = "/upload";
pub const DOCUMENTS_ENDPOINT: &str = "/documents";

/// Multipart field every uploaded file is sent under.
pub const UPLOAD_FIELD: &str = "files";

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub files: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentsReply {
    pub files: Vec<String>,
}

/// Anything that kept a request from producing a usable body.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error! status: {status}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The three server endpoints the client talks to.
#[async_trait]
pub trait DocChatApi: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, TransportError>;

    async fn upload(&self, files: &[SelectedFile]) -> Result<UploadReply, TransportError>;

    async fn documents(&self) -> Result<DocumentsReply, TransportError>;
}

pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration, connect_timeout: Duration) -> anyhow::Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.timeout_seconds),
            Duration::from_secs(config.connect_timeout_seconds),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn decode<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("{} returned {}: {}", endpoint, status, body);
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl DocChatApi for HttpApi {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, TransportError> {
        debug!("POST {} ({} chars)", CHAT_ENDPOINT, request.message.len());
        let response = self
            .client
            .post(self.url(CHAT_ENDPOINT))
            .json(request)
            .send()
            .await?;

        Self::decode(CHAT_ENDPOINT, response).await
    }

    async fn upload(&self, files: &[SelectedFile]) -> Result<UploadReply, TransportError> {
        let mut form = reqwest::multipart::Form::new();
        for file in files {
            let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                .file_name(file.name.clone())
                .mime_str(&file.media_type)?;
            form = form.part(UPLOAD_FIELD, part);
        }

        debug!("POST {} ({} files)", UPLOAD_ENDPOINT, files.len());
        let response = self
            .client
            .post(self.url(UPLOAD_ENDPOINT))
            .multipart(form)
            .send()
            .await?;

        Self::decode(UPLOAD_ENDPOINT, response).await
    }

    async fn documents(&self) -> Result<DocumentsReply, TransportError> {
        debug!("GET {}", DOCUMENTS_ENDPOINT);
        let response = self.client.get(self.url(DOCUMENTS_ENDPOINT)).send().await?;

        Self::decode(DOCUMENTS_ENDPOINT, response).await
    }
}

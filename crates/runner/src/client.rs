// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the mothership API.
//!
//! Every call uses a 30-second client timeout except artifact uploads,
//! which stream multipart bodies and rely on server-side limits.

use borg_core::consts::HTTP_CLIENT_TIMEOUT;
use borg_wire::{
    Ack, HeartbeatRequest, HeartbeatResponse, RegisterRequest, RegisterResponse, ScreenFramePost,
    ScreenInfo, ScreenStatus, StatusUpdateRequest, TaskDescriptor,
};
use std::path::Path;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Errors from API calls.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl ClientError {
    /// Transient failures feed the retry/fallback ladder; 4xx rejections
    /// do not.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ClientError::Io(_) => true,
            ClientError::Rejected { status, .. } => *status >= 500,
        }
    }
}

/// Typed wrapper over the mothership's REST surface.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    upload: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(base_addr: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(HTTP_CLIENT_TIMEOUT).build()?;
        // No hard cap on streamed uploads.
        let upload = reqwest::Client::builder().build()?;
        Ok(Self { http, upload, base: base_addr.trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base)
    }

    /// Base address (for the WebSocket dialer).
    pub fn base_addr(&self) -> &str {
        &self.base
    }

    async fn check<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ClientError::Rejected { status: status.as_u16(), message })
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse, ClientError> {
        let resp = self.http.post(self.url("/runners/register")).json(req).send().await?;
        Self::check(resp).await
    }

    pub async fn heartbeat(
        &self,
        runner_id: &str,
        req: &HeartbeatRequest,
    ) -> Result<HeartbeatResponse, ClientError> {
        let resp = self
            .http
            .post(self.url(&format!("/runners/{runner_id}/heartbeat")))
            .json(req)
            .send()
            .await?;
        Self::check(resp).await
    }

    /// Poll for the next task; `Ok(None)` is the expected idle answer.
    pub async fn next_task(&self, runner_id: &str) -> Result<Option<TaskDescriptor>, ClientError> {
        let resp = self
            .http
            .get(self.url(&format!("/runners/{runner_id}/tasks/next")))
            .send()
            .await?;
        Self::check(resp).await
    }

    pub async fn update_status(
        &self,
        task_id: &str,
        req: &StatusUpdateRequest,
    ) -> Result<Ack, ClientError> {
        let resp = self
            .http
            .post(self.url(&format!("/tasks/{task_id}/status")))
            .json(req)
            .send()
            .await?;
        Self::check(resp).await
    }

    pub async fn upload_result(
        &self,
        task_id: &str,
        result: &serde_json::Value,
    ) -> Result<Ack, ClientError> {
        let resp = self
            .http
            .post(self.url(&format!("/tasks/{task_id}/result")))
            .json(result)
            .send()
            .await?;
        Self::check(resp).await
    }

    /// Stream a file download into `dest`.
    pub async fn download_file(&self, file_id: &str, dest: &Path) -> Result<(), ClientError> {
        let mut resp = self
            .upload
            .get(self.url(&format!("/files/{file_id}/download")))
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(ClientError::Rejected { status, message });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }

    /// Multipart artifact upload: `{task_id, file}`.
    pub async fn upload_artifact(
        &self,
        task_id: &str,
        path: &Path,
    ) -> Result<(), ClientError> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());
        let form = reqwest::multipart::Form::new()
            .text("task_id", task_id.to_string())
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(filename));

        let resp = self
            .upload
            .post(self.url("/artifacts/upload"))
            .multipart(form)
            .send()
            .await?;
        let _: serde_json::Value = Self::check(resp).await?;
        Ok(())
    }

    pub async fn screen_status(&self, runner_id: &str) -> Result<ScreenStatus, ClientError> {
        let resp = self
            .http
            .get(self.url(&format!("/runners/{runner_id}/screen/status")))
            .send()
            .await?;
        Self::check(resp).await
    }

    /// Base64 JSON fallback for frame upload.
    pub async fn post_frame(
        &self,
        runner_id: &str,
        frame: &ScreenFramePost,
    ) -> Result<Ack, ClientError> {
        let resp = self
            .http
            .post(self.url(&format!("/runners/{runner_id}/screen/frame")))
            .json(frame)
            .send()
            .await?;
        Self::check(resp).await
    }

    /// Publish this host's monitor list.
    pub async fn publish_screens(
        &self,
        runner_id: &str,
        screens: &[ScreenInfo],
    ) -> Result<Ack, ClientError> {
        let resp = self
            .http
            .post(self.url(&format!("/runners/{runner_id}/screens")))
            .json(screens)
            .send()
            .await?;
        Self::check(resp).await
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

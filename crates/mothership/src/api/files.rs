// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File download and upload endpoints.
//!
//! Downloads stream straight from the blob store; uploads hash while the
//! multipart body streams in.

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use borg_core::{Artifact, ArtifactId, FileId, FileMeta, TaskId};
use chrono::Utc;
use tokio_util::io::ReaderStream;

use super::require_session;
use crate::error::ApiError;
use crate::server::AppState;

/// `GET /api/v1/files/:id/download` — streamed bytes with filename and
/// content-type headers.
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let file_id = FileId::new(id);
    let meta = state.store.get_file(&file_id)?;
    let file = state.blobs.get_file(file_id.as_str()).await?;

    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, meta.content_type)
        .header(header::CONTENT_LENGTH, meta.size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", meta.name.replace('"', "")),
        )
        .body(body)
        .map_err(|e| ApiError::new(borg_core::ErrorKind::Unavailable, e.to_string()))?;
    Ok(response)
}

#[derive(serde::Serialize)]
pub struct UploadFileResponse {
    pub file: FileMeta,
    pub success: bool,
}

/// `POST /api/v1/files/upload` — multipart `{file}`.
pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadFileResponse>), ApiError> {
    let user_id = require_session(&state, &headers)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid(format!("bad multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let content_type =
            field.content_type().unwrap_or("application/octet-stream").to_string();
        // Field bodies stream; buffering one field at a time is the
        // axum-blessed shape for multipart.
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::invalid(format!("upload read failed: {e}")))?;

        let file_id = FileId::generate();
        let saved = state.blobs.save_file(file_id.as_str(), bytes.as_ref()).await?;
        let meta = FileMeta {
            id: file_id,
            name,
            storage_path: saved.storage_path,
            size: saved.size,
            content_type,
            sha256: saved.sha256,
            uploaded_by: Some(user_id),
            created_at: Utc::now(),
        };
        state.store.add_file(meta.clone())?;
        tracing::info!(file_id = %meta.id, name = %meta.name, size = meta.size, "file uploaded");
        return Ok((StatusCode::CREATED, Json(UploadFileResponse { file: meta, success: true })));
    }

    Err(ApiError::invalid("multipart body missing a `file` field"))
}

#[derive(serde::Serialize)]
pub struct UploadArtifactResponse {
    pub artifact_id: ArtifactId,
    pub success: bool,
}

/// `POST /api/v1/artifacts/upload` — multipart `{task_id, file}`.
pub async fn upload_artifact(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadArtifactResponse>, ApiError> {
    let mut task_id: Option<TaskId> = None;
    let mut saved: Option<(String, String, borg_storage::SavedBlob, ArtifactId)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid(format!("bad multipart body: {e}")))?
    {
        match field.name() {
            Some("task_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::invalid(format!("bad task_id field: {e}")))?;
                task_id = Some(TaskId::new(text));
            }
            Some("file") => {
                let name = field.file_name().unwrap_or("artifact").to_string();
                let content_type =
                    field.content_type().unwrap_or("application/octet-stream").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::invalid(format!("upload read failed: {e}")))?;
                let artifact_id = ArtifactId::generate();
                let blob = state.blobs.save_artifact(artifact_id.as_str(), bytes.as_ref()).await?;
                saved = Some((name, content_type, blob, artifact_id));
            }
            _ => {}
        }
    }

    let task_id =
        task_id.ok_or_else(|| ApiError::invalid("multipart body missing `task_id`"))?;
    let (name, content_type, blob, artifact_id) =
        saved.ok_or_else(|| ApiError::invalid("multipart body missing `file`"))?;

    let artifact = Artifact {
        id: artifact_id.clone(),
        task_id,
        name,
        storage_path: blob.storage_path,
        size: blob.size,
        content_type,
        sha256: blob.sha256,
        created_at: Utc::now(),
    };
    state.store.add_artifact(artifact)?;

    Ok(Json(UploadArtifactResponse { artifact_id, success: true }))
}

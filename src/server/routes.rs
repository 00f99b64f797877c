//! Request handlers.

use super::AppState;
use crate::convert::render_slideshow;
use crate::error::SlideshowError;
use crate::workspace::{Workspace, VIDEO_FILE};
use axum::{
    body::{Body, Bytes},
    extract::{multipart::Field, Multipart, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use tokio::io::AsyncReadExt;
use tracing::{error, info};

const INDEX_HTML: &str = include_str!("index.html");

/// Body of every failed conversion. Details only go to the log.
pub const PROCESSING_ERROR: &str = "An error occurred during processing.";

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// GET / - upload form
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}

/// POST / - convert an uploaded `.docx` and send back the video
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return (e.status(), e.body_text()).into_response(),
        };
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if !filename.ends_with(".docx") {
            break;
        }

        return match convert_upload(&state, &filename, field).await {
            Ok(response) => response,
            Err(response) => response,
        };
    }

    index().await.into_response()
}

async fn convert_upload(
    state: &AppState,
    filename: &str,
    field: Field<'_>,
) -> Result<Response, Response> {
    let data = field
        .bytes()
        .await
        .map_err(|e| (e.status(), e.body_text()).into_response())?;

    info!("Received {} ({} bytes)", filename, data.len());

    let workspace = Workspace::create(state.config.workspace_root.as_deref())
        .map_err(|e| processing_error(&e))?;

    let (file, len) = match render_upload(state, &workspace, filename, &data).await {
        Ok(rendered) => rendered,
        Err(e) => {
            workspace.release().await;
            return Err(processing_error(&e));
        }
    };

    // The stream owns the workspace; it is released after the last chunk,
    // or dropped with the stream if the client goes away.
    let stream = futures::stream::try_unfold(
        (file, workspace),
        |(mut file, workspace)| async move {
            let mut buf = vec![0u8; READ_CHUNK_BYTES];
            let n = file.read(&mut buf).await?;
            if n == 0 {
                drop(file);
                workspace.release().await;
                return Ok::<_, std::io::Error>(None);
            }
            buf.truncate(n);
            Ok(Some((Bytes::from(buf), (file, workspace))))
        },
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, len)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", VIDEO_FILE),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| processing_error(&e))
}

/// Save the upload, render it and open the result for streaming.
async fn render_upload(
    state: &AppState,
    workspace: &Workspace,
    filename: &str,
    data: &[u8],
) -> Result<(tokio::fs::File, u64), SlideshowError> {
    let doc_path = workspace.upload_path(filename);
    tokio::fs::write(&doc_path, data)
        .await
        .map_err(|source| SlideshowError::WorkspaceFailed { source })?;

    let output = render_slideshow(&doc_path, workspace, &state.config).await?;

    let unreadable =
        |e: std::io::Error| SlideshowError::Internal(format!("cannot read rendered video: {e}"));
    let file = tokio::fs::File::open(&output.video_path)
        .await
        .map_err(unreadable)?;
    let len = file.metadata().await.map_err(unreadable)?.len();
    Ok((file, len))
}

fn processing_error(e: &dyn std::fmt::Display) -> Response {
    error!("Processing failed: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, PROCESSING_ERROR).into_response()
}

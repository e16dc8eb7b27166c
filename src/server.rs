//! HTTP surface: thin axum dispatch over the normalizer, store, layouts,
//! and exporter.
//!
//! Each request is handled independently; the only shared state is the
//! metadata store and the artifact directory. CPU-bound work (normalize,
//! PDF export) runs under `spawn_blocking`, and export carries a configured
//! timeout. A delete racing a concurrent view or export may make a record or
//! file disappear mid-render; that race is accepted and documented rather
//! than locked away.

use crate::config::CuratorConfig;
use crate::error::CuratorError;
use crate::export::export_pdf;
use crate::layout::{self, ViewKind};
use crate::normalize::{allowed_extension, normalize, sanitize_filename};
use crate::store::{ImageStore, NewRecord, parse_tags};
use axum::Json;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ImageStore>,
    pub config: Arc<CuratorConfig>,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .route("/images/{filename}", get(serve_artifact))
        .route("/zine", get(zine))
        .route("/newsletter", get(newsletter))
        .route("/portfolio", get(portfolio))
        .route("/export/{view_type}", get(export))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: CuratorConfig, store: ImageStore) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.upload_dir)?;
    let bind = config.bind.clone();
    let state = AppState {
        store: Arc::new(store),
        config: Arc::new(config),
    };
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(addr = %bind, "listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, CuratorError> {
    let records = state.store.list(None, None)?;
    let tags = state.store.tags()?;
    Ok(Html(layout::render_index(&records, &tags).into_string()))
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, CuratorError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut description: Option<String> = None;
    let mut tags_raw = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CuratorError::Validation(format!("malformed upload body: {}", e)))?
    {
        // Field name must be owned before the field itself is consumed.
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| CuratorError::Validation(format!("unreadable file field: {}", e)))?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("description") => {
                description = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| CuratorError::Validation(e.to_string()))?,
                );
            }
            Some("tags") => {
                tags_raw = field
                    .text()
                    .await
                    .map_err(|e| CuratorError::Validation(e.to_string()))?;
            }
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or_else(|| CuratorError::Validation("no file part".into()))?;
    if filename.is_empty() {
        return Err(CuratorError::Validation("no selected file".into()));
    }
    if allowed_extension(&filename).is_none() {
        return Err(CuratorError::Validation(format!(
            "file type not allowed: {}",
            sanitize_filename(&filename)
        )));
    }

    let upload_dir = state.config.upload_dir.clone();
    let bounds = state.config.image_bounds;
    let quality = state.config.jpeg_quality;
    let claimed = filename.clone();
    let normalized = tokio::task::spawn_blocking(move || {
        normalize(&bytes, &claimed, &upload_dir, bounds, quality)
    })
    .await
    .map_err(|e| CuratorError::Processing(e.to_string()))??;

    tracing::info!(
        artifact = %normalized.stored_filename,
        width = normalized.width,
        height = normalized.height,
        bytes = normalized.file_size,
        "stored normalized upload"
    );

    let record = state
        .store
        .insert(NewRecord {
            stored_filename: normalized.stored_filename.clone(),
            original_filename: sanitize_filename(&filename),
            description: description.filter(|d| !d.is_empty()),
            tags: parse_tags(&tags_raw),
            width: normalized.width,
            height: normalized.height,
            file_size: normalized.file_size,
            mime_type: Some("image/jpeg".to_string()),
        })
        .inspect_err(|_| {
            // Acknowledged orphan risk: the artifact stays on disk when the
            // record insert fails.
            tracing::warn!(artifact = %normalized.stored_filename, "insert failed, artifact orphaned");
        })?;

    Ok(Json(record.public_json()))
}

/// MIME type for serving a stored artifact, derived from the extension the
/// artifact was stored under.
fn mime_for(filename: &str) -> &'static str {
    match filename.rsplit_once('.').map(|(_, ext)| ext) {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

async fn serve_artifact(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, CuratorError> {
    // Stored names are UUID-generated; anything with path structure is bogus.
    if filename.contains(['/', '\\']) || filename.contains("..") {
        return Err(CuratorError::Validation("invalid filename".into()));
    }
    let path = state.config.upload_dir.join(&filename);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| CuratorError::NotFound(filename.clone()))?;
    Ok(([(header::CONTENT_TYPE, mime_for(&filename))], bytes))
}

async fn render_layout(state: &AppState, kind: ViewKind) -> Result<Html<String>, CuratorError> {
    let records = state.store.list(None, None)?;
    Ok(Html(layout::render_view(kind, &records).into_string()))
}

async fn zine(State(state): State<AppState>) -> Result<Html<String>, CuratorError> {
    render_layout(&state, ViewKind::Zine).await
}

async fn newsletter(State(state): State<AppState>) -> Result<Html<String>, CuratorError> {
    render_layout(&state, ViewKind::Newsletter).await
}

async fn portfolio(State(state): State<AppState>) -> Result<Html<String>, CuratorError> {
    render_layout(&state, ViewKind::Portfolio).await
}

async fn export(
    State(state): State<AppState>,
    Path(view_type): Path<String>,
) -> Result<impl IntoResponse, CuratorError> {
    let kind: ViewKind = view_type
        .parse()
        .map_err(|e: layout::UnknownView| CuratorError::Validation(e.to_string()))?;

    let records = state.store.list(None, None)?;
    let html = layout::render_view(kind, &records).into_string();
    let artifact_root = state.config.upload_dir.clone();
    let timeout_secs = state.config.export_timeout_secs;

    tracing::info!(view = kind.as_str(), records = records.len(), "starting PDF export");

    // The blocking task cannot be cancelled once started; on timeout it is
    // abandoned and its result discarded.
    let task = tokio::task::spawn_blocking(move || {
        export_pdf(&html, &[layout::BASE_CSS], &artifact_root)
    });
    let bytes = match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await {
        Err(_) => return Err(CuratorError::ExportTimeout(timeout_secs)),
        Ok(joined) => joined.map_err(|e| CuratorError::Processing(e.to_string()))??,
    };

    let disposition = format!(
        "attachment; filename=\"image-curator-{}.pdf\"",
        kind.as_str()
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

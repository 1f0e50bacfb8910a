use axum::{
    extract::{Multipart, State},
    routing::post,
    Router,
    Json,
    http::Method,
};
use std::sync::Arc;
use crate::{
    AppState,
    error::AppError,
    models::BatchReport,
    services::{
        batch::{process_batch, BatchOptions, Upload},
        excel::{HeaderLayout, SheetKind},
    },
};
use tower_http::cors::{CorsLayer, Any};

pub fn routes() -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/buca/compare", post(compare_workbooks))
        .layer(cors)
}

/// Multipart upload: one `sheet` text field, an optional `header_rows` field
/// (e.g. `1,3`) and any number of `files` parts.
async fn compare_workbooks(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<BatchReport>, AppError> {
    let start = std::time::Instant::now();
    let mut sheet: Option<SheetKind> = None;
    let mut layout = HeaderLayout::Detect;
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed upload: {}", e)))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("sheet") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Failed to read sheet field: {}", e)))?;
                sheet = Some(text.trim().parse()?);
            }
            Some("header_rows") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Failed to read header_rows field: {}", e)))?;
                layout = text.parse()?;
            }
            Some("files") => {
                let file_name = field.file_name().unwrap_or("upload.xlsx").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Failed to read {}: {}", file_name, e)))?;
                tracing::info!("Received {} ({}KB)", file_name, bytes.len() / 1024);
                uploads.push(Upload::new(file_name, bytes));
            }
            other => tracing::debug!("Ignoring multipart field {:?}", other),
        }
    }

    let sheet = sheet.ok_or_else(|| AppError::InvalidInput("No sheet selected".to_string()))?;
    if uploads.is_empty() {
        return Err(AppError::InvalidInput("No files provided".to_string()));
    }

    let options = BatchOptions::from_config(sheet, &state.config).with_layout(layout);
    let report = tokio::task::spawn_blocking(move || process_batch(uploads, &options))
        .await
        .map_err(|e| AppError::Internal(format!("Batch task failed: {}", e)))??;

    tracing::info!(
        "Compared {} files on {} in {:?} ({} warnings)",
        report.files.len(),
        sheet,
        start.elapsed(),
        report.warnings.len()
    );
    Ok(Json(report))
}

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};
use polars::prelude::PolarsError;
use serde_json::json;
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Sheet '{0}' not found")]
    MissingSheet(String),
    #[error("Workbook error: {0}")]
    Workbook(String),
    #[error("No header row found in sheet '{0}'")]
    NoHeader(String),
    #[error("Header row {row} of sheet '{sheet}' rejected: confidence {confidence:.2} below {threshold:.2}")]
    LowConfidenceHeader {
        sheet: String,
        row: usize,
        confidence: f64,
        threshold: f64,
    },
    #[error("DataFrame error: {0}")]
    DataFrame(#[from] PolarsError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidInput(_)
            | AppError::MissingSheet(_)
            | AppError::Workbook(_)
            | AppError::NoHeader(_)
            | AppError::LowConfidenceHeader { .. } => StatusCode::BAD_REQUEST,
            AppError::DataFrame(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

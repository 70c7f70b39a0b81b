//! Error types for the utility server

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use doc_convert::ConvertError;
use image_tools::ImageToolError;
use pdf_tools::PdfToolError;
use qr_tools::QrToolError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Message shown instead of internal failure details
const PROCESSING_MESSAGE: &str = "An error occurred while processing the file";

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Processing failed: {0}")]
    ProcessingError(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ServerError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg),
            ServerError::UnsupportedFormat(msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_FORMAT",
                msg,
            ),
            ServerError::ProcessingError(detail) => {
                error!("Processing error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PROCESSING_ERROR",
                    PROCESSING_MESSAGE.to_string(),
                )
            }
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<PdfToolError> for ServerError {
    fn from(err: PdfToolError) -> Self {
        match err {
            PdfToolError::ParseError(msg) => {
                ServerError::UnsupportedFormat(format!("Could not read PDF: {}", msg))
            }
            PdfToolError::UnsupportedImage(msg) => ServerError::UnsupportedFormat(msg),
            PdfToolError::InvalidRange(_) | PdfToolError::InvalidInput(_) => {
                ServerError::InvalidInput(err.to_string())
            }
            PdfToolError::OperationError(msg) => ServerError::ProcessingError(msg),
        }
    }
}

impl From<ImageToolError> for ServerError {
    fn from(err: ImageToolError) -> Self {
        match err {
            ImageToolError::Decode(_) | ImageToolError::UnknownFormat(_) => {
                ServerError::UnsupportedFormat(err.to_string())
            }
            ImageToolError::InvalidQuality(_) | ImageToolError::InvalidDimension => {
                ServerError::InvalidInput(err.to_string())
            }
            ImageToolError::Encode(msg) => ServerError::ProcessingError(msg),
        }
    }
}

impl From<QrToolError> for ServerError {
    fn from(err: QrToolError) -> Self {
        match err {
            QrToolError::Encode(msg) => ServerError::ProcessingError(msg),
            other => ServerError::InvalidInput(other.to_string()),
        }
    }
}

impl From<ConvertError> for ServerError {
    fn from(err: ConvertError) -> Self {
        if err.is_input_error() {
            ServerError::UnsupportedFormat(err.to_string())
        } else {
            ServerError::ProcessingError(err.to_string())
        }
    }
}

impl From<MultipartError> for ServerError {
    fn from(err: MultipartError) -> Self {
        ServerError::InvalidInput(format!("Malformed upload: {}", err.body_text()))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::ProcessingError(format!("I/O error: {}", err))
    }
}

impl From<zip::result::ZipError> for ServerError {
    fn from(err: zip::result::ZipError) -> Self {
        ServerError::ProcessingError(format!("Archive error: {}", err))
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServerError::ProcessingError(format!("Worker task failed: {}", err))
    }
}

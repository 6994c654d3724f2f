// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Content type sent with every sign-in response.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Body was not valid JSON or a required field was empty.
    #[error("Invalid data")]
    InvalidData,

    #[error("Invalid identity token: {0}")]
    InvalidToken(String),

    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

/// JSON error envelope
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: &'static str,
}

impl AppError {
    /// HTTP status and client-facing message for this error.
    ///
    /// Invalid input keeps a 200 status; clients branch on `status` in the body.
    pub fn status_and_message(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidData => (StatusCode::OK, "Invalid data"),
            AppError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AppError::ProviderUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Identity provider unavailable")
            }
            AppError::Database(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::InvalidData => {}
            AppError::InvalidToken(reason) => {
                tracing::warn!(reason = %reason, "Rejected sign-in token");
            }
            AppError::ProviderUnavailable(reason) => {
                tracing::error!(reason = %reason, "Identity provider unavailable");
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
            }
        }

        let (status, message) = self.status_and_message();
        let body = ErrorResponse {
            status: "error",
            message,
        };

        (status, [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use google_signin::error::AppError;

#[test]
fn test_status_and_message_mapping() {
    assert_eq!(
        AppError::InvalidData.status_and_message(),
        (StatusCode::OK, "Invalid data")
    );
    assert_eq!(
        AppError::InvalidToken("expired".to_string()).status_and_message(),
        (StatusCode::UNAUTHORIZED, "Invalid token")
    );
    assert_eq!(
        AppError::ProviderUnavailable("timeout".to_string()).status_and_message(),
        (StatusCode::SERVICE_UNAVAILABLE, "Identity provider unavailable")
    );
    assert_eq!(
        AppError::Database("disk I/O error".to_string()).status_and_message(),
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    );
    assert_eq!(
        AppError::Internal(anyhow::anyhow!("boom")).status_and_message(),
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    );
}

#[tokio::test]
async fn test_error_details_not_leaked() {
    let response = AppError::Database("no such table: users".to_string()).into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json; charset=UTF-8"
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(
        std::str::from_utf8(&bytes).unwrap(),
        r#"{"status":"error","message":"Internal error"}"#
    );
}

#[test]
fn test_sqlx_error_maps_to_database() {
    let err: AppError = sqlx::Error::RowNotFound.into();
    assert!(matches!(err, AppError::Database(_)));
}

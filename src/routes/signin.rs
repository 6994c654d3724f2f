// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google sign-in route.
//!
//! Clients post the ID token they received from Google together with the
//! profile fields they display. The token is verified, then the user is
//! looked up by email and created on first sign-in.

use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result, JSON_CONTENT_TYPE};
use crate::models::NewUser;
use crate::services::{OidcError, VerifiedIdentity};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/google", post(google_sign_in))
}

/// Sign-in payload as sent by the client.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    #[validate(required, length(min = 1))]
    pub id_token: Option<String>,
    #[validate(required, length(min = 1))]
    pub email: Option<String>,
    pub google_id: Option<String>,
    pub name: Option<String>,
    pub photo_url: Option<String>,
}

/// Successful sign-in response.
#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub status: &'static str,
    pub user: SignInUser,
}

/// Profile returned to the client.
///
/// `name`, `email` and `profile_pic` echo the request, not the stored row.
#[derive(Debug, Serialize)]
pub struct SignInUser {
    pub id: i64,
    pub name: Option<String>,
    pub email: String,
    pub profile_pic: Option<String>,
}

/// Verify the posted ID token, then find or create the user by email.
async fn google_sign_in(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response> {
    let request: SignInRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, "Unparseable sign-in body");
        AppError::InvalidData
    })?;

    request.validate().map_err(|e| {
        tracing::debug!(error = %e, "Sign-in payload failed validation");
        AppError::InvalidData
    })?;

    let (Some(id_token), Some(email)) = (request.id_token.as_deref(), request.email.as_deref())
    else {
        return Err(AppError::InvalidData);
    };

    let identity = state
        .id_token_verifier
        .verify(id_token)
        .await
        .map_err(|err| match err {
            OidcError::Rejected(reason) => AppError::InvalidToken(reason),
            OidcError::Transient(reason) => AppError::ProviderUnavailable(reason),
        })?;

    check_identity_matches(&identity, email, request.google_id.as_deref())?;

    let new_user = NewUser {
        google_id: non_empty(request.google_id.as_deref()).or(Some(identity.subject)),
        name: non_empty(request.name.as_deref()).or(identity.name),
        email: email.to_string(),
        profile_pic: non_empty(request.photo_url.as_deref()).or(identity.picture),
    };

    let (user, created) = state.db.find_or_create_user(&new_user).await?;

    tracing::info!(user_id = user.id, created, "Google sign-in");

    let response = SignInResponse {
        status: "success",
        user: SignInUser {
            id: user.id,
            name: request.name,
            email: email.to_string(),
            profile_pic: request.photo_url,
        },
    };

    Ok(([(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], Json(response)).into_response())
}

/// Ensure the verified token speaks for the submitted account.
fn check_identity_matches(
    identity: &VerifiedIdentity,
    email: &str,
    google_id: Option<&str>,
) -> Result<()> {
    if !identity.email_verified {
        return Err(AppError::InvalidToken(
            "email_verified claim is not true".to_string(),
        ));
    }

    match identity.email.as_deref() {
        Some(claimed) if claimed == email => {}
        Some(_) => {
            return Err(AppError::InvalidToken(
                "email claim does not match submitted email".to_string(),
            ));
        }
        None => {
            return Err(AppError::InvalidToken("missing email claim".to_string()));
        }
    }

    if let Some(google_id) = non_empty(google_id) {
        if google_id != identity.subject {
            return Err(AppError::InvalidToken(
                "sub claim does not match submitted googleId".to_string(),
            ));
        }
    }

    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request, Response};
use google_signin::config::Config;
use google_signin::db::SqliteDb;
use google_signin::routes::create_router;
use google_signin::services::GoogleIdTokenVerifier;
use google_signin::AppState;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// `kid` the static test verifier trusts.
pub const TEST_KID: &str = "test-signing-key";

#[allow(dead_code)]
pub const TEST_PRIVATE_KEY: &[u8] = include_bytes!("../fixtures/test_rsa_private.pem");
#[allow(dead_code)]
pub const TEST_PUBLIC_KEY: &[u8] = include_bytes!("../fixtures/test_rsa_public.pem");
#[allow(dead_code)]
pub const TEST_JWKS: &str = include_str!("../fixtures/test_jwks.json");
#[allow(dead_code)]
pub const UNTRUSTED_PRIVATE_KEY: &[u8] = include_bytes!("../fixtures/untrusted_rsa_private.pem");

/// Create a test app over an in-memory database and a static-key verifier.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub async fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let db = SqliteDb::in_memory()
        .await
        .expect("Failed to open in-memory database");
    db.ensure_schema().await.expect("Failed to create schema");

    create_test_app_with_db(db)
}

/// Create a test app over the given database.
#[allow(dead_code)]
pub fn create_test_app_with_db(db: SqliteDb) -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();

    let decoding_key =
        DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY).expect("Invalid test public key");
    let id_token_verifier = GoogleIdTokenVerifier::new_with_static_key(&config, TEST_KID, decoding_key)
        .expect("Failed to build static verifier");

    build_test_app(config, db, id_token_verifier)
}

/// Create a test app over an in-memory database and the given verifier.
#[allow(dead_code)]
pub async fn create_test_app_with_verifier(
    id_token_verifier: GoogleIdTokenVerifier,
) -> (axum::Router, Arc<AppState>) {
    let db = SqliteDb::in_memory()
        .await
        .expect("Failed to open in-memory database");
    db.ensure_schema().await.expect("Failed to create schema");

    build_test_app(Config::test_default(), db, id_token_verifier)
}

fn build_test_app(
    config: Config,
    db: SqliteDb,
    id_token_verifier: GoogleIdTokenVerifier,
) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState {
        config,
        db,
        id_token_verifier: Arc::new(id_token_verifier),
    });

    (create_router(state.clone()), state)
}

#[allow(dead_code)]
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Standard Google ID token claims for `email`, valid for an hour.
#[allow(dead_code)]
pub fn google_claims(config: &Config, email: &str, sub: &str) -> Value {
    let now = now_secs();
    json!({
        "iss": "https://accounts.google.com",
        "aud": config.google_client_ids[0],
        "sub": sub,
        "email": email,
        "email_verified": true,
        "name": "Token Name",
        "picture": "https://lh3.googleusercontent.com/a/token-picture",
        "iat": now,
        "exp": now + 3600,
    })
}

/// Sign arbitrary claims with the given RSA key and `kid`.
#[allow(dead_code)]
pub fn sign_claims(claims: &Value, private_key: &[u8], kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());

    encode(
        &header,
        claims,
        &EncodingKey::from_rsa_pem(private_key).expect("Invalid test private key"),
    )
    .expect("Failed to sign test ID token")
}

/// A valid ID token for `email`, trusted by the test verifier.
#[allow(dead_code)]
pub fn create_test_id_token(config: &Config, email: &str, sub: &str) -> String {
    sign_claims(&google_claims(config, email, sub), TEST_PRIVATE_KEY, TEST_KID)
}

/// Build a POST to the sign-in endpoint with a raw body.
#[allow(dead_code)]
pub fn sign_in_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/auth/google")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

/// Collect a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Sign-In API Server
//!
//! Verifies Google ID tokens posted by clients and finds or creates the
//! matching user record.

use anyhow::Context;
use google_signin::{
    config::Config, db::SqliteDb, services::GoogleIdTokenVerifier, AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(port = config.port, "Starting Google Sign-In API");

    // Open the user store
    let db = SqliteDb::connect(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to open user database")?;
    db.ensure_schema()
        .await
        .context("Failed to create users table")?;

    let id_token_verifier = Arc::new(
        GoogleIdTokenVerifier::new(&config).context("Failed to initialize ID token verifier")?,
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        id_token_verifier,
    });

    // Build router
    let app = google_signin::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("google_signin=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();

    Ok(())
}

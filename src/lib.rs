// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Google Sign-In backend
//!
//! Accepts a Google ID token plus profile fields from a client, verifies the
//! token, and finds or creates the matching user record.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::SqliteDb;
use services::GoogleIdTokenVerifier;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: SqliteDb,
    pub id_token_verifier: Arc<GoogleIdTokenVerifier>,
}

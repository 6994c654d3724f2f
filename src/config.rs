// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup and passed around inside `AppState`.

use std::env;

/// Default SQLite database location for local runs.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/users.db";
const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_PORT: u16 = 8080;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// OAuth client IDs accepted as the `aud` claim of Google ID tokens
    pub google_client_ids: Vec<String>,
    /// SQLite connection URL
    pub database_url: String,
    /// Upper bound on pooled database connections
    pub database_max_connections: u32,
    /// Server port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from a variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let google_client_ids = parse_client_ids(
            &lookup("GOOGLE_CLIENT_IDS").ok_or(ConfigError::Missing("GOOGLE_CLIENT_IDS"))?,
        );
        if google_client_ids.is_empty() {
            return Err(ConfigError::Invalid(
                "GOOGLE_CLIENT_IDS",
                "at least one client ID is required".to_string(),
            ));
        }

        Ok(Self {
            google_client_ids,
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            database_max_connections: parse_or_default(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_DATABASE_MAX_CONNECTIONS,
            )?,
            port: parse_or_default(&lookup, "PORT", DEFAULT_PORT)?,
        })
    }

    /// Deterministic config for tests.
    pub fn test_default() -> Self {
        Self {
            google_client_ids: vec!["test-client.apps.googleusercontent.com".to_string()],
            database_url: "sqlite::memory:".to_string(),
            database_max_connections: 1,
            port: 8080,
        }
    }
}

/// Parse `name` if set, otherwise use `default`. Unparseable values are errors.
fn parse_or_default<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::Invalid(name, format!("{raw:?}: {e}"))),
        None => Ok(default),
    }
}

/// Split a comma-separated client ID list, dropping blanks.
fn parse_client_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

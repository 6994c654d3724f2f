// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQLite client wrapper with typed user operations.
//!
//! Connections are checked out of the pool per statement and returned when
//! the statement future completes or is dropped.

use crate::db::tables;
use crate::error::AppError;
use crate::models::{NewUser, User};
use crate::time_utils::format_utc_rfc3339;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

const USER_COLUMNS: &str = "id, google_id, name, email, profile_pic, created_at";

/// SQLite database client.
#[derive(Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Open a pool for `database_url`, creating the database file if needed.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::Database(format!("Invalid DATABASE_URL: {}", e)))?
            .create_if_missing(true);

        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Database(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let max_connections = max_connections.max(1);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database: {}", e)))?;

        tracing::info!(
            url = database_url,
            max_connections,
            "Connected to SQLite"
        );

        Ok(Self { pool })
    }

    /// Open a private in-memory database.
    ///
    /// The pool holds exactly one connection that never expires, since the
    /// database disappears with its last connection.
    pub async fn in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await
            .map_err(|e| AppError::Database(format!("Failed to open in-memory database: {}", e)))?;

        Ok(Self { pool })
    }

    /// Create the users table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), AppError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                google_id TEXT,
                name TEXT,
                email TEXT NOT NULL UNIQUE,
                profile_pic TEXT,
                created_at TEXT NOT NULL
            )",
            tables::USERS
        );

        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by exact email match.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE email = ?",
            USER_COLUMNS,
            tables::USERS
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    /// Insert a new user unless the email already exists.
    ///
    /// Returns the stored row, or `None` when another row already holds the
    /// email.
    pub async fn insert_user(&self, user: &NewUser) -> Result<Option<User>, AppError> {
        let sql = format!(
            "INSERT INTO {} (google_id, name, email, profile_pic, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(email) DO NOTHING
             RETURNING {}",
            tables::USERS,
            USER_COLUMNS
        );

        let user = self
            .bind_new_user(&sql, user)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    fn bind_new_user<'q>(
        &self,
        sql: &'q str,
        user: &'q NewUser,
    ) -> sqlx::query::QueryAs<'q, sqlx::Sqlite, User, sqlx::sqlite::SqliteArguments<'q>> {
        sqlx::query_as::<_, User>(sql)
            .bind(user.google_id.as_deref())
            .bind(user.name.as_deref())
            .bind(user.email.as_str())
            .bind(user.profile_pic.as_deref())
            .bind(format_utc_rfc3339(chrono::Utc::now()))
    }

    /// Look up a user by email, inserting `user` if none exists.
    ///
    /// Returns the stored row and whether it was created by this call. When a
    /// concurrent caller inserts the same email first, its row is returned.
    pub async fn find_or_create_user(&self, user: &NewUser) -> Result<(User, bool), AppError> {
        if let Some(existing) = self.find_user_by_email(&user.email).await? {
            return Ok((existing, false));
        }

        if let Some(created) = self.insert_user(user).await? {
            tracing::info!(user_id = created.id, "Created user");
            return Ok((created, true));
        }

        tracing::debug!("Lost insert race, re-reading existing user");
        let existing = self.find_user_by_email(&user.email).await?.ok_or_else(|| {
            AppError::Database("User vanished after email conflict".to_string())
        })?;
        Ok((existing, false))
    }

    /// Number of stored users.
    pub async fn count_users(&self) -> Result<i64, AppError> {
        let sql = format!("SELECT COUNT(*) FROM {}", tables::USERS);

        let count = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

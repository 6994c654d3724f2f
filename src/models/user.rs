//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// User record stored in the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Store-generated identifier
    pub id: i64,
    /// Google account subject (`sub` claim)
    pub google_id: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Email address (unique)
    pub email: String,
    /// Profile picture URL
    pub profile_pic: Option<String>,
    /// When the user first signed in (RFC 3339, UTC)
    pub created_at: String,
}

/// Fields for a user that has not been stored yet.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub google_id: Option<String>,
    pub name: Option<String>,
    pub email: String,
    pub profile_pic: Option<String>,
}

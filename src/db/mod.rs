//! Database layer (SQLite via sqlx).

pub mod sqlite;

pub use sqlite::SqliteDb;

/// Table names as constants.
pub mod tables {
    pub const USERS: &str = "users";
}

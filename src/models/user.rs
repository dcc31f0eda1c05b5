// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'users' table in the database.
/// Owned by the account service; this service only reads it to resolve
/// display names for attempts and the leaderboard.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique email, used as the student identity across the system.
    pub email: String,

    pub name: String,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

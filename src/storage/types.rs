use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors
///
/// `Duplicate` is split out from the generic case because uniqueness
/// rejections are the steady state for re-polled feeds and callers treat
/// them as a silent skip rather than a failure.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A UNIQUE constraint rejected the write
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// The targeted row does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Stored data could not be decoded
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Classify a sqlx error, separating UNIQUE violations from everything else
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return DatabaseError::Duplicate(db_err.message().to_string());
            }
        }
        DatabaseError::Other(err)
    }

    /// True for the expected uniqueness rejection
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DatabaseError::Duplicate(_))
    }
}

// ============================================================================
// Timestamp helpers
// ============================================================================

/// Timestamps are stored as unix seconds
pub(crate) fn to_unix(ts: DateTime<Utc>) -> i64 {
    ts.timestamp()
}

pub(crate) fn from_unix(secs: i64) -> Result<DateTime<Utc>, DatabaseError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| DatabaseError::Corrupt(format!("timestamp out of range: {}", secs)))
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub name: String,
}

impl UserRow {
    pub(crate) fn into_user(self) -> Result<User, DatabaseError> {
        Ok(User {
            id: self.id,
            created_at: from_unix(self.created_at)?,
            updated_at: from_unix(self.updated_at)?,
            name: self.name,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedRow {
    pub id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub last_fetched_at: Option<i64>,
}

impl FeedRow {
    pub(crate) fn into_feed(self) -> Result<Feed, DatabaseError> {
        Ok(Feed {
            id: self.id,
            created_at: from_unix(self.created_at)?,
            updated_at: from_unix(self.updated_at)?,
            name: self.name,
            url: self.url,
            user_id: self.user_id,
            last_fetched_at: self.last_fetched_at.map(from_unix).transpose()?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PostRow {
    pub id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub title: String,
    pub url: String,
    pub description: String,
    pub published_at: i64,
    pub feed_id: Uuid,
}

impl PostRow {
    pub(crate) fn into_post(self) -> Result<Post, DatabaseError> {
        Ok(Post {
            id: self.id,
            created_at: from_unix(self.created_at)?,
            updated_at: from_unix(self.updated_at)?,
            title: self.title,
            url: self.url,
            description: self.description,
            published_at: from_unix(self.published_at)?,
            feed_id: self.feed_id,
        })
    }
}

// ============================================================================
// Data Structures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
}

/// A subscribed feed source tracked for polling
///
/// `last_fetched_at` stays `None` until the first poll attempt and never
/// moves backwards afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// Feed listing entry joined with the name of the user who added it
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FeedWithCreator {
    pub name: String,
    pub url: String,
    pub created_by: String,
}

/// A follow relationship, resolved to display names
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FeedFollow {
    pub id: Uuid,
    pub user_name: String,
    pub feed_name: String,
}

/// A persisted syndication item. Unique per (feed_id, url).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub url: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub feed_id: Uuid,
}

/// Candidate post built by ingestion before the insert is attempted
#[derive(Debug, Clone)]
pub struct NewPost {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub url: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub feed_id: Uuid,
}

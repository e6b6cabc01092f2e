use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::schema::Database;
use super::types::{to_unix, DatabaseError, Feed, FeedRow, FeedWithCreator};

const FEED_COLUMNS: &str = "id, created_at, updated_at, name, url, user_id, last_fetched_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Register a new feed owned by `user_id`. Feed URLs are unique.
    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        user_id: Uuid,
    ) -> Result<Feed, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        insert_feed(&mut conn, name, url, user_id).await
    }

    pub async fn get_feed(&self, feed_id: Uuid) -> Result<Option<Feed>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"
        ))
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FeedRow::into_feed).transpose()
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE url = ?"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FeedRow::into_feed).transpose()
    }

    /// Every feed with the name of the user who added it, ordered by feed name
    pub async fn list_feeds_with_creators(&self) -> Result<Vec<FeedWithCreator>, DatabaseError> {
        let feeds = sqlx::query_as::<_, FeedWithCreator>(
            r#"
            SELECT f.name, f.url, u.name AS created_by
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.name, f.url
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(feeds)
    }

    // ========================================================================
    // Poll Scheduling
    // ========================================================================

    /// The feed most overdue for a refresh.
    ///
    /// Never-fetched feeds (NULL `last_fetched_at`) come first, then the
    /// oldest fetch. Ties fall back to creation order so the rotation is
    /// deterministic. Returns `None` when no feeds exist.
    pub async fn next_feed_to_fetch(&self) -> Result<Option<Feed>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            r#"
            SELECT {FEED_COLUMNS}
            FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC, id ASC
            LIMIT 1
        "#
        ))
        .fetch_optional(&self.pool)
        .await?;

        row.map(FeedRow::into_feed).transpose()
    }

    /// Record a poll attempt for a feed.
    ///
    /// The stored timestamp never decreases: an `at` older than the current
    /// value leaves the row unchanged. Fails with `NotFound` if the feed is gone.
    pub async fn mark_feed_fetched(
        &self,
        feed_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let at = to_unix(at);
        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = MAX(COALESCE(last_fetched_at, ?1), ?1),
                updated_at = MAX(updated_at, ?1)
            WHERE id = ?2
        "#,
        )
        .bind(at)
        .bind(feed_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound("feed"));
        }
        Ok(())
    }
}

pub(super) async fn insert_feed(
    conn: &mut SqliteConnection,
    name: &str,
    url: &str,
    user_id: Uuid,
) -> Result<Feed, DatabaseError> {
    let now = to_unix(Utc::now());
    let row = sqlx::query_as::<_, FeedRow>(&format!(
        r#"
        INSERT INTO feeds (id, created_at, updated_at, name, url, user_id)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING {FEED_COLUMNS}
    "#
    ))
    .bind(Uuid::new_v4())
    .bind(now)
    .bind(now)
    .bind(name)
    .bind(url)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(DatabaseError::from_sqlx)?;

    row.into_feed()
}

use uuid::Uuid;

use super::schema::Database;
use super::types::{to_unix, DatabaseError, NewPost, Post, PostRow};

/// Maximum number of posts any listing returns
const MAX_POSTS: i64 = 2000;

const POST_COLUMNS: &str =
    "p.id, p.created_at, p.updated_at, p.title, p.url, p.description, p.published_at, p.feed_id";

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert one post.
    ///
    /// This is a plain INSERT: an existing (feed_id, url) pair is reported as
    /// [`DatabaseError::Duplicate`] so the caller can tell the expected
    /// re-poll case apart from real failures (foreign key, NOT NULL, I/O),
    /// which come back as [`DatabaseError::Other`].
    pub async fn insert_post(&self, post: &NewPost) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, created_at, updated_at, title, url, description, published_at, feed_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(post.id)
        .bind(to_unix(post.created_at))
        .bind(to_unix(post.updated_at))
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(to_unix(post.published_at))
        .bind(post.feed_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    /// Newest posts across the feeds a user follows
    pub async fn posts_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Post>, DatabaseError> {
        let limit = limit.clamp(0, MAX_POSTS);
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts p
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at DESC, p.created_at DESC
            LIMIT ?
        "#
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PostRow::into_post).collect()
    }

    /// All posts of one feed, newest first
    pub async fn posts_for_feed(&self, feed_id: Uuid) -> Result<Vec<Post>, DatabaseError> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts p
            WHERE p.feed_id = ?
            ORDER BY p.published_at DESC, p.created_at DESC
            LIMIT ?
        "#
        ))
        .bind(feed_id)
        .bind(MAX_POSTS)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PostRow::into_post).collect()
    }
}

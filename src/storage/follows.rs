use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::feeds::insert_feed;
use super::schema::Database;
use super::types::{to_unix, DatabaseError, Feed, FeedFollow};

impl Database {
    // ========================================================================
    // Follow Operations
    // ========================================================================

    /// Subscribe a user to a feed.
    ///
    /// Returns the follow with user and feed names resolved. Following the
    /// same feed twice yields `Duplicate`.
    pub async fn create_feed_follow(
        &self,
        user_id: Uuid,
        feed_id: Uuid,
    ) -> Result<FeedFollow, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let follow = insert_follow(&mut tx, user_id, feed_id).await?;
        tx.commit().await?;
        Ok(follow)
    }

    /// Register a feed and subscribe its creator to it, all or nothing.
    pub async fn create_feed_with_follow(
        &self,
        name: &str,
        url: &str,
        user_id: Uuid,
    ) -> Result<(Feed, FeedFollow), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let feed = insert_feed(&mut tx, name, url, user_id).await?;
        let follow = insert_follow(&mut tx, user_id, feed.id).await?;
        tx.commit().await?;
        Ok((feed, follow))
    }

    /// Follows of one user, ordered by feed name
    pub async fn feed_follows_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<FeedFollow>, DatabaseError> {
        let follows = sqlx::query_as::<_, FeedFollow>(
            r#"
            SELECT ff.id, u.name AS user_name, f.name AS feed_name
            FROM feed_follows ff
            JOIN users u ON u.id = ff.user_id
            JOIN feeds f ON f.id = ff.feed_id
            WHERE ff.user_id = ?
            ORDER BY f.name
        "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(follows)
    }

    /// Remove a user's follow of the feed at `url`, returns rows removed
    pub async fn unfollow_feed_by_url(
        &self,
        user_id: Uuid,
        url: &str,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            DELETE FROM feed_follows
            WHERE user_id = ?
              AND feed_id IN (SELECT id FROM feeds WHERE url = ?)
        "#,
        )
        .bind(user_id)
        .bind(url)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

async fn insert_follow(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    feed_id: Uuid,
) -> Result<FeedFollow, DatabaseError> {
    let now = to_unix(Utc::now());
    let follow_id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO feed_follows (id, created_at, updated_at, user_id, feed_id)
        VALUES (?, ?, ?, ?, ?)
    "#,
    )
    .bind(follow_id)
    .bind(now)
    .bind(now)
    .bind(user_id)
    .bind(feed_id)
    .execute(&mut *conn)
    .await
    .map_err(DatabaseError::from_sqlx)?;

    let follow = sqlx::query_as::<_, FeedFollow>(
        r#"
        SELECT ff.id, u.name AS user_name, f.name AS feed_name
        FROM feed_follows ff
        JOIN users u ON u.id = ff.user_id
        JOIN feeds f ON f.id = ff.feed_id
        WHERE ff.id = ?
    "#,
    )
    .bind(follow_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(follow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_follow_unfollow_roundtrip() {
        let db = Database::open(":memory:").await.unwrap();
        let owner = db.create_user("owner").await.unwrap();
        let reader = db.create_user("reader").await.unwrap();
        let feed = db
            .create_feed("Tech", "https://tech.example.com/rss", owner.id)
            .await
            .unwrap();

        let follow = db.create_feed_follow(reader.id, feed.id).await.unwrap();
        assert_eq!(follow.user_name, "reader");
        assert_eq!(follow.feed_name, "Tech");

        let err = db.create_feed_follow(reader.id, feed.id).await.unwrap_err();
        assert!(err.is_duplicate());

        assert_eq!(db.feed_follows_for_user(reader.id).await.unwrap().len(), 1);
        assert!(db.feed_follows_for_user(owner.id).await.unwrap().is_empty());

        let removed = db
            .unfollow_feed_by_url(reader.id, "https://tech.example.com/rss")
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(db.feed_follows_for_user(reader.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_feed_with_follow() {
        let db = Database::open(":memory:").await.unwrap();
        let owner = db.create_user("owner").await.unwrap();

        let (feed, follow) = db
            .create_feed_with_follow("Tech", "https://tech.example.com/rss", owner.id)
            .await
            .unwrap();
        assert_eq!(follow.user_name, "owner");
        assert_eq!(follow.feed_name, "Tech");
        assert_eq!(db.feed_follows_for_user(owner.id).await.unwrap().len(), 1);
        assert_eq!(db.get_feed(feed.id).await.unwrap(), Some(feed));
    }

    #[tokio::test]
    async fn test_create_feed_with_follow_rolls_back_feed() {
        let db = Database::open(":memory:").await.unwrap();
        let owner = db.create_user("owner").await.unwrap();
        sqlx::query(
            r#"
            CREATE TRIGGER reject_follows BEFORE INSERT ON feed_follows
            BEGIN SELECT RAISE(ABORT, 'follows disabled'); END
        "#,
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let result = db
            .create_feed_with_follow("Tech", "https://tech.example.com/rss", owner.id)
            .await;
        assert!(result.is_err());
        assert!(db
            .get_feed_by_url("https://tech.example.com/rss")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unfollow_unknown_url_removes_nothing() {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("reader").await.unwrap();
        let removed = db
            .unfollow_feed_by_url(user.id, "https://missing.example.com/rss")
            .await
            .unwrap();
        assert_eq!(removed, 0);
    }
}

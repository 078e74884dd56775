use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{DatabaseError, FeedFollow};

#[derive(sqlx::FromRow)]
struct FeedFollowRow {
    id: i64,
    user_id: i64,
    feed_id: i64,
    user_name: String,
    feed_name: String,
}

impl From<FeedFollowRow> for FeedFollow {
    fn from(row: FeedFollowRow) -> Self {
        FeedFollow {
            id: row.id,
            user_id: row.user_id,
            feed_id: row.feed_id,
            user_name: row.user_name,
            feed_name: row.feed_name,
        }
    }
}

impl Database {
    // ========================================================================
    // Follow Operations
    // ========================================================================

    /// Make `user_id` follow `feed_id`. Following twice yields `DatabaseError::Conflict`.
    pub async fn create_feed_follow(
        &self,
        user_id: i64,
        feed_id: i64,
        now: DateTime<Utc>,
    ) -> Result<FeedFollow, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feed_follows (user_id, feed_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .bind(now.timestamp())
        .bind(now.timestamp())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DatabaseError::from_unique(e, "feed follow"))?;

        let row = sqlx::query_as::<_, FeedFollowRow>(
            r#"
            SELECT ff.id, ff.user_id, ff.feed_id, u.name AS user_name, f.name AS feed_name
            FROM feed_follows ff
            JOIN users u ON u.id = ff.user_id
            JOIN feeds f ON f.id = ff.feed_id
            WHERE ff.id = ?
        "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Remove a follow. Returns `DatabaseError::NotFound` if the user was
    /// not following the feed.
    pub async fn delete_feed_follow(&self, user_id: i64, feed_id: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "follow of feed {} by user {}",
                feed_id, user_id
            )));
        }
        Ok(())
    }

    /// Feeds followed by `user_id`, ordered by feed name.
    pub async fn get_feed_follows_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<FeedFollow>, DatabaseError> {
        let rows = sqlx::query_as::<_, FeedFollowRow>(
            r#"
            SELECT ff.id, ff.user_id, ff.feed_id, u.name AS user_name, f.name AS feed_name
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

        Ok(rows.into_iter().map(FeedFollow::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_follow_list_unfollow() {
        let db = Database::open(":memory:").await.unwrap();
        let now = Utc::now();
        let user = db.create_user("reader", now).await.unwrap();
        let feed = db
            .create_feed("News", "https://news.example.com/rss", user.id, now)
            .await
            .unwrap();

        let follow = db.create_feed_follow(user.id, feed.id, now).await.unwrap();
        assert_eq!(follow.user_name, "reader");
        assert_eq!(follow.feed_name, "News");

        let follows = db.get_feed_follows_for_user(user.id).await.unwrap();
        assert_eq!(follows, vec![follow]);

        db.delete_feed_follow(user.id, feed.id).await.unwrap();
        assert!(db.get_feed_follows_for_user(user.id).await.unwrap().is_empty());

        let err = db.delete_feed_follow(user.id, feed.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_double_follow_is_conflict() {
        let db = Database::open(":memory:").await.unwrap();
        let now = Utc::now();
        let user = db.create_user("reader", now).await.unwrap();
        let feed = db
            .create_feed("News", "https://news.example.com/rss", user.id, now)
            .await
            .unwrap();

        db.create_feed_follow(user.id, feed.id, now).await.unwrap();
        let err = db
            .create_feed_follow(user.id, feed.id, now)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
    }
}

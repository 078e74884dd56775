use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{CreatePostOutcome, DatabaseError, NewPost, Post, PostRow};

/// Maximum number of posts any single browse query returns
const MAX_BROWSE_LIMIT: i64 = 500;

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post unless one with the same link already exists.
    ///
    /// `posts.url` is unique across all feeds, so a second insert of the same
    /// link (from this feed or any other) writes nothing and returns
    /// [`CreatePostOutcome::AlreadyExists`].
    pub async fn create_post(
        &self,
        post: &NewPost,
        now: DateTime<Utc>,
    ) -> Result<CreatePostOutcome, DatabaseError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (feed_id, title, url, description, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
            RETURNING id, feed_id, title, url, description, published_at, created_at, updated_at
        "#,
        )
        .bind(post.feed_id)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at.timestamp())
        .bind(now.timestamp())
        .bind(now.timestamp())
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => CreatePostOutcome::Created(row.into_post()),
            None => CreatePostOutcome::AlreadyExists,
        })
    }

    /// Newest posts from feeds `user_id` follows, at most `limit` rows.
    pub async fn get_posts_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<Post>, DatabaseError> {
        let limit = limit.clamp(0, MAX_BROWSE_LIMIT);
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT p.id, p.feed_id, p.title, p.url, p.description,
                   p.published_at, p.created_at, p.updated_at
            FROM posts p
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at DESC, p.id DESC
            LIMIT ?
        "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PostRow::into_post).collect())
    }

    /// All posts stored for one feed, newest first.
    pub async fn get_posts_for_feed(&self, feed_id: i64) -> Result<Vec<Post>, DatabaseError> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, feed_id, title, url, description, published_at, created_at, updated_at
            FROM posts
            WHERE feed_id = ?
            ORDER BY published_at DESC, id DESC
        "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PostRow::into_post).collect())
    }

    /// Total number of stored posts.
    pub async fn count_posts(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

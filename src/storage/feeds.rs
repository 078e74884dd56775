use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{DatabaseError, Feed, FeedRow, FeedWithOwner};

const FEED_COLUMNS: &str = "id, name, url, user_id, created_at, updated_at, last_fetched_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Register a feed owned by `user_id`. URLs are unique; a duplicate
    /// yields `DatabaseError::Conflict`.
    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Feed, DatabaseError> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            r#"
            INSERT INTO feeds (name, url, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {FEED_COLUMNS}
        "#
        ))
        .bind(name)
        .bind(url)
        .bind(user_id)
        .bind(now.timestamp())
        .bind(now.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_unique(e, format!("feed '{}'", url)))?;

        Ok(row.into_feed())
    }

    /// Look up a feed by its source URL.
    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE url = ?"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeedRow::into_feed))
    }

    /// Look up a feed by id.
    pub async fn get_feed(&self, feed_id: i64) -> Result<Option<Feed>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"
        ))
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeedRow::into_feed))
    }

    /// All feeds with the name of the user who added them.
    pub async fn get_feeds_with_owner(&self) -> Result<Vec<FeedWithOwner>, DatabaseError> {
        let rows = sqlx::query_as::<_, FeedWithOwner>(
            r#"
            SELECT f.name, f.url, u.name AS owner
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.name
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ========================================================================
    // Polling Operations
    // ========================================================================

    /// The feed due next: oldest `last_fetched_at`, never-polled feeds first.
    ///
    /// Ties are broken by id so selection is deterministic.
    pub async fn next_feed_to_fetch(&self) -> Result<Option<Feed>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            r#"
            SELECT {FEED_COLUMNS}
            FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
            LIMIT 1
        "#
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeedRow::into_feed))
    }

    /// Record that `feed_id` was polled at `at`.
    ///
    /// `last_fetched_at` never moves backwards: an older `at` leaves the
    /// stored value alone. `updated_at` is always bumped.
    pub async fn mark_feed_fetched(
        &self,
        feed_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let at = at.timestamp();
        let result = sqlx::query(
            r#"
            UPDATE feeds SET
                last_fetched_at = CASE
                    WHEN last_fetched_at IS NULL OR last_fetched_at < ? THEN ?
                    ELSE last_fetched_at
                END,
                updated_at = ?
            WHERE id = ?
        "#,
        )
        .bind(at)
        .bind(at)
        .bind(at)
        .bind(feed_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("feed {}", feed_id)));
        }
        Ok(())
    }
}

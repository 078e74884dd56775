use chrono::{DateTime, Utc};
use std::future::Future;

use crate::storage::{CreatePostOutcome, Database, DatabaseError, Feed, NewPost};

/// Persistence operations an ingestion cycle needs.
///
/// Every call is an independent unit of work; implementations must not hold
/// a transaction open between calls.
pub trait FeedStore: Send + Sync {
    /// Feed with the oldest `last_fetched_at` (never-polled first), or `None`
    /// when no feeds are registered.
    fn select_next_feed_to_poll(
        &self,
    ) -> impl Future<Output = Result<Option<Feed>, DatabaseError>> + Send;

    /// Advance `last_fetched_at` for `feed_id` to `at`.
    fn mark_feed_polled(
        &self,
        feed_id: i64,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), DatabaseError>> + Send;

    /// Persist a post; idempotent on its link.
    fn create_post(
        &self,
        post: NewPost,
    ) -> impl Future<Output = Result<CreatePostOutcome, DatabaseError>> + Send;
}

impl FeedStore for Database {
    fn select_next_feed_to_poll(
        &self,
    ) -> impl Future<Output = Result<Option<Feed>, DatabaseError>> + Send {
        self.next_feed_to_fetch()
    }

    fn mark_feed_polled(
        &self,
        feed_id: i64,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), DatabaseError>> + Send {
        self.mark_feed_fetched(feed_id, at)
    }

    fn create_post(
        &self,
        post: NewPost,
    ) -> impl Future<Output = Result<CreatePostOutcome, DatabaseError>> + Send {
        async move { Database::create_post(self, &post, Utc::now()).await }
    }
}

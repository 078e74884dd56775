use chrono::Utc;
use thiserror::Error;

use super::scheduler::PollJob;
use super::store::FeedStore;
use crate::feed::{normalize, Entry, FeedFetcher, FetchError};
use crate::shutdown::Shutdown;
use crate::storage::{CreatePostOutcome, DatabaseError, NewPost};

/// Feed-level failures. Each one ends the current cycle; none of them stop
/// the scheduler.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("No feeds registered")]
    NoFeeds,
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
    #[error("Failed to fetch feed {url}: {source}")]
    Fetch {
        feed_id: i64,
        url: String,
        #[source]
        source: FetchError,
    },
}

/// Outcome of one successful cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub feed_id: i64,
    pub feed_name: String,
    /// Items in the fetched document
    pub entries: usize,
    pub created: usize,
    /// Entries whose link was already stored
    pub duplicates: usize,
    /// Entries dropped before storage (no link, unparseable date)
    pub skipped: usize,
    /// Entries whose insert failed with a storage error
    pub failed: usize,
}

/// Select the most overdue feed, fetch it, and store its new entries.
pub struct IngestionCycle<S> {
    store: S,
    fetcher: FeedFetcher,
}

impl<S: FeedStore> IngestionCycle<S> {
    pub fn new(store: S, fetcher: FeedFetcher) -> Self {
        Self { store, fetcher }
    }

    /// Run one cycle.
    ///
    /// The feed is marked polled before the request goes out, so a feed that
    /// keeps failing is simply retried in its normal turn. Entry-level
    /// problems are counted in the report and never fail the cycle.
    pub async fn run_once(&self, shutdown: &Shutdown) -> Result<CycleReport, CycleError> {
        let feed = self
            .store
            .select_next_feed_to_poll()
            .await?
            .ok_or(CycleError::NoFeeds)?;

        self.store.mark_feed_polled(feed.id, Utc::now()).await?;
        tracing::debug!(
            feed_id = feed.id,
            feed = %feed.name,
            mark_before_fetch = true,
            "Feed marked as polled"
        );

        let doc = self
            .fetcher
            .fetch(&feed.url, shutdown)
            .await
            .map_err(|source| CycleError::Fetch {
                feed_id: feed.id,
                url: feed.url.clone(),
                source,
            })?;

        let mut report = CycleReport {
            feed_id: feed.id,
            feed_name: feed.name.clone(),
            entries: doc.entries.len(),
            ..CycleReport::default()
        };

        for entry in doc.entries {
            self.store_entry(feed.id, entry, &mut report).await;
        }

        Ok(report)
    }

    async fn store_entry(&self, feed_id: i64, entry: Entry, report: &mut CycleReport) {
        if entry.link.is_empty() {
            tracing::warn!(feed_id, title = %entry.title, "Skipping entry without a link");
            report.skipped += 1;
            return;
        }

        let published_at = match normalize(&entry.published) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(feed_id, url = %entry.link, error = %e, "Skipping entry");
                report.skipped += 1;
                return;
            }
        };

        let url = entry.link;
        let post = NewPost {
            feed_id,
            title: entry.title,
            url: url.clone(),
            description: entry.description,
            published_at,
        };

        match self.store.create_post(post).await {
            Ok(CreatePostOutcome::Created(post)) => {
                tracing::debug!(feed_id, post_id = post.id, url = %url, "Post created");
                report.created += 1;
            }
            Ok(CreatePostOutcome::AlreadyExists) => {
                tracing::debug!(feed_id, url = %url, "Post already stored");
                report.duplicates += 1;
            }
            Err(e) => {
                tracing::warn!(feed_id, url = %url, error = %e, "Failed to store post");
                report.failed += 1;
            }
        }
    }
}

impl<S: FeedStore> PollJob for IngestionCycle<S> {
    type Error = CycleError;

    fn name(&self) -> &'static str {
        "ingestion"
    }

    async fn execute(&mut self, shutdown: &Shutdown) -> Result<(), CycleError> {
        let report = self.run_once(shutdown).await?;
        tracing::info!(
            feed_id = report.feed_id,
            feed = %report.feed_name,
            entries = report.entries,
            created = report.created,
            duplicates = report.duplicates,
            skipped = report.skipped,
            failed = report.failed,
            "Feed collected"
        );
        Ok(())
    }
}

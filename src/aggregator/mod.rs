//! Feed polling: one [`IngestionCycle`] per tick of a [`PollScheduler`].
//!
//! Storage is reached only through the [`FeedStore`] trait.

mod cycle;
mod scheduler;
mod store;

pub use cycle::{CycleError, CycleReport, IngestionCycle};
pub use scheduler::{PollJob, PollScheduler, SchedulerError, SchedulerState};
pub use store::FeedStore;

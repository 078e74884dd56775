//! Fixed-interval driver for a [`PollJob`].
//!
//! The first cycle starts immediately. Ticks that fall due while a cycle is
//! still running are coalesced into a single catch-up cycle, so a slow feed
//! never builds a backlog.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;

use crate::shutdown::Shutdown;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("Poll interval must be greater than zero")]
    ZeroInterval,
}

/// Work driven by a [`PollScheduler`], one call per tick.
pub trait PollJob: Send {
    type Error: Display + Send;

    /// Name used in log output
    fn name(&self) -> &'static str;

    /// Run one unit of work. The scheduler logs a returned error and keeps
    /// going. `shutdown` is for aborting network I/O inside the job.
    fn execute(
        &mut self,
        shutdown: &Shutdown,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

#[derive(Debug)]
pub struct PollScheduler {
    interval: Duration,
    state: SchedulerState,
}

impl PollScheduler {
    pub fn new(interval: Duration) -> Result<Self, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }
        Ok(Self {
            interval,
            state: SchedulerState::Idle,
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Drive `job` until `shutdown` fires. Returns the number of cycles run.
    ///
    /// Shutdown is only observed between cycles; a cycle that has started
    /// always runs to completion (its own network I/O may still end early).
    pub async fn run<J: PollJob>(&mut self, job: &mut J, shutdown: Shutdown) -> u64 {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut shutdown = shutdown;
        let mut cycles = 0u64;

        tracing::info!(job = job.name(), interval = ?self.interval, "Scheduler started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            self.state = SchedulerState::Running;
            tracing::debug!(job = job.name(), state = ?self.state, cycle = cycles + 1, "Cycle starting");

            if let Err(e) = job.execute(&shutdown).await {
                tracing::warn!(job = job.name(), error = %e, "Cycle failed");
            }

            cycles += 1;
            self.state = SchedulerState::Idle;
        }

        tracing::info!(job = job.name(), cycles, "Scheduler stopped");
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    /// Records the offset of each start from `origin` and sleeps `work`.
    struct SlowJob {
        origin: Instant,
        work: Duration,
        starts: Arc<Mutex<Vec<Duration>>>,
        completed: Arc<Mutex<u64>>,
        fail: bool,
    }

    impl SlowJob {
        fn new(work: Duration) -> Self {
            Self {
                origin: Instant::now(),
                work,
                starts: Arc::new(Mutex::new(Vec::new())),
                completed: Arc::new(Mutex::new(0)),
                fail: false,
            }
        }
    }

    impl PollJob for SlowJob {
        type Error = String;

        fn name(&self) -> &'static str {
            "slow"
        }

        async fn execute(&mut self, _shutdown: &Shutdown) -> Result<(), String> {
            self.starts.lock().unwrap().push(self.origin.elapsed());
            tokio::time::sleep(self.work).await;
            *self.completed.lock().unwrap() += 1;
            if self.fail {
                Err("boom".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn stop_after(after: Duration) -> Shutdown {
        let (trigger, handle) = shutdown::channel();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            trigger.trigger();
        });
        handle
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert_eq!(
            PollScheduler::new(Duration::ZERO).unwrap_err(),
            SchedulerError::ZeroInterval
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_every_interval() {
        let mut job = SlowJob::new(Duration::from_secs(1));
        let starts = job.starts.clone();
        let mut scheduler = PollScheduler::new(Duration::from_secs(60)).unwrap();

        let cycles = scheduler
            .run(&mut job, stop_after(Duration::from_secs(150)))
            .await;

        assert_eq!(cycles, 3);
        assert_eq!(
            *starts.lock().unwrap(),
            vec![
                Duration::ZERO,
                Duration::from_secs(60),
                Duration::from_secs(120)
            ]
        );
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_coalesces_missed_ticks() {
        // 150s of work on a 60s interval: ticks at 60 and 120 are missed and
        // must collapse into one cycle at 150.
        let mut job = SlowJob::new(Duration::from_secs(150));
        let starts = job.starts.clone();
        let completed = job.completed.clone();
        let mut scheduler = PollScheduler::new(Duration::from_secs(60)).unwrap();

        // Fires mid-way through the third cycle
        let cycles = scheduler
            .run(&mut job, stop_after(Duration::from_secs(400)))
            .await;

        assert_eq!(
            *starts.lock().unwrap(),
            vec![
                Duration::ZERO,
                Duration::from_secs(150),
                Duration::from_secs(300)
            ]
        );
        assert_eq!(cycles, 3);
        assert_eq!(*completed.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycle_does_not_stop_scheduler() {
        let mut job = SlowJob::new(Duration::from_secs(1));
        job.fail = true;
        let mut scheduler = PollScheduler::new(Duration::from_secs(10)).unwrap();

        let cycles = scheduler
            .run(&mut job, stop_after(Duration::from_secs(35)))
            .await;

        assert_eq!(cycles, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_triggered_shutdown_runs_nothing() {
        let (trigger, handle) = shutdown::channel();
        trigger.trigger();
        let mut job = SlowJob::new(Duration::from_secs(1));
        let mut scheduler = PollScheduler::new(Duration::from_secs(10)).unwrap();

        assert_eq!(scheduler.run(&mut job, handle).await, 0);
    }
}

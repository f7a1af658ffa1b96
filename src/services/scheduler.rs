//! Background task runner for periodic maintenance.
//!
//! Each task owns a child cancellation token, so one can be stopped without
//! touching the others, and a gate that keeps scheduled and manual runs of
//! the same job from overlapping.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SharedClock};

/// Shortest period an `Every` schedule runs at; `interval_at` panics on zero.
pub const MIN_PERIOD: Duration = Duration::from_secs(1);

#[async_trait]
pub trait Job: Send + Sync + 'static {
    type Output: Send + 'static;

    fn name(&self) -> &'static str;

    async fn run(&self) -> anyhow::Result<Self::Output>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Fixed period, optionally firing once as soon as the task starts.
    Every { interval: Duration, run_at_start: bool },
    /// Once a day at `hour:minute` UTC, rescheduled after every run.
    DailyAt { hour: u32, minute: u32 },
}

/// First `hour:minute` UTC strictly after `after`.
pub fn next_daily_run(after: DateTime<Utc>, hour: u32, minute: u32) -> DateTime<Utc> {
    let anchor = NaiveTime::from_hms_opt(hour.min(23), minute.min(59), 0).unwrap_or(NaiveTime::MIN);
    let today = after.date_naive().and_time(anchor).and_utc();
    if today > after {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

pub struct Scheduler {
    clock: SharedClock,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token cancelled by [`Scheduler::shutdown`]; every task listens on a child of it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        tracing::info!("Stopping scheduled tasks");
        self.shutdown.cancel();
    }

    pub fn spawn<J: Job>(&self, job: Arc<J>, schedule: Schedule) -> TaskHandle<J> {
        let inner = Arc::new(TaskInner {
            job,
            gate: tokio::sync::Mutex::new(()),
            cancel: self.shutdown.child_token(),
            join: Mutex::new(None),
        });

        let task = {
            let inner = inner.clone();
            let clock = self.clock.clone();
            tokio::spawn(async move {
                match schedule {
                    Schedule::Every { interval, run_at_start } => {
                        run_every(&inner, interval, run_at_start).await
                    }
                    Schedule::DailyAt { hour, minute } => run_daily(&inner, clock, hour, minute).await,
                }
                tracing::info!(job = inner.job.name(), "Scheduled task stopped");
            })
        };
        if let Ok(mut join) = inner.join.lock() {
            *join = Some(task);
        }

        tracing::info!(job = inner.job.name(), ?schedule, "Scheduled task started");
        TaskHandle { inner }
    }
}

struct TaskInner<J: Job> {
    job: Arc<J>,
    gate: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl<J: Job> TaskInner<J> {
    async fn run_guarded(&self) -> anyhow::Result<J::Output> {
        let _running = self.gate.lock().await;
        self.job.run().await
    }

    async fn run_scheduled(&self) {
        if let Err(e) = self.run_guarded().await {
            tracing::error!(job = self.job.name(), error = %e, "Scheduled job failed");
        }
    }
}

async fn run_every<J: Job>(inner: &TaskInner<J>, period: Duration, run_at_start: bool) {
    if period < MIN_PERIOD {
        tracing::warn!(job = inner.job.name(), ?period, "Interval too short, using one second");
    }
    let period = period.max(MIN_PERIOD);
    let start = if run_at_start {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            _ = ticker.tick() => inner.run_scheduled().await,
        }
    }
}

async fn run_daily<J: Job>(inner: &TaskInner<J>, clock: SharedClock, hour: u32, minute: u32) {
    let mut after = clock.now();
    loop {
        let target = next_daily_run(after, hour, minute);
        let delay = (target - clock.now()).to_std().unwrap_or_default();
        tracing::debug!(job = inner.job.name(), next_run = %target, "Daily task armed");

        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => inner.run_scheduled().await,
        }
        after = target.max(clock.now());
    }
}

/// Control surface of one spawned task.
pub struct TaskHandle<J: Job> {
    inner: Arc<TaskInner<J>>,
}

impl<J: Job> Clone for TaskHandle<J> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<J: Job> TaskHandle<J> {
    /// Run the job immediately, waiting for any in-flight scheduled run first.
    pub async fn run_now(&self) -> anyhow::Result<J::Output> {
        tracing::info!(job = self.inner.job.name(), "Manual run requested");
        self.inner.run_guarded().await
    }

    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Cancel and wait for the task loop to exit.
    pub async fn stop(&self) {
        self.cancel();
        let task = self.inner.join.lock().ok().and_then(|mut j| j.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(job = self.inner.job.name(), error = %e, "Scheduled task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingJob {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Job for CountingJob {
        type Output = usize;

        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self) -> anyhow::Result<usize> {
            Ok(self.runs.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, d, h, m, 0).unwrap()
    }

    #[test]
    fn test_next_daily_run() {
        assert_eq!(next_daily_run(utc(1, 2, 0), 3, 0), utc(1, 3, 0));
        assert_eq!(next_daily_run(utc(1, 3, 0), 3, 0), utc(2, 3, 0));
        assert_eq!(next_daily_run(utc(1, 14, 30), 3, 0), utc(2, 3, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_runs_at_start_then_every_period() {
        let scheduler = Scheduler::new(Arc::new(ManualClock::new(utc(1, 0, 0))));
        let job = Arc::new(CountingJob::default());
        let handle = scheduler.spawn(
            job.clone(),
            Schedule::Every {
                interval: Duration::from_secs(7_200),
                run_at_start: true,
            },
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(7_200)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 2);

        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(7_200 * 3)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_task_waits_for_anchor() {
        let scheduler = Scheduler::new(Arc::new(ManualClock::new(utc(1, 2, 0))));
        let job = Arc::new(CountingJob::default());
        let _handle = scheduler.spawn(job.clone(), Schedule::DailyAt { hour: 3, minute: 0 });

        tokio::time::sleep(Duration::from_secs(59 * 60)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2 * 60)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);

        scheduler.shutdown();
        tokio::time::sleep(Duration::from_secs(48 * 3_600)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_trigger_runs_without_waiting() {
        let scheduler = Scheduler::new(Arc::new(ManualClock::new(utc(1, 12, 0))));
        let job = Arc::new(CountingJob::default());
        let handle = scheduler.spawn(job.clone(), Schedule::DailyAt { hour: 3, minute: 0 });

        assert_eq!(handle.run_now().await.unwrap(), 1);
        assert_eq!(handle.run_now().await.unwrap(), 2);

        handle.cancel();
        assert!(handle.is_cancelled());
        // Cancelling stops the schedule, not manual runs.
        assert_eq!(handle.run_now().await.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let scheduler = Scheduler::new(Arc::new(ManualClock::new(utc(1, 0, 0))));
        let job = Arc::new(CountingJob::default());
        let handle = scheduler.spawn(
            job.clone(),
            Schedule::Every {
                interval: Duration::ZERO,
                run_at_start: true,
            },
        );

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 3);

        assert!(!handle.is_cancelled());
        handle.stop().await;
        assert_eq!(handle.run_now().await.unwrap(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tasks_cancel_independently() {
        let scheduler = Scheduler::new(Arc::new(ManualClock::new(utc(1, 0, 0))));
        let a = Arc::new(CountingJob::default());
        let b = Arc::new(CountingJob::default());
        let every = |secs| Schedule::Every {
            interval: Duration::from_secs(secs),
            run_at_start: false,
        };
        let ha = scheduler.spawn(a.clone(), every(60));
        let _hb = scheduler.spawn(b.clone(), every(60));

        tokio::time::sleep(Duration::from_secs(61)).await;
        ha.stop().await;
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(a.runs.load(Ordering::SeqCst), 1);
        assert_eq!(b.runs.load(Ordering::SeqCst), 3);
    }
}

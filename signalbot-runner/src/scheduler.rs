//! Periodic task scheduling with a first-class cancellation handle.

use log::debug;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Shortest accepted period; tokio intervals reject zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

pub struct Scheduler;

impl Scheduler {
    /// Run `task` every `period`, first firing one period from now.
    ///
    /// Each firing is awaited to completion before the next is considered, so
    /// runs never overlap; firings missed while a run was in progress are
    /// skipped rather than bunched. Must be called inside a tokio runtime.
    pub fn every<F, Fut>(period: Duration, mut task: F) -> TickHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let cancelled = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());

        let join = tokio::spawn({
            let cancelled = Arc::clone(&cancelled);
            let wake = Arc::clone(&wake);
            async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = wake.notified() => {}
                    }
                    if cancelled.load(Ordering::Acquire) {
                        break;
                    }
                    task().await;
                }
                debug!("schedule with period {period:?} cancelled");
            }
        });

        TickHandle {
            cancelled,
            wake,
            join: Some(join),
        }
    }
}

/// Handle to a running schedule. Dropping it cancels the schedule.
#[derive(Debug)]
pub struct TickHandle {
    cancelled: Arc<AtomicBool>,
    wake: Arc<Notify>,
    join: Option<JoinHandle<()>>,
}

impl TickHandle {
    /// Stop future firings. A run already in progress finishes.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Cancel and wait for the in-flight run, if any, to finish.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                debug!("scheduled task ended abnormally: {e}");
            }
        }
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() -> std::future::Ready<()> + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn first_firing_waits_one_period() {
        let (count, task) = counter();
        let handle = Scheduler::every(Duration::from_millis(100), task);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_future_firings() {
        let (count, task) = counter();
        let handle = Scheduler::every(Duration::from_millis(100), task);
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.cancel();
        assert!(handle.is_cancelled());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_run_finishes_after_cancel() {
        let finished = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&finished);
        let handle = Scheduler::every(Duration::from_millis(10), move || {
            let f = Arc::clone(&f);
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                f.store(true, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.shutdown().await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels() {
        let (count, task) = counter();
        drop(Scheduler::every(Duration::from_millis(100), task));
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}

//! Scheduler responsiveness.
//!
//! [`LoopDelayProbe`] runs its own task that repeatedly sleeps for a fixed
//! resolution and accumulates how late each wakeup was. A busy or starved
//! runtime wakes it late, so the counter climbs.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use log::*;
use tokio::{runtime::Handle, task::JoinHandle, time::Instant};

pub trait Responsiveness: Send + Sync {
    /// Total accumulated lateness in milliseconds. Never decreases.
    fn cumulative_delay(&self) -> u64;
}

/// Used when there is no runtime to measure.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl Responsiveness for NoDelay {
    fn cumulative_delay(&self) -> u64 {
        0
    }
}

#[derive(Debug)]
pub struct LoopDelayProbe {
    late_nanos: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl LoopDelayProbe {
    pub fn spawn(handle: &Handle, resolution: Duration) -> Self {
        let late_nanos = Arc::new(AtomicU64::new(0));
        let counter = late_nanos.clone();
        let resolution = resolution.max(Duration::from_millis(1));
        let task = handle.spawn(async move {
            loop {
                let start = Instant::now();
                tokio::time::sleep(resolution).await;
                let late = start.elapsed().saturating_sub(resolution);
                counter.fetch_add(late.as_nanos() as u64, Ordering::Relaxed);
            }
        });
        Self { late_nanos, task }
    }
}

impl Responsiveness for LoopDelayProbe {
    fn cumulative_delay(&self) -> u64 {
        self.late_nanos.load(Ordering::Relaxed) / 1_000_000
    }
}

impl Drop for LoopDelayProbe {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Measure the current tokio runtime, or nothing if there isn't one.
pub fn detect(resolution: Duration) -> Arc<dyn Responsiveness> {
    match Handle::try_current() {
        Ok(handle) => {
            debug!(target: "Probe", "Loop delay probe every {:?}", resolution);
            Arc::new(LoopDelayProbe::spawn(&handle, resolution))
        }
        Err(_) => {
            debug!(target: "Probe", "No tokio runtime, delay reported as zero");
            Arc::new(NoDelay)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn punctual_wakeups_accumulate_nothing() {
        let probe = LoopDelayProbe::spawn(&Handle::current(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(probe.cumulative_delay(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn late_wakeup_is_counted() {
        let probe = LoopDelayProbe::spawn(&Handle::current(), Duration::from_millis(10));
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(50)).await;
        tokio::task::yield_now().await;
        let delay = probe.cumulative_delay();
        assert!((40..=50).contains(&delay), "delay was {}", delay);
    }

    #[test]
    fn no_runtime_means_no_delay() {
        let probe = detect(Duration::from_millis(10));
        assert_eq!(probe.cumulative_delay(), 0);
    }
}

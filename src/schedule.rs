//! Repeating background jobs that never keep the process alive.
//!
//! Inside a tokio runtime the job is a task, which dies with the runtime.
//! Outside one it runs on a detached thread, which does not stop `main`
//! from returning.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use log::*;
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

pub type Job = Box<dyn FnMut() + Send + 'static>;

/// Handle to a scheduled job.
pub trait Ticker: Send + Sync {
    /// Stop the job. Safe to call more than once.
    fn cancel(&self);
}

pub trait Scheduler {
    /// Run `job` every `period`, first after one full period.
    fn every(&self, period: Duration, job: Job) -> Box<dyn Ticker>;
}

#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

struct TaskTicker {
    stopped: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Ticker for TaskTicker {
    fn cancel(&self) {
        self.stopped.store(true, Ordering::Release);
        self.task.abort();
    }
}

impl Scheduler for TokioScheduler {
    fn every(&self, period: Duration, mut job: Job) -> Box<dyn Ticker> {
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();
        let task = self.handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if flag.load(Ordering::Acquire) {
                    break;
                }
                job();
            }
        });
        Box::new(TaskTicker { stopped, task })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadScheduler;

struct ThreadTicker {
    stopped: Arc<AtomicBool>,
}

impl Ticker for ThreadTicker {
    fn cancel(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

impl Scheduler for ThreadScheduler {
    fn every(&self, period: Duration, mut job: Job) -> Box<dyn Ticker> {
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();
        let spawned = thread::Builder::new()
            .name("proctop-sampler".to_string())
            .spawn(move || {
                loop {
                    thread::sleep(period);
                    if flag.load(Ordering::Acquire) {
                        break;
                    }
                    job();
                }
            });
        if let Err(err) = spawned {
            warn!(target: "Scheduler", "Can't start sampler thread: {}", err);
            stopped.store(true, Ordering::Release);
        }
        Box::new(ThreadTicker { stopped })
    }
}

/// Pick a scheduler for the calling context.
pub fn detect() -> Box<dyn Scheduler> {
    match Handle::try_current() {
        Ok(handle) => Box::new(TokioScheduler::new(handle)),
        Err(_) => {
            debug!(target: "Scheduler", "No tokio runtime, sampling on a thread");
            Box::new(ThreadScheduler)
        }
    }
}

//! Deterministic stand-ins for the clock, host, probe and scheduler.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use crate::{
    clock::Clock,
    host::{CpuTime, MemoryUsage, ResourceUsage},
    probe::Responsiveness,
    schedule::{Job, Scheduler, Ticker},
};

#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Default)]
struct FakeHost {
    process: CpuTime,
    thread: CpuTime,
    memory: MemoryUsage,
    load: [f64; 3],
}

#[derive(Debug, Clone, Default)]
pub struct FakeUsage {
    host: Arc<Mutex<FakeHost>>,
}

impl FakeUsage {
    pub fn set_process(&self, user: u64, system: u64) {
        self.host.lock().unwrap().process = CpuTime { user, system };
    }

    pub fn set_thread(&self, user: u64, system: u64) {
        self.host.lock().unwrap().thread = CpuTime { user, system };
    }

    pub fn set_memory(&self, memory: MemoryUsage) {
        self.host.lock().unwrap().memory = memory;
    }

    pub fn set_load(&self, load: [f64; 3]) {
        self.host.lock().unwrap().load = load;
    }
}

impl ResourceUsage for FakeUsage {
    fn process_cpu(&self) -> CpuTime {
        self.host.lock().unwrap().process
    }

    fn thread_cpu(&self) -> CpuTime {
        self.host.lock().unwrap().thread
    }

    fn memory(&self) -> MemoryUsage {
        self.host.lock().unwrap().memory
    }

    fn load_average(&self) -> [f64; 3] {
        self.host.lock().unwrap().load
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeDelay {
    millis: Arc<AtomicU64>,
}

impl FakeDelay {
    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Responsiveness for FakeDelay {
    fn cumulative_delay(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

struct Scheduled {
    period: Duration,
    job: Job,
    cancelled: Arc<AtomicBool>,
}

/// Collects jobs and only runs them when told to.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    jobs: Arc<Mutex<Vec<Scheduled>>>,
}

impl ManualScheduler {
    /// Run every live job once, returning how many ran.
    pub fn fire(&self) -> usize {
        let mut jobs = self.jobs.lock().unwrap();
        let mut ran = 0;
        for scheduled in jobs.iter_mut() {
            if !scheduled.cancelled.load(Ordering::SeqCst) {
                (scheduled.job)();
                ran += 1;
            }
        }
        ran
    }

    pub fn periods(&self) -> Vec<Duration> {
        self.jobs.lock().unwrap().iter().map(|s| s.period).collect()
    }
}

struct ManualTicker {
    cancelled: Arc<AtomicBool>,
}

impl Ticker for ManualTicker {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl Scheduler for ManualScheduler {
    fn every(&self, period: Duration, job: Job) -> Box<dyn Ticker> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.jobs.lock().unwrap().push(Scheduled {
            period,
            job,
            cancelled: cancelled.clone(),
        });
        Box::new(ManualTicker { cancelled })
    }
}

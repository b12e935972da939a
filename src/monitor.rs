//! The monitor handle: derived CPU, delay and memory figures over the
//! sampler's window, plus the two renderings of them.

use std::{
    fmt::Display,
    io,
    num::NonZeroUsize,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use log::*;
use serde::Serialize;

use crate::{
    clock::{Clock, MonotonicClock},
    config::MonitorConfig,
    format,
    host::{CpuTime, HostResources, ResourceUsage},
    probe::{self, Responsiveness},
    sampler::{Snapshot, Sources, WindowedSampler, elapsed_since, rate_since},
    schedule::{self, Scheduler},
};

/// Decimal places kept in [`MonitorSnapshot`] ratios.
pub const SNAPSHOT_PLACES: i32 = 4;

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct CpuReport {
    /// Microseconds covered by the measurement.
    pub time: f64,
    /// CPU time over wall time. May exceed 1 for a multi-threaded process.
    pub percent: f64,
    pub system: u64,
    pub user: u64,
}

impl CpuReport {
    fn between(delta: CpuTime, elapsed: Duration) -> Self {
        let time = elapsed.as_nanos() as f64 / 1_000.0;
        Self {
            time,
            percent: delta.total() as f64 / time,
            system: delta.system,
            user: delta.user,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryReport {
    /// Resident set over total system memory.
    pub percent: f64,
    pub rss: u64,
    pub total: u64,
    /// Live heap bytes over the heap high-water mark, not over reserved heap.
    pub heap_percent: f64,
    /// Live bytes counted by the tracking allocator, 0 when it isn't installed.
    pub heap_used: u64,
    /// Highest `heap_used` seen so far. The allocator reserves no heap of its
    /// own, so the peak stands in for a heap size.
    pub heap_total: u64,
    /// Resident memory not accounted for by the tracked heap: code, stacks,
    /// allocator overhead and memory obtained outside the global allocator.
    pub external: u64,
}

/// Serializable point-in-time view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub cpu: f64,
    pub memory: f64,
    pub delay: u64,
    /// Milliseconds since the monitor started.
    pub runtime: u64,
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn stable_ratio(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    format::round_to(value.clamp(0.0, 1.0), SNAPSHOT_PLACES)
}

/// A denied or failed parallelism query reads as 0.
fn parallelism_or_zero(query: io::Result<NonZeroUsize>) -> usize {
    query.map(NonZeroUsize::get).unwrap_or_else(|err| {
        debug!(target: "Monitor", "Parallelism unavailable: {}", err);
        0
    })
}

fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A running resource monitor for the current process.
///
/// Readings are smoothed over the trailing window of roughly four sampler
/// intervals. After [`destroy`](Self::destroy) they keep working but stop
/// moving.
#[derive(Debug)]
pub struct Monitor {
    pid: u32,
    command: String,
    started: SystemTime,
    parallelism: usize,
    sampler: WindowedSampler,
}

impl Monitor {
    /// Monitor this process with everything detected from the host.
    pub fn new(config: MonitorConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> MonitorBuilder {
        MonitorBuilder::default()
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// The command line this process was started with.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn started(&self) -> SystemTime {
        self.started
    }

    /// Available parallelism, 0 if the host would not say.
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn interval(&self) -> Duration {
        self.sampler.interval()
    }

    pub fn runtime(&self) -> Duration {
        self.sampler
            .sources()
            .clock
            .now()
            .saturating_sub(self.sampler.started())
    }

    fn cpu_of(&self, field: fn(&Snapshot) -> CpuTime) -> CpuReport {
        let (oldest, newest) = self.sampler.bounds();
        CpuReport::between(
            rate_since(field, &oldest, &newest),
            elapsed_since(&oldest, &newest),
        )
    }

    pub fn cpu(&self) -> CpuReport {
        self.cpu_of(|s| s.process_cpu)
    }

    /// CPU of the thread that built the monitor. Zero where unsupported.
    pub fn cpu_thread(&self) -> CpuReport {
        self.cpu_of(|s| s.thread_cpu)
    }

    /// Scheduler delay in milliseconds, scaled to one nominal interval.
    ///
    /// The window rarely spans exactly four intervals (warm-up, timer
    /// jitter), so the raw delta is rescaled by `interval / elapsed`.
    pub fn delay(&self) -> u64 {
        let (oldest, newest) = self.sampler.bounds();
        let delta = rate_since(|s| s.delay, &oldest, &newest) as u128;
        let elapsed = elapsed_since(&oldest, &newest).as_millis().max(1);
        let interval = self.sampler.interval().as_millis();
        (delta * interval / elapsed) as u64
    }

    pub fn memory(&self) -> MemoryReport {
        let usage = self.sampler.sources().usage.memory();
        MemoryReport {
            percent: ratio(usage.rss, usage.total),
            rss: usage.rss,
            total: usage.total,
            heap_percent: ratio(usage.heap_used, usage.heap_total),
            heap_used: usage.heap_used,
            heap_total: usage.heap_total,
            external: usage.rss.saturating_sub(usage.heap_used),
        }
    }

    pub fn loadavg(&self) -> [f64; 3] {
        self.sampler.sources().usage.load_average()
    }

    /// Stop sampling. Safe to call repeatedly.
    pub fn destroy(&self) {
        self.sampler.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.sampler.is_destroyed()
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            timestamp: unix_millis(SystemTime::now()),
            cpu: stable_ratio(self.cpu().percent),
            memory: stable_ratio(self.memory().percent),
            delay: self.delay(),
            runtime: self.runtime().as_millis() as u64,
        }
    }
}

impl Display for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mem = self.memory();
        write!(
            f,
            "cpu: {} | rss: {} ({}) | heap: {} / {} ({}) | ext: {} | delay: {} ms | {} | loadavg: {}",
            format::percent(self.cpu().percent),
            format::format_bytes(mem.rss),
            format::percent(mem.percent),
            format::format_bytes(mem.heap_used),
            format::format_bytes(mem.heap_total),
            format::percent(mem.heap_percent),
            format::format_bytes(mem.external),
            self.delay(),
            format::clock_time(self.runtime()),
            format::load_average(&self.loadavg()),
        )
    }
}

/// Assembles a [`Monitor`], detecting whatever is not supplied.
#[derive(Default)]
pub struct MonitorBuilder {
    config: MonitorConfig,
    usage: Option<Arc<dyn ResourceUsage>>,
    probe: Option<Arc<dyn Responsiveness>>,
    clock: Option<Arc<dyn Clock>>,
    scheduler: Option<Box<dyn Scheduler>>,
    parallelism: Option<usize>,
}

impl MonitorBuilder {
    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn usage(mut self, usage: Arc<dyn ResourceUsage>) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn Responsiveness>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Some(Box::new(scheduler));
        self
    }

    pub fn parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = Some(parallelism);
        self
    }

    pub fn build(self) -> Monitor {
        let config = self.config;
        let sources = Sources {
            usage: self
                .usage
                .unwrap_or_else(|| Arc::new(HostResources::detect())),
            probe: self
                .probe
                .unwrap_or_else(|| probe::detect(config.probe_resolution())),
            clock: self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::new())),
        };
        let scheduler = self.scheduler.unwrap_or_else(schedule::detect);
        let parallelism = self
            .parallelism
            .unwrap_or_else(|| parallelism_or_zero(std::thread::available_parallelism()));
        let monitor = Monitor {
            pid: std::process::id(),
            command: std::env::args_os()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(" "),
            started: SystemTime::now(),
            parallelism,
            sampler: WindowedSampler::new(config.interval(), sources, scheduler.as_ref()),
        };
        info!(
            target: "Monitor",
            "Monitoring pid {} every {:?}",
            monitor.pid,
            monitor.interval()
        );
        monitor
    }
}

//! Host resource accounting: cumulative CPU counters, live memory gauges and
//! load averages.
//!
//! Which sources back a [`HostResources`] is decided once, by
//! [`HostResources::detect`]. Anything the host cannot provide is replaced by
//! [`Unsupported`], which reads as zero forever.

use serde::Serialize;

pub mod cpu;
pub mod heap;
pub mod memory;
pub mod thread;

use crate::host::memory::MemoryGauge;

/// Cumulative CPU time in microseconds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CpuTime {
    pub user: u64,
    pub system: u64,
}

impl CpuTime {
    pub fn total(&self) -> u64 {
        self.user + self.system
    }

    /// Per-field difference against an earlier reading, never below zero.
    pub fn since(&self, earlier: &CpuTime) -> CpuTime {
        CpuTime {
            user: self.user.saturating_sub(earlier.user),
            system: self.system.saturating_sub(earlier.system),
        }
    }
}

/// Instantaneous memory gauges, all in bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub rss: u64,
    pub total: u64,
    pub heap_used: u64,
    /// Peak of `heap_used`, see [`heap::usage`].
    pub heap_total: u64,
}

/// Everything the sampler and the monitor read from the host.
///
/// Implementations are shared between monitors and must not need `&mut self`.
pub trait ResourceUsage: Send + Sync {
    /// Cumulative CPU time of the whole process.
    fn process_cpu(&self) -> CpuTime;
    /// Cumulative CPU time of the monitored thread.
    fn thread_cpu(&self) -> CpuTime;
    fn memory(&self) -> MemoryUsage;
    /// 1, 5 and 15 minute load averages.
    fn load_average(&self) -> [f64; 3];
}

pub trait CpuSource: Send + Sync {
    fn read(&self) -> CpuTime;
}

/// Fallback for a counter the host does not provide.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsupported;

impl CpuSource for Unsupported {
    fn read(&self) -> CpuTime {
        CpuTime::default()
    }
}

pub struct HostResources {
    process: Box<dyn CpuSource>,
    thread: Box<dyn CpuSource>,
    memory: MemoryGauge,
}

impl HostResources {
    /// Probe the host once and pick a source for each counter.
    ///
    /// Thread CPU is attributed to the calling thread.
    pub fn detect() -> Self {
        Self {
            process: cpu::detect(),
            thread: thread::detect(),
            memory: MemoryGauge::new(),
        }
    }
}

impl std::fmt::Debug for HostResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostResources")
            .field("memory", &self.memory)
            .finish_non_exhaustive()
    }
}

impl ResourceUsage for HostResources {
    fn process_cpu(&self) -> CpuTime {
        self.process.read()
    }

    fn thread_cpu(&self) -> CpuTime {
        self.thread.read()
    }

    fn memory(&self) -> MemoryUsage {
        self.memory.read()
    }

    fn load_average(&self) -> [f64; 3] {
        let load = sysinfo::System::load_average();
        [load.one, load.five, load.fifteen]
    }
}

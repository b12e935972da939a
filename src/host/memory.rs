use std::sync::{Mutex, PoisonError};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::host::{MemoryUsage, heap};

/// Resident set and system memory through sysinfo, heap through the
/// tracking allocator.
#[derive(Debug)]
pub struct MemoryGauge {
    pid: Pid,
    sys: Mutex<System>,
}

impl MemoryGauge {
    pub fn new() -> Self {
        Self {
            pid: Pid::from_u32(std::process::id()),
            sys: Mutex::new(System::new()),
        }
    }

    /// Refresh and read. Not windowed: these are gauges, not counters.
    pub fn read(&self) -> MemoryUsage {
        let mut sys = self.sys.lock().unwrap_or_else(PoisonError::into_inner);
        sys.refresh_memory();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            false,
            ProcessRefreshKind::nothing().with_memory(),
        );
        let rss = sys.process(self.pid).map(|p| p.memory()).unwrap_or(0);
        let heap = heap::usage();
        MemoryUsage {
            rss,
            total: sys.total_memory(),
            heap_used: heap.used,
            heap_total: heap.peak,
        }
    }
}

impl Default for MemoryGauge {
    fn default() -> Self {
        Self::new()
    }
}

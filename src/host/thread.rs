//! Per-thread CPU accounting.
//!
//! The sampler captures on its own thread or task, so `RUSAGE_THREAD` would
//! measure the wrong thread. Instead the thread id is recorded when the source
//! is detected and its counters are read from procfs on every sample.

use log::*;

use crate::host::{CpuSource, CpuTime, Unsupported};

/// Split the utime and stime fields (clock ticks) out of a
/// `/proc/<pid>/task/<tid>/stat` line.
///
/// The command name is parenthesised and may itself contain spaces or
/// parentheses, so fields are counted from the last `)`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn parse_task_stat(raw: &str) -> Option<(u64, u64)> {
    let rest = &raw[raw.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace().skip(11);
    let utime = fields.next()?.parse().ok()?;
    let stime = fields.next()?.parse().ok()?;
    Some((utime, stime))
}

#[cfg(target_os = "linux")]
#[derive(Debug, Clone)]
pub struct TaskStat {
    path: std::path::PathBuf,
    ticks_per_second: u64,
}

#[cfg(target_os = "linux")]
impl TaskStat {
    /// Bind to the calling thread.
    pub fn current() -> Option<Self> {
        // SAFETY: gettid takes no arguments and cannot fail.
        let tid = unsafe { libc::syscall(libc::SYS_gettid) };
        // SAFETY: `sysconf` is thread-safe for this query and has no side effects.
        let hz = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        let source = Self {
            path: format!("/proc/self/task/{}/stat", tid).into(),
            ticks_per_second: if hz > 0 { hz as u64 } else { 100 },
        };
        source.sample().map(|_| source)
    }

    fn sample(&self) -> Option<CpuTime> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        let (utime, stime) = parse_task_stat(&raw)?;
        Some(CpuTime {
            user: utime * 1_000_000 / self.ticks_per_second,
            system: stime * 1_000_000 / self.ticks_per_second,
        })
    }
}

#[cfg(target_os = "linux")]
impl CpuSource for TaskStat {
    fn read(&self) -> CpuTime {
        // The thread may have exited; the window then sees a flat counter.
        self.sample().unwrap_or_default()
    }
}

pub fn detect() -> Box<dyn CpuSource> {
    #[cfg(target_os = "linux")]
    {
        if let Some(source) = TaskStat::current() {
            debug!(target: "Host", "Thread CPU from {:?}", source.path);
            return Box::new(source);
        }
    }
    debug!(target: "Host", "No per-thread CPU accounting, reporting zero");
    Box::new(Unsupported)
}

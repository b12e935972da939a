use log::*;

use crate::host::{CpuSource, CpuTime, Unsupported};

/// Process-wide CPU time from `getrusage(RUSAGE_SELF)`.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct Rusage;

#[cfg(unix)]
impl Rusage {
    fn sample() -> Option<CpuTime> {
        // SAFETY: `rusage` is plain old data, all-zero is a valid value.
        let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
        // SAFETY: `getrusage` only writes into the struct we hand it.
        let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
        if rc != 0 {
            return None;
        }
        Some(CpuTime {
            user: micros(usage.ru_utime),
            system: micros(usage.ru_stime),
        })
    }
}

#[cfg(unix)]
impl CpuSource for Rusage {
    fn read(&self) -> CpuTime {
        Self::sample().unwrap_or_default()
    }
}

#[cfg(unix)]
fn micros(tv: libc::timeval) -> u64 {
    (tv.tv_sec.max(0) as u64) * 1_000_000 + tv.tv_usec.max(0) as u64
}

pub fn detect() -> Box<dyn CpuSource> {
    #[cfg(unix)]
    {
        if Rusage::sample().is_some() {
            debug!(target: "Host", "Process CPU from getrusage");
            return Box::new(Rusage);
        }
    }
    debug!(target: "Host", "No process CPU accounting, reporting zero");
    Box::new(Unsupported)
}

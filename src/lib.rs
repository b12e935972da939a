//! In-process resource monitor.
//!
//! A [`Monitor`] samples this process's CPU counters and scheduler delay on a
//! fixed tick into a small ring buffer, and answers smoothed readings over
//! the last few ticks on demand:
//!
//! ```no_run
//! let monitor = proctop::top(proctop::MonitorConfig::default());
//! println!("{}", monitor);
//! println!("{}", serde_json::to_string(&monitor.snapshot()).unwrap());
//! monitor.destroy();
//! ```

pub mod clock;
pub mod config;
pub mod format;
pub mod host;
pub mod launch;
pub mod monitor;
pub mod probe;
pub mod sampler;
pub mod schedule;

#[cfg(test)]
pub(crate) mod testing;

pub use config::MonitorConfig;
pub use host::heap::TrackingAllocator;
pub use monitor::{CpuReport, MemoryReport, Monitor, MonitorBuilder, MonitorSnapshot};

/// Start monitoring this process.
pub fn top(config: MonitorConfig) -> Monitor {
    Monitor::new(config)
}

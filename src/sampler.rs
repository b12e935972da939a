//! The windowed sampler: a ring of cumulative snapshots advanced on a fixed
//! tick, and the delta arithmetic rates are built from.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use log::*;

use crate::{
    clock::Clock,
    host::{CpuTime, ResourceUsage},
    probe::Responsiveness,
    schedule::{Scheduler, Ticker},
};

pub mod window;

pub use window::{SLOTS, Snapshot, Window};

/// Where snapshots come from.
#[derive(Clone)]
pub struct Sources {
    pub usage: Arc<dyn ResourceUsage>,
    pub probe: Arc<dyn Responsiveness>,
    pub clock: Arc<dyn Clock>,
}

impl Sources {
    pub fn capture(&self) -> Snapshot {
        Snapshot {
            captured_at: self.clock.now(),
            process_cpu: self.usage.process_cpu(),
            thread_cpu: self.usage.thread_cpu(),
            delay: self.probe.cumulative_delay(),
        }
    }
}

/// A counter that can be differenced against an earlier reading of itself.
pub trait Cumulative: Copy {
    fn since(&self, earlier: &Self) -> Self;
}

impl Cumulative for u64 {
    fn since(&self, earlier: &Self) -> Self {
        self.saturating_sub(*earlier)
    }
}

impl Cumulative for CpuTime {
    fn since(&self, earlier: &Self) -> Self {
        CpuTime::since(self, earlier)
    }
}

/// Raw change of one snapshot field between two snapshots.
pub fn rate_since<T, F>(field: F, oldest: &Snapshot, newest: &Snapshot) -> T
where
    T: Cumulative,
    F: Fn(&Snapshot) -> T,
{
    field(newest).since(&field(oldest))
}

/// Time between two snapshots, never zero.
pub fn elapsed_since(oldest: &Snapshot, newest: &Snapshot) -> Duration {
    newest
        .captured_at
        .saturating_sub(oldest.captured_at)
        .max(Duration::from_nanos(1))
}

#[derive(Debug)]
struct State {
    window: Window,
    destroyed: bool,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn on_tick(state: &Weak<Mutex<State>>, sources: &Sources) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let snapshot = sources.capture();
    let mut state = lock(&state);
    if state.destroyed {
        return;
    }
    state.window.record(snapshot);
    trace!(target: "Sampler", "Tick {} at {:?}", state.window.tick() - 1, snapshot.captured_at);
}

pub struct WindowedSampler {
    interval: Duration,
    started: Duration,
    sources: Sources,
    state: Arc<Mutex<State>>,
    ticker: Box<dyn Ticker>,
}

impl WindowedSampler {
    /// Take the initial snapshot and start capturing every `interval`.
    pub fn new(interval: Duration, sources: Sources, scheduler: &dyn Scheduler) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let initial = sources.capture();
        let state = Arc::new(Mutex::new(State {
            window: Window::new(initial),
            destroyed: false,
        }));
        let weak = Arc::downgrade(&state);
        let captured = sources.clone();
        let ticker = scheduler.every(interval, Box::new(move || on_tick(&weak, &captured)));
        debug!(target: "Sampler", "Sampling every {:?}", interval);
        Self {
            interval,
            started: initial.captured_at,
            sources,
            state,
            ticker,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Clock reading of the initial snapshot.
    pub fn started(&self) -> Duration {
        self.started
    }

    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    pub fn window(&self) -> Window {
        lock(&self.state).window.clone()
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.state).destroyed
    }

    /// The oldest usable snapshot and the newest reading to compare it with.
    ///
    /// While sampling, the newest reading is taken live and not stored.
    /// After [`destroy`](Self::destroy) it is the last stored capture, so
    /// every derived figure stays frozen.
    pub fn bounds(&self) -> (Snapshot, Snapshot) {
        let (oldest, frozen) = {
            let state = lock(&self.state);
            let frozen = state.destroyed.then(|| state.window.newest());
            (state.window.oldest(), frozen)
        };
        let newest = frozen.unwrap_or_else(|| self.sources.capture());
        (oldest, newest)
    }

    /// Stop capturing. Further calls do nothing.
    pub fn destroy(&self) {
        {
            let mut state = lock(&self.state);
            if state.destroyed {
                return;
            }
            state.destroyed = true;
        }
        self.ticker.cancel();
        info!(target: "Sampler", "Sampling stopped");
    }
}

impl Drop for WindowedSampler {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for WindowedSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowedSampler")
            .field("interval", &self.interval)
            .field("started", &self.started)
            .field("state", &*lock(&self.state))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDelay, FakeUsage, ManualClock, ManualScheduler};

    struct Rig {
        clock: ManualClock,
        usage: FakeUsage,
        delay: FakeDelay,
        scheduler: ManualScheduler,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                clock: ManualClock::default(),
                usage: FakeUsage::default(),
                delay: FakeDelay::default(),
                scheduler: ManualScheduler::default(),
            }
        }

        fn sampler(&self, interval: Duration) -> WindowedSampler {
            let sources = Sources {
                usage: Arc::new(self.usage.clone()),
                probe: Arc::new(self.delay.clone()),
                clock: Arc::new(self.clock.clone()),
            };
            WindowedSampler::new(interval, sources, &self.scheduler)
        }

        fn tick(&self, interval: Duration) {
            self.clock.advance(interval);
            self.scheduler.fire();
        }
    }

    const INTERVAL: Duration = Duration::from_millis(1000);

    #[test]
    fn schedules_at_the_interval() {
        let rig = Rig::new();
        let _sampler = rig.sampler(INTERVAL);
        assert_eq!(rig.scheduler.periods(), vec![INTERVAL]);
    }

    #[test]
    fn fresh_sampler_compares_against_initial_snapshot() {
        let rig = Rig::new();
        let sampler = rig.sampler(INTERVAL);
        rig.clock.advance(Duration::from_millis(300));
        let (oldest, newest) = sampler.bounds();
        assert_eq!(oldest.captured_at, Duration::ZERO);
        assert_eq!(newest.captured_at, Duration::from_millis(300));
        assert_eq!(sampler.window().filled(), 1);
    }

    #[test]
    fn steady_state_spans_four_intervals() {
        let rig = Rig::new();
        let sampler = rig.sampler(INTERVAL);
        for _ in 0..10 {
            rig.tick(INTERVAL);
        }
        // Read just before the next tick is due.
        rig.clock.advance(INTERVAL);
        let (oldest, newest) = sampler.bounds();
        assert_eq!(sampler.window().tick(), 11);
        assert_eq!(oldest.captured_at, Duration::from_secs(7));
        assert_eq!(elapsed_since(&oldest, &newest), INTERVAL * SLOTS as u32);
    }

    #[test]
    fn cpu_deltas_never_negative() {
        let rig = Rig::new();
        let sampler = rig.sampler(INTERVAL);
        let mut user = 0;
        for step in 0..12u64 {
            user += step * 700;
            rig.usage.set_process(user, step * 3);
            rig.tick(INTERVAL);
            let (oldest, newest) = sampler.bounds();
            let delta: CpuTime = rate_since(|s| s.process_cpu, &oldest, &newest);
            assert!(delta.total() <= user + step * 3);
            assert_eq!(delta.user, newest.process_cpu.user - oldest.process_cpu.user);
        }
    }

    #[test]
    fn rate_since_saturates_a_counter_that_went_backwards() {
        let oldest = Snapshot {
            delay: 80,
            ..Default::default()
        };
        let newest = Snapshot {
            delay: 30,
            ..Default::default()
        };
        assert_eq!(rate_since(|s| s.delay, &oldest, &newest), 0);
    }

    #[test]
    fn zero_elapsed_is_floored() {
        let snapshot = Snapshot::default();
        assert_eq!(elapsed_since(&snapshot, &snapshot), Duration::from_nanos(1));
    }

    #[test]
    fn destroy_is_idempotent_and_stops_ticks() {
        let rig = Rig::new();
        let sampler = rig.sampler(INTERVAL);
        rig.tick(INTERVAL);
        rig.tick(INTERVAL);
        sampler.destroy();
        sampler.destroy();
        assert!(sampler.is_destroyed());
        rig.clock.advance(INTERVAL);
        assert_eq!(rig.scheduler.fire(), 0);
        assert_eq!(sampler.window().tick(), 3);
    }

    #[test]
    fn destroyed_sampler_freezes_on_last_capture() {
        let rig = Rig::new();
        let sampler = rig.sampler(INTERVAL);
        rig.usage.set_process(5_000, 0);
        rig.tick(INTERVAL);
        sampler.destroy();
        rig.usage.set_process(900_000, 0);
        rig.clock.advance(INTERVAL * 5);
        let (oldest, newest) = sampler.bounds();
        assert_eq!(newest.captured_at, INTERVAL);
        assert_eq!(newest.process_cpu.user, 5_000);
        assert_eq!(oldest.captured_at, Duration::ZERO);
    }

    #[test]
    fn dropping_the_sampler_cancels_the_schedule() {
        let rig = Rig::new();
        drop(rig.sampler(INTERVAL));
        assert_eq!(rig.scheduler.fire(), 0);
    }
}

use std::time::Duration;

use crate::host::CpuTime;

/// Number of slots in the ring.
pub const SLOTS: usize = 4;

/// Cumulative readings taken at one tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub captured_at: Duration,
    pub process_cpu: CpuTime,
    pub thread_cpu: CpuTime,
    /// Cumulative responsiveness delay in milliseconds.
    pub delay: u64,
}

/// Fixed ring of the most recent snapshots, indexed by `tick % SLOTS`.
///
/// Slot 0 is filled on construction and slots are only ever overwritten,
/// so there is always at least one filled slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    slots: [Option<Snapshot>; SLOTS],
    tick: u64,
}

impl Window {
    pub fn new(initial: Snapshot) -> Self {
        let mut slots = [None; SLOTS];
        slots[0] = Some(initial);
        Self { slots, tick: 1 }
    }

    /// The tick the next capture will be stored under.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn record(&mut self, snapshot: Snapshot) {
        let index = (self.tick % SLOTS as u64) as usize;
        self.slots[index] = Some(snapshot);
        self.tick += 1;
    }

    /// Index of the snapshot furthest back that is still usable.
    ///
    /// In steady state that is the capture `SLOTS` ticks ago. While warming
    /// up the scan walks forward past empty slots until it reaches slot 0.
    pub fn oldest_index(&self) -> usize {
        // SLOTS divides 2^64 so the wrapped residue is still (tick - SLOTS) mod SLOTS.
        let start = (self.tick.wrapping_sub(SLOTS as u64) % SLOTS as u64) as usize;
        (0..SLOTS)
            .map(|step| (start + step) % SLOTS)
            .find(|&index| self.slots[index].is_some())
            .unwrap_or(0)
    }

    pub fn oldest(&self) -> Snapshot {
        self.slots[self.oldest_index()].unwrap_or_default()
    }

    /// The last stored capture (the initial one before any tick).
    pub fn newest(&self) -> Snapshot {
        let index = ((self.tick - 1) % SLOTS as u64) as usize;
        self.slots[index].unwrap_or_default()
    }

    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

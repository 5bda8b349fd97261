use core::sync::atomic::{AtomicU32, Ordering};

use crate::hardware::TimeSource;

/// Count of Timer0 sample clock interrupts since the tick was first started.
///
/// 64 bits wide but stored as two 32-bit halves, since the target can only load and store
/// words atomically. The interrupt handler is the only writer and is never preempted by a
/// reader, so a reader only has to detect that a tick happened between its two loads.
pub struct AlternateClock {
    high: AtomicU32,
    low: AtomicU32,
}

impl AlternateClock {
    pub const fn new() -> Self {
        Self {
            high: AtomicU32::new(0),
            low: AtomicU32::new(0),
        }
    }

    // No read-modify-write atomics on thumbv6m. Fine with a single writer.
    pub(crate) fn tick(&self) {
        let low = self.low.load(Ordering::Relaxed).wrapping_add(1);
        if low == 0 {
            let high = self.high.load(Ordering::Relaxed).wrapping_add(1);
            self.high.store(high, Ordering::Release);
        }
        self.low.store(low, Ordering::Release);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks_with(|| {})
    }

    /// `between_loads` runs where the interrupt handler can preempt the reader.
    #[inline]
    fn ticks_with(&self, mut between_loads: impl FnMut()) -> u64 {
        loop {
            let high = self.high.load(Ordering::Acquire);
            between_loads();
            let low = self.low.load(Ordering::Acquire);
            if high == self.high.load(Ordering::Acquire) {
                return ((high as u64) << 32) | low as u64;
            }
        }
    }

    /// Microseconds since the tick was started, including the part of the current period
    /// that has already elapsed.
    pub fn micros_total<T: TimeSource>(&self, time: &T, period_micros: u32) -> u64 {
        let (ticks, elapsed) = loop {
            let before = self.ticks();
            let pending = time.tick_pending();
            let elapsed = time.period_elapsed_micros();
            // A wrap between the two flag reads leaves open which period `elapsed` belongs to.
            if pending != time.tick_pending() || before != self.ticks() {
                continue;
            }
            // Pending before `elapsed` was read, so `elapsed` already counts from the wrap.
            break (before.wrapping_add(pending as u64), elapsed);
        };
        ticks
            .wrapping_mul(period_micros as u64)
            .wrapping_add(elapsed.min(period_micros.saturating_sub(1)) as u64)
    }

    #[cfg(test)]
    pub(crate) fn preset(&self, ticks: u64) {
        self.high.store((ticks >> 32) as u32, Ordering::Release);
        self.low.store(ticks as u32, Ordering::Release);
    }
}

impl Default for AlternateClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Distance between the alternate timebase and the counter currently feeding it.
///
/// Only written by foreground code inside a critical section, so a reader never sees a write
/// in progress.
pub(crate) struct TimebaseOffset {
    high: AtomicU32,
    low: AtomicU32,
}

impl TimebaseOffset {
    pub const fn new() -> Self {
        Self {
            high: AtomicU32::new(0),
            low: AtomicU32::new(0),
        }
    }

    pub fn get(&self) -> u64 {
        let high = self.high.load(Ordering::Acquire);
        let low = self.low.load(Ordering::Acquire);
        ((high as u64) << 32) | low as u64
    }

    pub fn set(&self, _cs: critical_section::CriticalSection<'_>, offset: u64) {
        self.high.store((offset >> 32) as u32, Ordering::Release);
        self.low.store(offset as u32, Ordering::Release);
    }
}

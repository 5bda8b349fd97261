//! Register-level capabilities the player needs from the platform.
//!
//! Everything in here is called with the player's critical section held, either from
//! foreground code or from the sample clock interrupt, so implementations must not block.

use crate::pin::SpeakerPin;
use crate::timer::SampleTimer;

/// PWM carrier whose duty cycle is the emulated DAC output.
pub trait CarrierGenerator {
    /// Starts fast PWM on `pin`: counter wraps every 256 ticks, non-inverted compare output,
    /// compare value at [`config::ZERO_SAMPLE`].
    fn configure(&mut self, pin: SpeakerPin);

    fn set_duty(&mut self, duty: u8);

    /// Disconnects the compare output of `pin` and stops the counter.
    fn teardown(&mut self, pin: SpeakerPin);
}

/// Periodic interrupt source at the sample rate.
pub trait SampleClock {
    /// Starts interrupting every `timer.period()`.
    fn configure(&mut self, timer: SampleTimer);

    /// Called first thing in every interrupt of `timer`. One-shot timers re-arm here.
    fn acknowledge(&mut self, timer: SampleTimer);

    /// Stops the interrupt and hands the timer back in its reset configuration.
    fn teardown(&mut self, timer: SampleTimer);
}

/// Lock-free time readings. Called from foreground code, with or without the critical
/// section held.
pub trait TimeSource {
    /// The platform's own free-running microsecond counter.
    fn platform_micros(&self) -> u64;

    /// Microseconds elapsed within the current period of the Timer0 tick.
    fn period_elapsed_micros(&self) -> u32;

    /// Whether the Timer0 tick has wrapped but its interrupt has not been serviced yet.
    fn tick_pending(&self) -> bool {
        false
    }
}

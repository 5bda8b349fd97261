//! Plays raw unsigned 8-bit PCM on a speaker pin by pulse-width modulation.
//!
//! Two timers make up the software DAC. A carrier timer runs fast PWM (256 ticks per cycle,
//! far above the audible range) on the speaker pin, and a sample clock interrupts at the
//! sample rate to copy the next sample into the carrier's duty cycle register.
//!
//! The sample clock is either a dedicated timer (8000 Hz) or the system tick timer
//! (7812.5 Hz). In the latter case the platform's delay primitives are gone, and the
//! [`Player`] provides `alt_*` replacements counted by the sample clock interrupt.
//!
//! Audio data must be unsigned, 8 bit, mono, without any header, and small enough to fit
//! in flash.

#![cfg_attr(not(test), no_std)]

pub mod clock;
pub mod hardware;
pub mod pin;
pub mod player;
pub mod timer;

#[cfg(test)]
mod testing;

pub use hardware::{CarrierGenerator, SampleClock, TimeSource};
pub use pin::SpeakerPin;
pub use player::{AltDelay, PlaybackStatus, Player};
pub use timer::SampleTimer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    #[error("the sample timer cannot be changed while playback is active")]
    PlaybackActive,
}

#![no_std]

// ----------------------------------------------------------------------------
// Configurable
// ----------------------------------------------------------------------------
pub const DEFAULT_SPEAKER_PIN: u8 = 11;
pub const USE_TIMER0: bool = true; // Firmware default; frees TIMER alarm 0 for other uses
pub const CARRIER_DIV_INT: u8 = 7;
pub const CARRIER_DIV_FRAC: u8 = 10; // In 1/16ths

// ----------------------------------------------------------------------------
// Should probably not be changed:
// ----------------------------------------------------------------------------
pub const CLOCK_RATE: u32 = 125_000_000;
pub const SPEAKER_PINS: [u8; 2] = [3, DEFAULT_SPEAKER_PIN];
pub const BITS_PER_SAMPLE: u16 = 8;
pub const TIMER0_PERIOD_US: u32 = 128; // 7812.5 Hz
pub const TIMER1_PERIOD_US: u32 = 125; // 8000 Hz

// ----------------------------------------------------------------------------
// Derived from other values:
// ----------------------------------------------------------------------------
pub const ZERO_SAMPLE: u8 = 1 << (BITS_PER_SAMPLE - 1);
pub const CARRIER_TOP: u16 = (1 << BITS_PER_SAMPLE) - 1;

pub const TIMER0_SAMPLE_RATE_MILLIHERTZ: u32 = 1_000_000_000 / TIMER0_PERIOD_US;
pub const TIMER1_SAMPLE_RATE_MILLIHERTZ: u32 = 1_000_000_000 / TIMER1_PERIOD_US;

pub const TICKS_PER_MICRO: u32 = CLOCK_RATE / 1_000_000;
pub const SYSTICK_RELOAD: u32 = TIMER0_PERIOD_US * TICKS_PER_MICRO - 1;

pub const CARRIER_FREQ_HZ: u32 = CLOCK_RATE / (CARRIER_DIV_INT as u32 * 16 + CARRIER_DIV_FRAC as u32)
    * 16
    / (CARRIER_TOP as u32 + 1);

// The carrier has to stay far enough above the sample rate to be filtered out by the speaker.
const _: () = assert!(CARRIER_FREQ_HZ as u64 * 1000 >= 8 * TIMER1_SAMPLE_RATE_MILLIHERTZ as u64);
const _: () = assert!(SYSTICK_RELOAD < (1 << 24));

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::OutputPin;

pub const BLINK_PANIC: [u8; 18] = [1, 0, 1, 0, 1, 0, 0, 3, 0, 3, 0, 3, 0, 0, 1, 0, 1, 0];

/// Busy-waits by counting core cycles. Keeps working when no timer can be trusted.
pub struct CycleDelay;

impl DelayMs<u32> for CycleDelay {
    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            cortex_m::asm::delay(config::CLOCK_RATE / 1000);
        }
    }
}

pub fn blink_signals(
    pin: &mut dyn OutputPin<Error = core::convert::Infallible>,
    delay: &mut dyn DelayMs<u32>,
    sig: &[u8],
) {
    for bit in sig {
        let _ = if *bit != 0 {
            pin.set_high()
        } else {
            pin.set_low()
        };

        let length = if *bit > 0 { *bit } else { 1 };

        for _ in 0..length {
            delay.delay_ms(200);
        }
    }

    let _ = pin.set_low();

    delay.delay_ms(500);
}

pub fn blink_signals_loop(
    pin: &mut dyn OutputPin<Error = core::convert::Infallible>,
    delay: &mut dyn DelayMs<u32>,
    sig: &[u8],
) -> ! {
    loop {
        blink_signals(pin, delay, sig);
        delay.delay_ms(1000);
    }
}

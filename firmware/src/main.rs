//! # Speaker PCM demo
//!
//! Plays a looping sine tone and then a one-shot chime on a speaker attached to GPIO11 (or
//! GPIO3), lighting the on-board LED while audio plays. After every round the sample clock
//! moves between SysTick (7812.5 Hz) and TIMER alarm 0 (8000 Hz).
//!
//! Wire the pin through a low-pass RC filter (e.g. 1 kOhm + 100 nF) to the speaker or
//! amplifier.

#![no_std]
#![no_main]

mod blink;
mod carrier;
mod panic;
mod sample_clock;
mod sounds;

use defmt_rtt as _;

use cortex_m_rt::exception;
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::OutputPin;
// The macro for our start-up function
use rp_pico::entry;

use rp_pico::hal;
use rp_pico::hal::pac;

use pac::interrupt;
use speaker_pcm::{Player, SampleTimer};

use crate::carrier::PwmCarrier;
use crate::sample_clock::{RpTime, SampleClocks};

static PLAYER: Player<PwmCarrier, SampleClocks, RpTime> = Player::new(RpTime);

#[exception]
fn SysTick() {
    PLAYER.on_sample_tick(SampleTimer::Timer0);
}

#[interrupt]
fn TIMER_IRQ_0() {
    PLAYER.on_sample_tick(SampleTimer::Timer1);
}

/// Entry point to our bare-metal application.
///
/// The `#[entry]` macro ensures the Cortex-M start-up code calls this function
/// as soon as all global variables are initialised.
#[entry]
fn main() -> ! {
    // Grab our singleton objects
    let mut pac = unsafe { pac::Peripherals::steal() };
    let core = unsafe { pac::CorePeripherals::steal() };

    // Set up the watchdog driver - needed by the clock setup code
    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);

    // Configure the clocks
    //
    // The default is to generate a 125 MHz system clock
    if hal::clocks::init_clocks_and_plls(
        rp_pico::XOSC_CRYSTAL_FREQ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .is_err()
    {
        panic!("clock setup failed");
    }

    // The single-cycle I/O block controls our GPIO pins
    let sio = hal::Sio::new(pac.SIO);

    // Set the pins up according to their function on this particular board
    let pins = rp_pico::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    let mut timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS);
    let Some(alarm) = timer.alarm_0() else {
        panic!("alarm 0 already taken");
    };
    let slices = hal::pwm::Slices::new(pac.PWM, &mut pac.RESETS);

    // Samples are only fed from the sample clock interrupts.
    unsafe {
        cortex_m::interrupt::enable();
    }

    // Nothing plays yet, so the selection cannot be rejected.
    let _ = PLAYER.use_timer0(config::USE_TIMER0);
    let pin = PLAYER.set_speaker_pin(config::DEFAULT_SPEAKER_PIN);
    PLAYER.init(
        PwmCarrier::new(slices, pins.gpio3, pins.gpio11),
        SampleClocks::new(core.SYST, alarm),
    );
    defmt::info!("speaker on pin {}, sample clock {}", pin, PLAYER.timer());

    let mut led_pin = pins.led.into_push_pull_output();
    let mut delay = PLAYER.delay();

    loop {
        let _ = led_pin.set_high();
        PLAYER.start_playback(&sounds::TONE, sounds::TONE.len() as i32, true);
        delay.delay_ms(1000u32);
        PLAYER.stop_playback();
        let _ = led_pin.set_low();

        delay.delay_ms(500u32);

        let _ = led_pin.set_high();
        let started = PLAYER.alt_millis();
        PLAYER.start_playback(sounds::CHIME, sounds::CHIME.len() as i32, false);
        while PLAYER.is_playing() {
            delay.delay_ms(10u32);
        }
        let _ = led_pin.set_low();
        defmt::debug!(
            "chime took {} ms",
            PLAYER.alt_millis().wrapping_sub(started)
        );

        delay.delay_ms(2000u32);

        let next = PLAYER.timer() == SampleTimer::Timer1;
        if let Err(e) = PLAYER.use_timer0(next) {
            defmt::warn!("keeping {}: {}", PLAYER.timer(), e);
        } else {
            defmt::info!("sample clock {}", PLAYER.timer());
        }
    }
}

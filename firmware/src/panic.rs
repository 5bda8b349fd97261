use rp_pico::{hal, pac};

use crate::blink;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    cortex_m::interrupt::disable();

    let core = unsafe { pac::CorePeripherals::steal() };
    let mut pac = unsafe { pac::Peripherals::steal() };

    // Silence the speaker before anything else: stop the sample clocks and every PWM slice.
    let mut syst = core.SYST;
    syst.disable_interrupt();
    syst.disable_counter();
    pac::NVIC::mask(pac::Interrupt::TIMER_IRQ_0);
    pac.PWM.en.write(|w| unsafe { w.bits(0) });

    defmt::error!("{}", defmt::Display2Format(info));

    // The single-cycle I/O block controls our GPIO pins
    let sio = hal::Sio::new(pac.SIO);

    // Resetting the IO bank also disconnects the speaker pin from PWM
    let pins = rp_pico::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );
    let mut led_pin = pins.led.into_push_pull_output();

    blink::blink_signals_loop(&mut led_pin, &mut blink::CycleDelay, &blink::BLINK_PANIC);
}

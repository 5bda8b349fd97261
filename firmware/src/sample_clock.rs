use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};
use rp_pico::hal;
use rp_pico::hal::pac;

use hal::timer::{Alarm, Alarm0};
use speaker_pcm::{SampleClock, SampleTimer, TimeSource};

/// Both sample clock candidates.
///
/// Timer0 is SysTick, which `cortex_m::delay::Delay` would otherwise own. Timer1 is TIMER
/// alarm 0; the alarm is one-shot, so it is re-armed on every acknowledge.
pub struct SampleClocks {
    syst: SYST,
    alarm: Alarm0,
}

impl SampleClocks {
    pub fn new(syst: SYST, alarm: Alarm0) -> Self {
        Self { syst, alarm }
    }
}

impl SampleClock for SampleClocks {
    fn configure(&mut self, timer: SampleTimer) {
        match timer {
            SampleTimer::Timer0 => {
                self.syst.set_clock_source(SystClkSource::Core);
                self.syst.set_reload(config::SYSTICK_RELOAD);
                self.syst.clear_current();
                self.syst.enable_interrupt();
                self.syst.enable_counter();
            }
            SampleTimer::Timer1 => {
                self.alarm.clear_interrupt();
                self.alarm.enable_interrupt();
                // Only fails for periods longer than the alarm range.
                let _ = self.alarm.schedule(timer.period());
                unsafe {
                    pac::NVIC::unmask(pac::Interrupt::TIMER_IRQ_0);
                }
            }
        }
    }

    fn acknowledge(&mut self, timer: SampleTimer) {
        if timer == SampleTimer::Timer1 {
            self.alarm.clear_interrupt();
            let _ = self.alarm.schedule(timer.period());
        }
    }

    fn teardown(&mut self, timer: SampleTimer) {
        match timer {
            SampleTimer::Timer0 => {
                self.syst.disable_interrupt();
                self.syst.disable_counter();
                self.syst.clear_current();
            }
            SampleTimer::Timer1 => {
                pac::NVIC::mask(pac::Interrupt::TIMER_IRQ_0);
                self.alarm.disable_interrupt();
                let _ = self.alarm.cancel();
                self.alarm.clear_interrupt();
            }
        }
    }
}

/// Register-level time readings, usable from any context without owning a peripheral.
pub struct RpTime;

impl TimeSource for RpTime {
    fn platform_micros(&self) -> u64 {
        let timer = unsafe { &*pac::TIMER::ptr() };
        // The raw registers are not latched, so re-read the high word until it is stable.
        let mut high = timer.timerawh.read().bits();
        loop {
            let low = timer.timerawl.read().bits();
            let next_high = timer.timerawh.read().bits();
            if next_high == high {
                return ((high as u64) << 32) | low as u64;
            }
            high = next_high;
        }
    }

    fn period_elapsed_micros(&self) -> u32 {
        // SysTick counts down from the reload value.
        let remaining = SYST::get_current().min(config::SYSTICK_RELOAD);
        (config::SYSTICK_RELOAD - remaining) / config::TICKS_PER_MICRO
    }

    fn tick_pending(&self) -> bool {
        SCB::is_pendst_pending()
    }
}

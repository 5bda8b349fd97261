use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::{CriticalSection, Mutex};
use embedded_hal::blocking::delay::{DelayMs, DelayUs};

use crate::clock::{AlternateClock, TimebaseOffset};
use crate::hardware::{CarrierGenerator, SampleClock, TimeSource};
use crate::pin::SpeakerPin;
use crate::timer::SampleTimer;
use crate::Error;

struct Session {
    source: &'static [u8],
    cursor: usize,
    looping: bool,
    active: bool,
    /// Pin the carrier was started on. Rebinding the speaker pin only affects the next start.
    pin: SpeakerPin,
}

impl Session {
    const IDLE: Session = Session {
        source: &[],
        cursor: 0,
        looping: false,
        active: false,
        pin: SpeakerPin::Pin11,
    };
}

struct Hardware<C, S> {
    carrier: C,
    clock: S,
    /// The Timer0 tick keeps running between sessions to feed the alternate timebase.
    tick_running: bool,
}

impl<C: CarrierGenerator, S: SampleClock> Hardware<C, S> {
    fn start_clock(&mut self, timer: SampleTimer) {
        match timer {
            SampleTimer::Timer0 => self.start_tick(),
            SampleTimer::Timer1 => self.clock.configure(SampleTimer::Timer1),
        }
    }

    fn start_tick(&mut self) {
        if !self.tick_running {
            self.clock.configure(SampleTimer::Timer0);
            self.tick_running = true;
        }
    }

    fn stop_tick(&mut self) {
        if self.tick_running {
            self.clock.teardown(SampleTimer::Timer0);
            self.tick_running = false;
        }
    }

    /// Ends `session` and releases everything it holds. Safe from the interrupt handler.
    fn halt(&mut self, session: &mut Session, timer: SampleTimer) {
        if !session.active {
            return;
        }
        self.carrier.set_duty(config::ZERO_SAMPLE);
        self.carrier.teardown(session.pin);
        if timer == SampleTimer::Timer1 {
            self.clock.teardown(SampleTimer::Timer1);
        }
        *session = Session::IDLE;
    }
}

struct Shared<C, S> {
    pin: SpeakerPin,
    session: Session,
    hardware: Option<Hardware<C, S>>,
}

/// Snapshot of the playback session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlaybackStatus {
    pub active: bool,
    pub cursor: usize,
    pub length: usize,
    pub looping: bool,
}

/// The playback engine, shared between foreground code and the sample clock interrupt.
///
/// Meant to live in a `static`: construct it with [`Player::new`], attach the hardware with
/// [`Player::init`] and call [`Player::on_sample_tick`] from the interrupt handler of every
/// timer that can act as the sample clock.
pub struct Player<C, S, T> {
    shared: Mutex<RefCell<Shared<C, S>>>,
    timer0: AtomicBool,
    /// Mirrors `Hardware::tick_running` for the lock-free time readings.
    ticking: AtomicBool,
    pub(crate) clock: AlternateClock,
    offset: TimebaseOffset,
    time: T,
}

impl<C, S, T> Player<C, S, T> {
    pub const fn new(time: T) -> Self {
        Self {
            shared: Mutex::new(RefCell::new(Shared {
                pin: SpeakerPin::from_requested(config::DEFAULT_SPEAKER_PIN),
                session: Session::IDLE,
                hardware: None,
            })),
            timer0: AtomicBool::new(false),
            ticking: AtomicBool::new(false),
            clock: AlternateClock::new(),
            offset: TimebaseOffset::new(),
            time,
        }
    }

    pub fn timer(&self) -> SampleTimer {
        SampleTimer::from_use_timer0(self.timer0.load(Ordering::Acquire))
    }

    /// Sets the pin the speaker is connected to and returns the pin that will actually be
    /// used. Only 3 and 11 can carry the PWM signal; anything else selects 11.
    pub fn set_speaker_pin(&self, pin: u8) -> u8 {
        let pin = SpeakerPin::from_requested(pin);
        critical_section::with(|cs| self.shared.borrow_ref_mut(cs).pin = pin);
        pin.number()
    }

    pub fn get_speaker_pin(&self) -> u8 {
        critical_section::with(|cs| self.shared.borrow_ref(cs).pin.number())
    }

    pub fn is_playing(&self) -> bool {
        critical_section::with(|cs| self.shared.borrow_ref(cs).session.active)
    }

    pub fn status(&self) -> PlaybackStatus {
        critical_section::with(|cs| {
            let shared = self.shared.borrow_ref(cs);
            PlaybackStatus {
                active: shared.session.active,
                cursor: shared.session.cursor,
                length: shared.session.source.len(),
                looping: shared.session.looping,
            }
        })
    }
}

impl<C: CarrierGenerator, S: SampleClock, T: TimeSource> Player<C, S, T> {
    /// Attaches the timers. If Timer0 is selected its tick starts right away. Hardware that
    /// was attached before is released first and dropped.
    pub fn init(&self, carrier: C, clock: S) {
        let _ = self.release();
        critical_section::with(|cs| {
            let now = self.micros_total();
            let mut hardware = Hardware {
                carrier,
                clock,
                tick_running: false,
            };
            if self.timer() == SampleTimer::Timer0 {
                hardware.start_tick();
            }
            self.switch_timebase(cs, now, hardware.tick_running);
            self.shared.borrow_ref_mut(cs).hardware = Some(hardware);
        });
    }

    /// Stops playback and the Timer0 tick and hands the timers back in their reset state.
    pub fn release(&self) -> Option<(C, S)> {
        let timer = self.timer();
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            let shared = &mut *shared;
            let mut hardware = shared.hardware.take()?;
            let now = self.micros_total();
            hardware.halt(&mut shared.session, timer);
            hardware.stop_tick();
            self.switch_timebase(cs, now, false);
            Some((hardware.carrier, hardware.clock))
        })
    }

    /// Selects the system tick timer (`true`, 7812.5 Hz) or the dedicated timer (`false`,
    /// 8000 Hz) as the sample clock.
    ///
    /// Rejected with [`Error::PlaybackActive`] while a session is playing; the session and
    /// the previous selection stay untouched.
    pub fn use_timer0(&self, use_timer0: bool) -> Result<(), Error> {
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            if shared.session.active {
                return Err(Error::PlaybackActive);
            }
            if let Some(hardware) = shared.hardware.as_mut() {
                let now = self.micros_total();
                if use_timer0 {
                    hardware.start_tick();
                } else {
                    hardware.stop_tick();
                }
                self.switch_timebase(cs, now, hardware.tick_running);
            }
            self.timer0.store(use_timer0, Ordering::Release);
            Ok(())
        })?;

        #[cfg(feature = "defmt")]
        defmt::debug!("sample clock: {}", self.timer());
        Ok(())
    }

    /// Starts playing the first `length` samples of `data`, stopping any session that is
    /// still running. Does nothing if there is nothing to play or no hardware is attached.
    ///
    /// `length` is clamped to the length of `data`.
    ///
    /// Interrupts must be enabled globally for the session to advance. The engine never
    /// enables or disables them itself beyond its own critical sections; the firmware turns
    /// them on before [`Player::init`].
    pub fn start_playback(&self, data: &'static [u8], length: i32, looping: bool) {
        let Ok(length) = usize::try_from(length) else {
            return;
        };
        let source = &data[..length.min(data.len())];
        if source.is_empty() {
            return;
        }

        let timer = self.timer();
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            let Shared {
                pin,
                session,
                hardware,
            } = &mut *shared;
            let Some(hardware) = hardware.as_mut() else {
                return;
            };

            hardware.halt(session, timer);
            hardware.carrier.configure(*pin);
            *session = Session {
                source,
                cursor: 0,
                looping,
                active: true,
                pin: *pin,
            };
            hardware.start_clock(timer);

            #[cfg(feature = "defmt")]
            defmt::debug!("playing {} samples on pin {}", source.len(), pin.number());
        });
    }

    /// Stops playback. Does nothing when idle.
    pub fn stop_playback(&self) {
        let timer = self.timer();
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            let Shared {
                session, hardware, ..
            } = &mut *shared;
            if let Some(hardware) = hardware.as_mut() {
                hardware.halt(session, timer);
            }
        });
    }

    /// The sample clock interrupt handler. `source` is the timer that fired.
    pub fn on_sample_tick(&self, source: SampleTimer) {
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            let Shared {
                session, hardware, ..
            } = &mut *shared;
            let Some(hardware) = hardware.as_mut() else {
                return;
            };

            hardware.clock.acknowledge(source);
            if source != self.timer() {
                return;
            }
            if source.uses_alternate_timebase() {
                self.clock.tick();
            }
            if !session.active {
                return;
            }

            let Some(&sample) = session.source.get(session.cursor) else {
                hardware.halt(session, source);
                return;
            };
            hardware.carrier.set_duty(sample);
            session.cursor += 1;

            if session.cursor == session.source.len() {
                if session.looping {
                    session.cursor = 0;
                } else {
                    hardware.halt(session, source);
                }
            }
        });
    }
}

// Alternate timebase
impl<C, S, T: TimeSource> Player<C, S, T> {
    /// Reading of the counter that feeds the timebase while the Timer0 tick is `ticking`.
    fn source_micros(&self, ticking: bool) -> u64 {
        if ticking {
            self.clock
                .micros_total(&self.time, SampleTimer::Timer0.period_micros())
        } else {
            self.time.platform_micros()
        }
    }

    fn micros_total(&self) -> u64 {
        self.source_micros(self.ticking.load(Ordering::Acquire))
            .wrapping_add(self.offset.get())
    }

    /// Moves the timebase onto the counter selected by `ticking` so that it continues from
    /// `now`, the last reading taken from the previous counter.
    fn switch_timebase(&self, cs: CriticalSection<'_>, now: u64, ticking: bool) {
        if ticking == self.ticking.load(Ordering::Acquire) {
            return;
        }
        self.offset.set(cs, now.wrapping_sub(self.source_micros(ticking)));
        self.ticking.store(ticking, Ordering::Release);
    }

    /// Microseconds counted by the Timer0 tick while it runs and by the platform's counter
    /// otherwise. Never moves backwards when the sample clock changes. Wraps after 2^32 us,
    /// compare with `wrapping_sub`.
    pub fn alt_micros(&self) -> u32 {
        self.micros_total() as u32
    }

    /// Milliseconds, same base as [`Player::alt_micros`]. Wraps after 2^32 ms.
    pub fn alt_millis(&self) -> u32 {
        (self.micros_total() / 1000) as u32
    }

    /// Spins until [`Player::alt_micros`] advanced by at least `us`. Must not be called from
    /// the sample clock interrupt or with interrupts disabled while Timer0 is selected.
    pub fn alt_delay_microseconds(&self, us: u32) {
        let start = self.alt_micros();
        while self.alt_micros().wrapping_sub(start) < us {
            core::hint::spin_loop();
        }
    }

    pub fn alt_delay(&self, ms: u32) {
        for _ in 0..ms {
            self.alt_delay_microseconds(1000);
        }
    }

    /// Delay provider for drivers that expect one.
    pub fn delay(&self) -> AltDelay<'_, C, S, T> {
        AltDelay { player: self }
    }
}

/// embedded-hal delay backed by the alternate timebase.
pub struct AltDelay<'a, C, S, T> {
    player: &'a Player<C, S, T>,
}

impl<C, S, T: TimeSource> DelayMs<u32> for AltDelay<'_, C, S, T> {
    fn delay_ms(&mut self, ms: u32) {
        self.player.alt_delay(ms);
    }
}

impl<C, S, T: TimeSource> DelayMs<u16> for AltDelay<'_, C, S, T> {
    fn delay_ms(&mut self, ms: u16) {
        self.player.alt_delay(ms as u32);
    }
}

impl<C, S, T: TimeSource> DelayMs<u8> for AltDelay<'_, C, S, T> {
    fn delay_ms(&mut self, ms: u8) {
        self.player.alt_delay(ms as u32);
    }
}

impl<C, S, T: TimeSource> DelayUs<u32> for AltDelay<'_, C, S, T> {
    fn delay_us(&mut self, us: u32) {
        self.player.alt_delay_microseconds(us);
    }
}

impl<C, S, T: TimeSource> DelayUs<u16> for AltDelay<'_, C, S, T> {
    fn delay_us(&mut self, us: u16) {
        self.player.alt_delay_microseconds(us as u32);
    }
}

impl<C, S, T: TimeSource> DelayUs<u8> for AltDelay<'_, C, S, T> {
    fn delay_us(&mut self, us: u8) {
        self.player.alt_delay_microseconds(us as u32);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::testing::{FakeCarrier, FakeClock, FakeTime, Recorder};

    type TestPlayer = Player<FakeCarrier, FakeClock, FakeTime>;

    fn player(use_timer0: bool) -> (TestPlayer, Recorder) {
        player_with_time(use_timer0, FakeTime::default())
    }

    fn player_with_time(use_timer0: bool, time: FakeTime) -> (TestPlayer, Recorder) {
        let recorder = Recorder::default();
        let player = Player::new(time);
        player.use_timer0(use_timer0).unwrap();
        player.init(recorder.carrier(), recorder.clock());
        (player, recorder)
    }

    fn tick(player: &TestPlayer, n: usize) {
        for _ in 0..n {
            player.on_sample_tick(player.timer());
        }
    }

    #[test]
    fn speaker_pin_binding() {
        let (player, _) = player(false);
        assert_eq!(player.get_speaker_pin(), 11);
        assert_eq!(player.set_speaker_pin(3), 3);
        assert_eq!(player.get_speaker_pin(), 3);
        assert_eq!(player.set_speaker_pin(11), 11);
        assert_eq!(player.get_speaker_pin(), 11);
        player.set_speaker_pin(3);
        assert_eq!(player.set_speaker_pin(9), 11);
        assert_eq!(player.get_speaker_pin(), 11);
    }

    #[test]
    fn rebinding_pin_does_not_move_running_session() {
        let (player, recorder) = player(false);
        player.set_speaker_pin(3);
        player.start_playback(&[1, 2, 3, 4], 4, false);
        assert_eq!(player.set_speaker_pin(11), 11);
        tick(&player, 4);

        let trace = recorder.get();
        assert_eq!(trace.teardowns, vec![SpeakerPin::Pin3]);
        assert_eq!(trace.carrier, None);
    }

    #[test]
    fn one_shot_plays_each_sample_once_then_stops() {
        let (player, recorder) = player(false);
        player.start_playback(&[0, 128, 255], 3, false);
        assert!(recorder.get().is_running(SampleTimer::Timer1));
        assert_eq!(recorder.get().duty, 128);

        tick(&player, 2);
        assert!(player.is_playing());
        tick(&player, 1);
        assert!(!player.is_playing());
        assert_eq!(player.status().cursor, 0);

        tick(&player, 5);
        let trace = recorder.get();
        // Three samples, then the neutral duty of the stop transition.
        assert_eq!(trace.writes, vec![0, 128, 255, 128]);
        assert_eq!(trace.carrier, None);
        assert!(!trace.is_running(SampleTimer::Timer1));
    }

    #[test]
    fn looping_session_wraps_until_stopped() {
        let (player, recorder) = player(false);
        player.start_playback(&[10, 20], 2, true);
        tick(&player, 7);
        assert!(player.is_playing());
        assert_eq!(recorder.get().writes, vec![10, 20, 10, 20, 10, 20, 10]);
        assert_eq!(
            player.status(),
            PlaybackStatus {
                active: true,
                cursor: 1,
                length: 2,
                looping: true,
            }
        );

        player.stop_playback();
        let trace = recorder.get();
        assert_eq!(trace.duty, 128);
        assert_eq!(trace.carrier, None);
        assert!(!player.is_playing());
    }

    #[test]
    fn stop_is_idempotent() {
        let (player, recorder) = player(false);
        player.start_playback(&[5, 6, 7], 3, true);
        tick(&player, 2);
        player.stop_playback();
        let writes = recorder.get().writes.len();
        player.stop_playback();

        let trace = recorder.get();
        assert_eq!(trace.writes.len(), writes);
        assert_eq!(trace.teardowns.len(), 1);
        assert_eq!(trace.duty, 128);
        assert_eq!(player.status().cursor, 0);
        assert!(!player.is_playing());
    }

    #[test]
    fn stop_right_after_start() {
        let (player, recorder) = player(false);
        player.start_playback(&[9; 16], 16, false);
        player.stop_playback();
        tick(&player, 3);
        assert_eq!(recorder.get().writes, vec![128]);
        assert!(!player.is_playing());
    }

    #[test]
    fn finished_session_reports_empty_status() {
        let idle = PlaybackStatus {
            active: false,
            cursor: 0,
            length: 0,
            looping: false,
        };
        let (player, _) = player(false);
        player.start_playback(&[1, 2, 3, 4, 5], 5, true);
        tick(&player, 3);
        player.stop_playback();
        assert_eq!(player.status(), idle);

        player.start_playback(&[1, 2], 2, false);
        tick(&player, 2);
        assert_eq!(player.status(), idle);
    }

    #[test]
    fn nothing_to_play_is_ignored() {
        let (player, recorder) = player(false);
        player.start_playback(&[], 10, false);
        player.start_playback(&[1, 2], 0, false);
        player.start_playback(&[1, 2], -3, true);
        assert!(!player.is_playing());
        assert_eq!(recorder.get().carrier, None);
        assert!(recorder.get().running.is_empty());
    }

    #[test]
    fn length_is_clamped_to_data() {
        let (player, recorder) = player(false);
        player.start_playback(&[1, 2, 3, 4], 2, false);
        assert_eq!(player.status().length, 2);
        tick(&player, 2);
        assert!(!player.is_playing());

        player.start_playback(&[7, 8], 1000, false);
        assert_eq!(player.status().length, 2);
        tick(&player, 2);
        assert_eq!(recorder.get().writes, vec![1, 2, 128, 7, 8, 128]);
    }

    #[test]
    fn start_while_playing_restarts_cleanly() {
        let (player, recorder) = player(false);
        player.start_playback(&[1, 2, 3], 3, true);
        tick(&player, 2);
        player.start_playback(&[40, 50], 2, false);
        {
            let trace = recorder.get();
            assert_eq!(trace.teardowns.len(), 1);
            assert_eq!(trace.running, vec![SampleTimer::Timer1]);
        }
        assert_eq!(player.status().cursor, 0);
        tick(&player, 1);
        assert_eq!(recorder.get().writes, vec![1, 2, 128, 40]);
    }

    #[test]
    fn start_without_hardware_does_nothing() {
        let player: TestPlayer = Player::new(FakeTime::default());
        player.start_playback(&[1, 2, 3], 3, false);
        player.on_sample_tick(SampleTimer::Timer1);
        player.stop_playback();
        assert!(!player.is_playing());
    }

    #[test]
    fn timer_change_rejected_while_playing() {
        let (player, recorder) = player(false);
        player.start_playback(&[1, 2, 3], 3, true);
        assert_eq!(player.use_timer0(true), Err(Error::PlaybackActive));
        assert_eq!(player.timer(), SampleTimer::Timer1);
        assert!(!recorder.get().is_running(SampleTimer::Timer0));

        tick(&player, 2);
        assert_eq!(recorder.get().writes, vec![1, 2]);

        player.stop_playback();
        assert_eq!(player.use_timer0(true), Ok(()));
        assert_eq!(player.timer(), SampleTimer::Timer0);
    }

    #[test]
    fn timer0_tick_outlives_sessions() {
        let (player, recorder) = player(true);
        assert!(recorder.get().is_running(SampleTimer::Timer0));

        tick(&player, 10);
        player.start_playback(&[1, 2], 2, false);
        tick(&player, 2);
        assert!(!player.is_playing());
        tick(&player, 3);

        assert!(recorder.get().is_running(SampleTimer::Timer0));
        assert_eq!(player.clock.ticks(), 15);

        player.use_timer0(false).unwrap();
        assert!(!recorder.get().is_running(SampleTimer::Timer0));
        tick(&player, 3);
        assert_eq!(player.clock.ticks(), 15);
    }

    #[test]
    fn ticks_from_other_timer_are_ignored() {
        let (player, recorder) = player(true);
        player.start_playback(&[1, 2], 2, true);
        player.on_sample_tick(SampleTimer::Timer1);
        assert!(recorder.get().writes.is_empty());
        assert_eq!(recorder.get().acks, 1);
        assert_eq!(player.clock.ticks(), 0);
    }

    #[test]
    fn release_hands_back_idle_hardware() {
        let (player, recorder) = player(true);
        player.start_playback(&[1, 2, 3], 3, true);
        assert!(player.release().is_some());

        let trace = recorder.get();
        assert_eq!(trace.carrier, None);
        assert!(trace.running.is_empty());
        assert!(!player.is_playing());
        assert!(player.release().is_none());
    }

    #[test]
    fn timer0_millis_follow_tick_count() {
        let (player, _) = player(true);
        tick(&player, 1000);
        assert_eq!(player.alt_millis(), 128);
        assert_eq!(player.alt_micros(), 128_000);
        tick(&player, 6813);
        // floor(7813 * 0.128)
        assert_eq!(player.alt_millis(), 1000);
    }

    #[test]
    fn alt_micros_survive_wraparound() {
        let (player, _) = player(true);
        let wrap_tick = (1u64 << 32) / 128;
        player.clock.preset(wrap_tick - 1);
        let t1 = player.alt_micros();
        tick(&player, 2);
        let t2 = player.alt_micros();
        assert!(t2 < t1);
        assert_eq!(t2.wrapping_sub(t1), 256);
    }

    #[test]
    fn timer1_passes_through_platform_time() {
        let (player, _) = player_with_time(false, FakeTime::with_step(7));
        let t1 = player.alt_micros();
        player.alt_delay_microseconds(500);
        let t2 = player.alt_micros();
        assert!(t2.wrapping_sub(t1) >= 500);

        let m1 = player.alt_micros();
        player.delay().delay_ms(3u8);
        assert!(player.alt_micros().wrapping_sub(m1) >= 3000);
    }

    #[test]
    fn switching_sample_clock_keeps_time_moving_forward() {
        let (player, _) = player_with_time(false, FakeTime::starting_at(5_000_000, 3));
        let t1 = player.alt_micros();
        player.use_timer0(true).unwrap();
        let t2 = player.alt_micros();
        assert!(t2 >= t1);
        assert!(t2 - t1 < 100);

        tick(&player, 10);
        let t3 = player.alt_micros();
        assert_eq!(t3 - t2, 10 * 128);

        player.use_timer0(false).unwrap();
        let t4 = player.alt_micros();
        assert!(t4 >= t3);
        assert!(t4 - t3 < 100);

        // And back onto the tick count, which has not moved since.
        player.use_timer0(true).unwrap();
        assert!(player.alt_micros() >= t4);
        assert_eq!(player.clock.ticks(), 10);
    }

    #[test]
    fn release_keeps_time_moving_forward() {
        let (player, recorder) = player(true);
        tick(&player, 50);
        let before = player.alt_micros();
        player.release();
        assert!(player.alt_micros() >= before);

        player.init(recorder.carrier(), recorder.clock());
        assert!(player.alt_micros() >= before);
        tick(&player, 1);
        assert_eq!(player.alt_micros() - before, 128);
    }

    #[test]
    fn timer0_delay_waits_for_ticks() {
        let (player, _) = player(true);
        let done = AtomicBool::new(false);
        std::thread::scope(|s| {
            s.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    player.on_sample_tick(SampleTimer::Timer0);
                    std::thread::yield_now();
                }
            });
            player.alt_delay(2);
            done.store(true, Ordering::Release);
        });
        // 2 ms at 128 us per tick
        assert!(player.clock.ticks() >= 16);
        assert!(player.alt_millis() >= 2);
    }
}

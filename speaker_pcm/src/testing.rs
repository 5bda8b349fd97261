//! Recording fakes for the hardware traits.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::vec::Vec;

use crate::hardware::{CarrierGenerator, SampleClock, TimeSource};
use crate::pin::SpeakerPin;
use crate::timer::SampleTimer;

#[derive(Debug, Default)]
pub struct Trace {
    /// Pin the carrier is currently running on.
    pub carrier: Option<SpeakerPin>,
    pub duty: u8,
    /// Every `set_duty` call, in order.
    pub writes: Vec<u8>,
    pub teardowns: Vec<SpeakerPin>,
    pub running: Vec<SampleTimer>,
    pub acks: u32,
}

impl Trace {
    pub fn is_running(&self, timer: SampleTimer) -> bool {
        self.running.contains(&timer)
    }
}

#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Trace>>);

impl Recorder {
    pub fn get(&self) -> MutexGuard<'_, Trace> {
        self.0.lock().unwrap()
    }

    pub fn carrier(&self) -> FakeCarrier {
        FakeCarrier(self.clone())
    }

    pub fn clock(&self) -> FakeClock {
        FakeClock(self.clone())
    }
}

pub struct FakeCarrier(Recorder);

impl CarrierGenerator for FakeCarrier {
    fn configure(&mut self, pin: SpeakerPin) {
        let mut trace = self.0.get();
        assert!(trace.carrier.is_none(), "carrier configured twice");
        trace.carrier = Some(pin);
        trace.duty = config::ZERO_SAMPLE;
    }

    fn set_duty(&mut self, duty: u8) {
        let mut trace = self.0.get();
        trace.duty = duty;
        trace.writes.push(duty);
    }

    fn teardown(&mut self, pin: SpeakerPin) {
        let mut trace = self.0.get();
        assert_eq!(trace.carrier, Some(pin), "teardown of a pin that is not running");
        trace.carrier = None;
        trace.teardowns.push(pin);
    }
}

pub struct FakeClock(Recorder);

impl SampleClock for FakeClock {
    fn configure(&mut self, timer: SampleTimer) {
        let mut trace = self.0.get();
        assert!(!trace.is_running(timer), "{timer:?} configured twice");
        trace.running.push(timer);
    }

    fn acknowledge(&mut self, _timer: SampleTimer) {
        self.0.get().acks += 1;
    }

    fn teardown(&mut self, timer: SampleTimer) {
        self.0.get().running.retain(|t| *t != timer);
    }
}

/// Time source whose platform counter advances by `step` on every read.
#[derive(Default)]
pub struct FakeTime {
    platform: AtomicU64,
    step: AtomicU64,
    period_elapsed: AtomicU32,
    pending: AtomicBool,
}

impl FakeTime {
    pub fn with_step(step: u64) -> Self {
        let time = Self::default();
        time.step.store(step, Ordering::Relaxed);
        time
    }

    pub fn starting_at(micros: u64, step: u64) -> Self {
        let time = Self::with_step(step);
        time.platform.store(micros, Ordering::Relaxed);
        time
    }

    pub fn set_period_elapsed(&self, micros: u32) {
        self.period_elapsed.store(micros, Ordering::Relaxed);
    }

    pub fn set_pending(&self, pending: bool) {
        self.pending.store(pending, Ordering::Relaxed);
    }
}

impl TimeSource for FakeTime {
    fn platform_micros(&self) -> u64 {
        let step = self.step.load(Ordering::Relaxed);
        self.platform.fetch_add(step, Ordering::Relaxed)
    }

    fn period_elapsed_micros(&self) -> u32 {
        self.period_elapsed.load(Ordering::Relaxed)
    }

    fn tick_pending(&self) -> bool {
        self.pending.load(Ordering::Relaxed)
    }
}

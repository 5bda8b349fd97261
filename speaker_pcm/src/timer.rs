use fugit::MicrosDurationU32;

/// Sample rate with millihertz resolution, enough to express 7812.5 Hz exactly.
pub type MilliHertz = fugit::Rate<u32, 1, 1_000>;

/// The hardware timer that drives the sample clock.
///
/// `Timer0` repurposes the system tick timer. Playback runs slightly slow at 7812.5 Hz and
/// the platform's own delay primitives stop working, so the alternate timebase takes over.
/// `Timer1` uses a dedicated timer at 8000 Hz and leaves the system tick alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleTimer {
    Timer0,
    #[default]
    Timer1,
}

impl SampleTimer {
    pub const fn from_use_timer0(use_timer0: bool) -> Self {
        if use_timer0 {
            SampleTimer::Timer0
        } else {
            SampleTimer::Timer1
        }
    }

    /// Time between two sample clock interrupts.
    pub const fn period(self) -> MicrosDurationU32 {
        MicrosDurationU32::from_ticks(self.period_micros())
    }

    pub const fn period_micros(self) -> u32 {
        match self {
            SampleTimer::Timer0 => config::TIMER0_PERIOD_US,
            SampleTimer::Timer1 => config::TIMER1_PERIOD_US,
        }
    }

    pub const fn sample_rate(self) -> MilliHertz {
        MilliHertz::from_raw(match self {
            SampleTimer::Timer0 => config::TIMER0_SAMPLE_RATE_MILLIHERTZ,
            SampleTimer::Timer1 => config::TIMER1_SAMPLE_RATE_MILLIHERTZ,
        })
    }

    /// Whether the sample clock interrupt also has to count time for the alternate timebase.
    pub const fn uses_alternate_timebase(self) -> bool {
        matches!(self, SampleTimer::Timer0)
    }
}

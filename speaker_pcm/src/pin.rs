/// One of the two pins the carrier can be routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpeakerPin {
    Pin3,
    Pin11,
}

impl SpeakerPin {
    /// Maps a requested pin number onto a carrier-capable pin. Anything that is not 3 or 11
    /// falls back to the default pin 11.
    pub const fn from_requested(pin: u8) -> Self {
        match pin {
            3 => SpeakerPin::Pin3,
            _ => SpeakerPin::Pin11,
        }
    }

    pub const fn number(self) -> u8 {
        match self {
            SpeakerPin::Pin3 => 3,
            SpeakerPin::Pin11 => 11,
        }
    }
}

impl Default for SpeakerPin {
    fn default() -> Self {
        Self::from_requested(config::DEFAULT_SPEAKER_PIN)
    }
}

impl From<SpeakerPin> for u8 {
    fn from(pin: SpeakerPin) -> u8 {
        pin.number()
    }
}

use embedded_hal::PwmPin;
use rp_pico::hal;

use hal::gpio::bank0::{Gpio11, Gpio3};
use hal::gpio::{FunctionPwm, Pin, PinMode, ValidPinMode};
use hal::pwm::{FreeRunning, Pwm1, Pwm5, Slice, SliceId, Slices, ValidSliceMode};
use speaker_pcm::{CarrierGenerator, SpeakerPin};

/// Fast PWM on GPIO3 (slice 1, channel B) or GPIO11 (slice 5, channel B).
///
/// Both slices count 0..=255 with a divider of 7 + 10/16, which gives a carrier of about
/// 64 kHz at 125 MHz. A slice only runs while a session plays on its pin.
pub struct PwmCarrier {
    slice3: Slice<Pwm1, FreeRunning>,
    slice11: Slice<Pwm5, FreeRunning>,
    active: Option<SpeakerPin>,
    _pins: (Pin<Gpio3, FunctionPwm>, Pin<Gpio11, FunctionPwm>),
}

fn setup_slice<S: SliceId>(slice: &mut Slice<S, FreeRunning>)
where
    FreeRunning: ValidSliceMode<S>,
{
    slice.default_config();
    slice.clr_ph_correct();
    slice.set_top(config::CARRIER_TOP);
    slice.set_div_int(config::CARRIER_DIV_INT);
    slice.set_div_frac(config::CARRIER_DIV_FRAC);
    slice.disable();
}

impl PwmCarrier {
    pub fn new<M3, M11>(slices: Slices, pin3: Pin<Gpio3, M3>, pin11: Pin<Gpio11, M11>) -> Self
    where
        M3: PinMode + ValidPinMode<Gpio3>,
        M11: PinMode + ValidPinMode<Gpio11>,
    {
        let mut slice3 = slices.pwm1;
        let mut slice11 = slices.pwm5;
        setup_slice(&mut slice3);
        setup_slice(&mut slice11);

        // Disabled channels drive their pin low.
        slice3.channel_b.disable();
        slice11.channel_b.disable();
        let pin3 = slice3.channel_b.output_to(pin3);
        let pin11 = slice11.channel_b.output_to(pin11);

        Self {
            slice3,
            slice11,
            active: None,
            _pins: (pin3, pin11),
        }
    }
}

impl CarrierGenerator for PwmCarrier {
    fn configure(&mut self, pin: SpeakerPin) {
        let duty = config::ZERO_SAMPLE as u16;
        match pin {
            SpeakerPin::Pin3 => {
                self.slice3.set_counter(0);
                self.slice3.channel_b.clr_inverted();
                self.slice3.channel_b.set_duty(duty);
                self.slice3.channel_b.enable();
                self.slice3.enable();
            }
            SpeakerPin::Pin11 => {
                self.slice11.set_counter(0);
                self.slice11.channel_b.clr_inverted();
                self.slice11.channel_b.set_duty(duty);
                self.slice11.channel_b.enable();
                self.slice11.enable();
            }
        }
        self.active = Some(pin);
    }

    fn set_duty(&mut self, duty: u8) {
        match self.active {
            Some(SpeakerPin::Pin3) => self.slice3.channel_b.set_duty(duty as u16),
            Some(SpeakerPin::Pin11) => self.slice11.channel_b.set_duty(duty as u16),
            None => {}
        }
    }

    fn teardown(&mut self, pin: SpeakerPin) {
        match pin {
            SpeakerPin::Pin3 => {
                self.slice3.channel_b.disable();
                self.slice3.disable();
            }
            SpeakerPin::Pin11 => {
                self.slice11.channel_b.disable();
                self.slice11.disable();
            }
        }
        if self.active == Some(pin) {
            self.active = None;
        }
    }
}

//! Buzz Click: passive buzzer on a PWM channel.
//!
//! The PWM frequency sets the pitch and is configured outside (slice
//! divider/TOP on the MCU side); the driver only switches the duty between
//! zero and the "on" duty, which sets the loudness.
//!
//! Example:
//! ```ignore
//! let mut pwm5 = pwm_slices.pwm5;
//! pwm5.set_top(999); // 1 kHz with a 1 MHz tick
//! pwm5.enable();
//! let mut buzz = Buzz::new(pwm5.channel_a, 50)?; // 50% duty when on
//! buzz.beep(&mut delay, 100)?;
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;

use crate::error::Error;

pub struct Buzz<C: SetDutyCycle> {
    channel: C,
    on_duty: u16,
    is_on: bool,
}

impl<C: SetDutyCycle> Buzz<C> {
    /// `volume_percent` of the channel's max duty is used while on. Starts silent.
    pub fn new(mut channel: C, volume_percent: u8) -> Result<Self, Error> {
        if volume_percent > 100 {
            return Err(Error::InvalidArgument);
        }
        channel.set_duty_cycle_fully_off().map_err(Error::pin)?;
        let on_duty = percent_of(channel.max_duty_cycle(), volume_percent);
        Ok(Self { channel, on_duty, is_on: false })
    }

    pub fn on(&mut self) -> Result<(), Error> {
        self.channel.set_duty_cycle(self.on_duty).map_err(Error::pin)?;
        self.is_on = true;
        Ok(())
    }

    pub fn off(&mut self) -> Result<(), Error> {
        self.channel.set_duty_cycle_fully_off().map_err(Error::pin)?;
        self.is_on = false;
        Ok(())
    }

    /// Returns the new state.
    pub fn toggle(&mut self) -> Result<bool, Error> {
        if self.is_on {
            self.off()?;
        } else {
            self.on()?;
        }
        Ok(self.is_on)
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// Applies immediately when the buzzer is sounding.
    pub fn set_volume_percent(&mut self, percent: u8) -> Result<(), Error> {
        if percent > 100 {
            return Err(Error::InvalidArgument);
        }
        self.on_duty = percent_of(self.channel.max_duty_cycle(), percent);
        if self.is_on {
            self.channel.set_duty_cycle(self.on_duty).map_err(Error::pin)?;
        }
        Ok(())
    }

    /// Blocking beep.
    pub fn beep(&mut self, delay: &mut impl DelayNs, ms: u32) -> Result<(), Error> {
        self.on()?;
        delay.delay_ms(ms);
        self.off()
    }

    /// Duty used while on.
    pub fn base_duty(&self) -> u16 {
        self.on_duty
    }

    /// Set a raw duty without touching the on/off state (used for amplitude effects).
    pub fn set_raw_duty(&mut self, duty: u16) -> Result<(), Error> {
        self.channel.set_duty_cycle(duty).map_err(Error::pin)
    }

    pub fn release(self) -> C {
        self.channel
    }
}

fn percent_of(max: u16, percent: u8) -> u16 {
    (max as u32 * percent as u32 / 100) as u16
}

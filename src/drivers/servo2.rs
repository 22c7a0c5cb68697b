//! Servo 2 Click: 16-channel, 12-bit grayscale PWM driver fed over a
//! bit-banged shift register interface.
//!
//! Protocol:
//! - 192 bits per frame (16 channels x 12 bits), channel 15 first, each
//!   value MSB first
//! - SIN is sampled on the SCLK rising edge
//! - a high pulse on XLAT latches the shift register into the outputs;
//!   BLANK is held high around the latch so the PWM counters restart cleanly
//! - BLANK high turns every output off
//!
//! Nothing goes out until [`Servo2::update`] is called. After that, BLANK
//! follows [`Servo2::enable_outputs`]; a later update keeps outputs blanked
//! if they were disabled.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::error::Error;

pub const CHANNELS: usize = 16;
pub const MAX_COUNT: u16 = 4095;

const EDGE_NS: u32 = 50;

#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Count for 0 degrees
    pub min_count: u16,
    /// Count for `max_angle`
    pub max_count: u16,
    pub max_angle: u16,
}

impl Default for Config {
    fn default() -> Self {
        // 1 ms .. 2 ms of a 20 ms period at 12 bits
        Self { min_count: 205, max_count: 410, max_angle: 180 }
    }
}

pub struct Servo2<SIN, SCLK, XLAT, BLANK, D> {
    sin: SIN,
    sclk: SCLK,
    xlat: XLAT,
    blank: BLANK,
    delay: D,
    config: Config,
    channels: [u16; CHANNELS],
    outputs_enabled: bool,
}

impl<SIN, SCLK, XLAT, BLANK, D> Servo2<SIN, SCLK, XLAT, BLANK, D>
where
    SIN: OutputPin,
    SCLK: OutputPin,
    XLAT: OutputPin,
    BLANK: OutputPin,
    D: DelayNs,
{
    /// Idles the interface with outputs blanked.
    pub fn new(sin: SIN, sclk: SCLK, xlat: XLAT, blank: BLANK, delay: D, config: Config) -> Result<Self, Error> {
        if config.min_count > config.max_count || config.max_count > MAX_COUNT || config.max_angle == 0 {
            return Err(Error::InvalidArgument);
        }
        let mut servo = Self { sin, sclk, xlat, blank, delay, config, channels: [0; CHANNELS], outputs_enabled: true };
        servo.sin.set_low().map_err(Error::pin)?;
        servo.sclk.set_low().map_err(Error::pin)?;
        servo.xlat.set_low().map_err(Error::pin)?;
        servo.blank.set_high().map_err(Error::pin)?;
        Ok(servo)
    }

    pub fn set_channel(&mut self, channel: usize, value: u16) -> Result<(), Error> {
        if channel >= CHANNELS || value > MAX_COUNT {
            return Err(Error::InvalidArgument);
        }
        self.channels[channel] = value;
        Ok(())
    }

    pub fn channel(&self, channel: usize) -> Option<u16> {
        self.channels.get(channel).copied()
    }

    /// Map `degrees` linearly onto the configured count range.
    pub fn set_angle(&mut self, channel: usize, degrees: u16) -> Result<(), Error> {
        if degrees > self.config.max_angle {
            return Err(Error::InvalidArgument);
        }
        let span = (self.config.max_count - self.config.min_count) as u32;
        let count = self.config.min_count as u32 + span * degrees as u32 / self.config.max_angle as u32;
        self.set_channel(channel, count as u16)
    }

    /// Shift all 16 channels out and latch them.
    pub fn update(&mut self) -> Result<(), Error> {
        for ch in (0..CHANNELS).rev() {
            let value = self.channels[ch];
            for bit in (0..12).rev() {
                self.sin.set_state((value & (1 << bit) != 0).into()).map_err(Error::pin)?;
                self.delay.delay_ns(EDGE_NS);
                self.sclk.set_high().map_err(Error::pin)?;
                self.delay.delay_ns(EDGE_NS);
                self.sclk.set_low().map_err(Error::pin)?;
            }
        }
        self.blank.set_high().map_err(Error::pin)?;
        self.xlat.set_high().map_err(Error::pin)?;
        self.delay.delay_us(1);
        self.xlat.set_low().map_err(Error::pin)?;
        self.blank.set_state((!self.outputs_enabled).into()).map_err(Error::pin)?;
        trace!("Servo 2 frame latched");
        Ok(())
    }

    /// `false` blanks every output.
    pub fn enable_outputs(&mut self, enable: bool) -> Result<(), Error> {
        self.blank.set_state((!enable).into()).map_err(Error::pin)?;
        self.outputs_enabled = enable;
        Ok(())
    }

    pub fn release(self) -> (SIN, SCLK, XLAT, BLANK, D) {
        (self.sin, self.sclk, self.xlat, self.blank, self.delay)
    }
}

//! AudioAmp Click: LM48100Q mono class-AB amplifier (I2C, write-only)
//!
//! Each register write is a single byte: register select in bits 7..5,
//! payload in bits 4..0. The chip cannot be read back, so the driver keeps
//! the last value written to every register.

use embedded_hal::i2c::I2c;

use crate::error::Error;

pub const AUDIOAMP_ADDR: u8 = 0x7C;

pub const MAX_VOLUME: u8 = 31;

/// Mode control payload bits
pub mod mode {
    pub const POWER_ON: u8 = 1 << 4;
    pub const INPUT2: u8 = 1 << 3;
    pub const INPUT1: u8 = 1 << 2;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    Mode = 0x00,
    Diagnostic = 0x20,
    FaultDetection = 0x40,
    Volume1 = 0x60,
    Volume2 = 0x80,
}

impl Register {
    fn index(self) -> usize {
        (self as u8 >> 5) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Input {
    One,
    Two,
}

impl Input {
    fn mode_bit(self) -> u8 {
        match self {
            Input::One => mode::INPUT1,
            Input::Two => mode::INPUT2,
        }
    }

    fn volume_register(self) -> Register {
        match self {
            Input::One => Register::Volume1,
            Input::Two => Register::Volume2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub address: u8,
    pub volume: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self { address: AUDIOAMP_ADDR, volume: 16 }
    }
}

pub struct AudioAmp<I2C> {
    i2c: I2C,
    config: Config,
    registers: [u8; 5],
}

impl<I2C: I2c> AudioAmp<I2C> {
    pub fn new(i2c: I2C, config: Config) -> Self {
        Self { i2c, config, registers: [0; 5] }
    }

    /// Power on with both inputs enabled at the configured volume.
    pub fn default_cfg(&mut self) -> Result<(), Error<I2C::Error>> {
        let volume = self.config.volume;
        self.set_volume(Input::One, volume)?;
        self.set_volume(Input::Two, volume)?;
        self.write_register(Register::Mode, mode::POWER_ON | mode::INPUT1 | mode::INPUT2)?;
        info!("LM48100Q on, volume {}", volume);
        Ok(())
    }

    pub fn power_on(&mut self) -> Result<(), Error<I2C::Error>> {
        self.update_mode(mode::POWER_ON, true)
    }

    pub fn power_off(&mut self) -> Result<(), Error<I2C::Error>> {
        self.update_mode(mode::POWER_ON, false)
    }

    pub fn enable_input(&mut self, input: Input, enable: bool) -> Result<(), Error<I2C::Error>> {
        self.update_mode(input.mode_bit(), enable)
    }

    pub fn set_volume(&mut self, input: Input, volume: u8) -> Result<(), Error<I2C::Error>> {
        if volume > MAX_VOLUME {
            return Err(Error::InvalidArgument);
        }
        self.write_register(input.volume_register(), volume)
    }

    pub fn volume(&self, input: Input) -> u8 {
        self.register(input.volume_register())
    }

    /// Volume 0 on both channels; the amplifier stays powered.
    pub fn mute(&mut self) -> Result<(), Error<I2C::Error>> {
        self.write_register(Register::Volume1, 0)?;
        self.write_register(Register::Volume2, 0)
    }

    pub fn set_diagnostics(&mut self, value: u8) -> Result<(), Error<I2C::Error>> {
        self.write_register(Register::Diagnostic, value)
    }

    pub fn set_fault_detection(&mut self, value: u8) -> Result<(), Error<I2C::Error>> {
        self.write_register(Register::FaultDetection, value)
    }

    /// Write a 5-bit payload and cache it.
    pub fn write_register(&mut self, register: Register, value: u8) -> Result<(), Error<I2C::Error>> {
        if value > 0x1F {
            return Err(Error::InvalidArgument);
        }
        self.i2c.write(self.config.address, &[register as u8 | value]).map_err(Error::Bus)?;
        self.registers[register.index()] = value;
        Ok(())
    }

    /// Last payload written to `register`.
    pub fn register(&self, register: Register) -> u8 {
        self.registers[register.index()]
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn update_mode(&mut self, bit: u8, set: bool) -> Result<(), Error<I2C::Error>> {
        let current = self.register(Register::Mode);
        let value = if set { current | bit } else { current & !bit };
        self.write_register(Register::Mode, value)
    }
}

//! Barometer Click: LPS25HB absolute pressure sensor (I2C)
//!
//! Based on the LPS25HB datasheet:
//! - I2C address: 0x5D (SA0 high) or 0x5C (SA0 low)
//! - WHO_AM_I (0x0F) reads 0xBD
//! - Multi-byte reads need the sub-address MSB set for auto-increment
//! - Pressure: 24-bit two's complement, 4096 LSB/hPa
//! - Temperature: 16-bit two's complement, 42.5 C offset, 480 LSB/C

use embedded_hal::i2c::I2c;

use super::sensor_trait::SensorDriver;
use crate::bus;
use crate::error::Error;

pub const BAROMETER_ADDR: u8 = 0x5D;
pub const BAROMETER_ADDR_ALT: u8 = 0x5C;

pub const DEVICE_ID: u8 = 0xBD;

/// Register addresses
pub mod reg {
    pub const REF_P_XL: u8 = 0x08;
    pub const WHO_AM_I: u8 = 0x0F;
    pub const RES_CONF: u8 = 0x10;
    pub const CTRL_REG1: u8 = 0x20;
    pub const CTRL_REG2: u8 = 0x21;
    pub const CTRL_REG3: u8 = 0x22;
    pub const STATUS: u8 = 0x27;
    pub const PRESS_OUT_XL: u8 = 0x28; // XL, L, H
    pub const TEMP_OUT_L: u8 = 0x2B; // L, H
    pub const FIFO_CTRL: u8 = 0x2E;

    /// OR into the sub-address for multi-byte access
    pub const AUTO_INCREMENT: u8 = 0x80;
}

/// CTRL_REG1 bits
pub mod ctrl1 {
    pub const PD: u8 = 1 << 7;
    pub const ODR_SHIFT: u8 = 4;
    pub const ODR_MASK: u8 = 0x70;
    pub const BDU: u8 = 1 << 2;
}

/// CTRL_REG2 bits
pub mod ctrl2 {
    pub const BOOT: u8 = 1 << 7;
    pub const SWRESET: u8 = 1 << 2;
    pub const ONE_SHOT: u8 = 1 << 0;
}

/// Output data rate; `OneShot` leaves conversions to [`Barometer::start_one_shot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataRate {
    OneShot = 0,
    Hz1 = 1,
    Hz7 = 2,
    Hz12_5 = 3,
    Hz25 = 4,
}

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub address: u8,
    pub data_rate: DataRate,
}

impl Default for Config {
    fn default() -> Self {
        Self { address: BAROMETER_ADDR, data_rate: DataRate::Hz1 }
    }
}

/// STATUS register flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    pub pressure_available: bool,
    pub temperature_available: bool,
    pub pressure_overrun: bool,
    pub temperature_overrun: bool,
}

impl From<u8> for Status {
    fn from(value: u8) -> Self {
        Self {
            temperature_available: value & 0x01 != 0,
            pressure_available: value & 0x02 != 0,
            temperature_overrun: value & 0x10 != 0,
            pressure_overrun: value & 0x20 != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSample {
    pub pressure: i32,
    pub temperature: i16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    pub pressure_hpa: f32,
    pub temperature_c: f32,
}

pub struct Barometer<I2C> {
    i2c: I2C,
    config: Config,
}

impl<I2C: I2c> Barometer<I2C> {
    pub fn new(i2c: I2C, config: Config) -> Self {
        Self { i2c, config }
    }

    pub fn check_id(&mut self) -> Result<(), Error<I2C::Error>> {
        let id = self.read_register(reg::WHO_AM_I)?;
        if id != DEVICE_ID {
            warn!("LPS25HB WHO_AM_I mismatch: 0x{:02X}", id);
            return Err(Error::InvalidDevice(id));
        }
        Ok(())
    }

    /// Verify the chip, power it on with the configured rate and block data update.
    pub fn default_cfg(&mut self) -> Result<(), Error<I2C::Error>> {
        self.check_id()?;
        let ctrl = ctrl1::PD | ((self.config.data_rate as u8) << ctrl1::ODR_SHIFT) | ctrl1::BDU;
        self.write_register(reg::CTRL_REG1, ctrl)?;
        info!("LPS25HB configured, CTRL_REG1=0x{:02X}", ctrl);
        Ok(())
    }

    pub fn set_data_rate(&mut self, rate: DataRate) -> Result<(), Error<I2C::Error>> {
        let ctrl = self.read_register(reg::CTRL_REG1)?;
        let ctrl = (ctrl & !ctrl1::ODR_MASK) | ((rate as u8) << ctrl1::ODR_SHIFT);
        self.write_register(reg::CTRL_REG1, ctrl)?;
        self.config.data_rate = rate;
        Ok(())
    }

    pub fn power_down(&mut self) -> Result<(), Error<I2C::Error>> {
        let ctrl = self.read_register(reg::CTRL_REG1)?;
        self.write_register(reg::CTRL_REG1, ctrl & !ctrl1::PD)
    }

    /// Reset the user registers and reload trimming values. Bits self-clear.
    pub fn software_reset(&mut self) -> Result<(), Error<I2C::Error>> {
        self.write_register(reg::CTRL_REG2, ctrl2::SWRESET | ctrl2::BOOT)
    }

    /// Trigger a single conversion (only meaningful at [`DataRate::OneShot`]).
    pub fn start_one_shot(&mut self) -> Result<(), Error<I2C::Error>> {
        let ctrl = self.read_register(reg::CTRL_REG2)?;
        self.write_register(reg::CTRL_REG2, ctrl | ctrl2::ONE_SHOT)
    }

    pub fn status(&mut self) -> Result<Status, Error<I2C::Error>> {
        self.read_register(reg::STATUS).map(Status::from)
    }

    pub fn read_raw_pressure(&mut self) -> Result<i32, Error<I2C::Error>> {
        let mut buf = [0u8; 3];
        self.read_registers(reg::PRESS_OUT_XL, &mut buf)?;
        let raw = ((buf[2] as u32) << 16) | ((buf[1] as u32) << 8) | buf[0] as u32;
        Ok(bus::sign_extend(raw, 24))
    }

    pub fn read_raw_temperature(&mut self) -> Result<i16, Error<I2C::Error>> {
        let mut buf = [0u8; 2];
        self.read_registers(reg::TEMP_OUT_L, &mut buf)?;
        Ok(i16::from_le_bytes(buf))
    }

    pub fn read_pressure_hpa(&mut self) -> Result<f32, Error<I2C::Error>> {
        Ok(pressure_hpa(self.read_raw_pressure()?))
    }

    pub fn read_temperature_c(&mut self) -> Result<f32, Error<I2C::Error>> {
        Ok(temperature_c(self.read_raw_temperature()?))
    }

    pub fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        bus::write_register(&mut self.i2c, self.config.address, reg, value)
    }

    pub fn read_register(&mut self, reg: u8) -> Result<u8, Error<I2C::Error>> {
        bus::read_register(&mut self.i2c, self.config.address, reg)
    }

    pub fn write_registers(&mut self, reg: u8, data: &[u8]) -> Result<(), Error<I2C::Error>> {
        let reg = if data.len() > 1 { reg | reg::AUTO_INCREMENT } else { reg };
        bus::write_registers(&mut self.i2c, self.config.address, reg, data)
    }

    pub fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Error<I2C::Error>> {
        let reg = if buf.len() > 1 { reg | reg::AUTO_INCREMENT } else { reg };
        bus::read_registers(&mut self.i2c, self.config.address, reg, buf)
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> SensorDriver for Barometer<I2C> {
    type RawData = RawSample;
    type ParsedData = Measurement;
    type Error = Error<I2C::Error>;

    fn read_raw(&mut self) -> Result<RawSample, Self::Error> {
        Ok(RawSample { pressure: self.read_raw_pressure()?, temperature: self.read_raw_temperature()? })
    }

    fn parse(&self, raw: RawSample) -> Result<Measurement, Self::Error> {
        Ok(Measurement { pressure_hpa: pressure_hpa(raw.pressure), temperature_c: temperature_c(raw.temperature) })
    }
}

pub fn pressure_hpa(raw: i32) -> f32 {
    raw as f32 / 4096.0
}

pub fn temperature_c(raw: i16) -> f32 {
    42.5 + raw as f32 / 480.0
}

//! Hall Current Click: ACS711 hall-effect current sensor sampled by an
//! MCP3221 12-bit ADC (I2C)
//!
//! The MCP3221 has no registers: a two byte read returns the last
//! conversion, upper nibble of the first byte zero. The ACS711 output sits
//! at VCC/2 for zero current and moves by the sensitivity (mV/A) either way.

use embedded_hal::i2c::I2c;

use super::sensor_trait::SensorDriver;
use crate::error::Error;

pub const HALLCURRENT_ADDR: u8 = 0x4D;

const ADC_FULL_SCALE: u32 = 4096;

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub address: u8,
    pub vref_mv: u16,
    /// ACS711 output slope, mV per A
    pub sensitivity_mv_per_a: u16,
    /// Output voltage at zero current
    pub zero_mv: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self { address: HALLCURRENT_ADDR, vref_mv: 3300, sensitivity_mv_per_a: 90, zero_mv: 1650 }
    }
}

pub struct HallCurrent<I2C> {
    i2c: I2C,
    config: Config,
}

impl<I2C: I2c> HallCurrent<I2C> {
    pub fn new(i2c: I2C, config: Config) -> Self {
        Self { i2c, config }
    }

    /// Latest 12-bit conversion.
    pub fn read_raw(&mut self) -> Result<u16, Error<I2C::Error>> {
        let mut buf = [0u8; 2];
        self.i2c.read(self.config.address, &mut buf).map_err(Error::Bus)?;
        Ok((((buf[0] & 0x0F) as u16) << 8) | buf[1] as u16)
    }

    pub fn read_voltage_mv(&mut self) -> Result<u32, Error<I2C::Error>> {
        let raw = self.read_raw()?;
        Ok(raw_to_mv(raw, self.config.vref_mv))
    }

    /// Signed current; positive when the sensor output is above the zero point.
    pub fn read_current_ma(&mut self) -> Result<i32, Error<I2C::Error>> {
        let mv = self.read_voltage_mv()?;
        Ok(mv_to_ma(mv, &self.config))
    }

    /// Mean of `samples` conversions.
    pub fn read_average_current_ma(&mut self, samples: u16) -> Result<i32, Error<I2C::Error>> {
        if samples == 0 {
            return Err(Error::InvalidArgument);
        }
        let mut sum: i64 = 0;
        for _ in 0..samples {
            sum += self.read_current_ma()? as i64;
        }
        Ok((sum / samples as i64) as i32)
    }

    /// Take the current output as the zero point.
    pub fn calibrate_zero(&mut self) -> Result<(), Error<I2C::Error>> {
        let mv = self.read_voltage_mv()?;
        self.config.zero_mv = mv as u16;
        debug!("Hall current zero set to {} mV", mv);
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> SensorDriver for HallCurrent<I2C> {
    type RawData = u16;
    /// mA
    type ParsedData = i32;
    type Error = Error<I2C::Error>;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        HallCurrent::read_raw(self)
    }

    fn parse(&self, raw: u16) -> Result<i32, Self::Error> {
        if raw >= ADC_FULL_SCALE as u16 {
            return Err(Error::Parse);
        }
        Ok(mv_to_ma(raw_to_mv(raw, self.config.vref_mv), &self.config))
    }
}

fn raw_to_mv(raw: u16, vref_mv: u16) -> u32 {
    raw as u32 * vref_mv as u32 / ADC_FULL_SCALE
}

fn mv_to_ma(mv: u32, config: &Config) -> i32 {
    let delta = mv as i32 - config.zero_mv as i32;
    delta * 1000 / config.sensitivity_mv_per_a.max(1) as i32
}

//! Altitude 2 Click: MS5607 barometric pressure sensor (I2C)
//!
//! Based on the MS5607-02BA03 datasheet:
//! - I2C address: 0x77 (CSB low) or 0x76 (CSB high)
//! - Reset: send 0x1E then wait >2.8ms
//! - PROM: 8 words at 0xA0..0xAE; word 0 is factory data, C1..C6 follow,
//!   the low nibble of word 7 is a CRC4 over the whole PROM
//! - Start D1 conversion: 0x40 | OSR, D2 conversion: 0x50 | OSR
//! - Read ADC: command 0x00 returns a 24-bit big-endian result
//!
//! Compensation is the datasheet's integer algorithm including the
//! second-order correction below 20 C. Altitude is a series expansion of the
//! international barometric formula (no `powf` in `no_std`).

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::sensor_trait::SensorDriver;
use crate::bus;
use crate::error::Error;

pub const ALTITUDE2_ADDR: u8 = 0x77; // CSB low
pub const ALTITUDE2_ADDR_ALT: u8 = 0x76; // CSB high

/// Commands
pub mod commands {
    pub const RESET: u8 = 0x1E;
    pub const CONVERT_D1: u8 = 0x40; // Pressure, OR with OSR code
    pub const CONVERT_D2: u8 = 0x50; // Temperature, OR with OSR code
    pub const ADC_READ: u8 = 0x00;
    pub const PROM_READ: u8 = 0xA0; // + 2 * index
}

/// Oversampling ratio; higher is slower and quieter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oversampling {
    Osr256,
    Osr512,
    Osr1024,
    Osr2048,
    Osr4096,
}

impl Oversampling {
    fn code(self) -> u8 {
        match self {
            Oversampling::Osr256 => 0x00,
            Oversampling::Osr512 => 0x02,
            Oversampling::Osr1024 => 0x04,
            Oversampling::Osr2048 => 0x06,
            Oversampling::Osr4096 => 0x08,
        }
    }

    /// Max conversion time rounded up (0.60 / 1.17 / 2.28 / 4.54 / 9.04 ms).
    fn conversion_ms(self) -> u32 {
        match self {
            Oversampling::Osr256 => 1,
            Oversampling::Osr512 => 2,
            Oversampling::Osr1024 => 3,
            Oversampling::Osr2048 => 5,
            Oversampling::Osr4096 => 10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub address: u8,
    pub oversampling: Oversampling,
    /// Reference pressure for altitude, Pa
    pub sea_level_pa: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self { address: ALTITUDE2_ADDR, oversampling: Oversampling::Osr4096, sea_level_pa: 101_325 }
    }
}

/// Compensated reading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// 0.01 C
    pub temperature: i32,
    /// Pa
    pub pressure: i32,
}

impl Measurement {
    pub fn temperature_celsius(&self) -> f32 {
        self.temperature as f32 / 100.0
    }

    pub fn pressure_mbar(&self) -> f32 {
        self.pressure as f32 / 100.0
    }
}

/// Raw D1/D2 ADC pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSample {
    pub pressure: u32,
    pub temperature: u32,
}

pub struct Altitude2<I2C, D> {
    i2c: I2C,
    delay: D,
    config: Config,
    prom: [u16; 8],
    calibrated: bool,
}

impl<I2C, D> Altitude2<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I2C, delay: D, config: Config) -> Self {
        Self { i2c, delay, config, prom: [0; 8], calibrated: false }
    }

    /// Reset and load the calibration PROM.
    pub fn default_cfg(&mut self) -> Result<(), Error<I2C::Error>> {
        self.reset()?;
        self.read_prom()?;
        info!("MS5607 ready at 0x{:02X}", self.config.address);
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), Error<I2C::Error>> {
        self.send_command(commands::RESET)?;
        self.delay.delay_ms(3);
        Ok(())
    }

    /// Read all eight PROM words and validate the CRC4.
    pub fn read_prom(&mut self) -> Result<[u16; 8], Error<I2C::Error>> {
        let mut prom = [0u16; 8];
        for (i, word) in prom.iter_mut().enumerate() {
            let mut buf = [0u8; 2];
            bus::read_registers(&mut self.i2c, self.config.address, commands::PROM_READ + 2 * i as u8, &mut buf)?;
            *word = u16::from_be_bytes(buf);
        }
        let expected = prom[7] & 0x000F;
        let actual = prom_crc4(&prom);
        if expected != actual {
            warn!("MS5607 PROM CRC mismatch: stored {} computed {}", expected, actual);
            return Err(Error::Crc);
        }
        self.prom = prom;
        self.calibrated = true;
        Ok(prom)
    }

    /// Calibration coefficient C1..C6.
    pub fn coefficient(&self, index: usize) -> Option<u16> {
        (1..=6).contains(&index).then(|| self.prom[index])
    }

    pub fn read_raw_pressure(&mut self) -> Result<u32, Error<I2C::Error>> {
        self.convert(commands::CONVERT_D1)
    }

    pub fn read_raw_temperature(&mut self) -> Result<u32, Error<I2C::Error>> {
        self.convert(commands::CONVERT_D2)
    }

    /// Pressure then temperature conversion (blocking ~2x conversion time).
    pub fn read_raw(&mut self) -> Result<RawSample, Error<I2C::Error>> {
        let pressure = self.read_raw_pressure()?;
        let temperature = self.read_raw_temperature()?;
        Ok(RawSample { pressure, temperature })
    }

    pub fn measure(&mut self) -> Result<Measurement, Error<I2C::Error>> {
        if !self.calibrated {
            self.read_prom()?;
        }
        let raw = self.read_raw()?;
        Ok(compensate(&self.prom, raw))
    }

    /// Altitude in metres relative to the configured sea-level pressure.
    pub fn altitude(&mut self) -> Result<f32, Error<I2C::Error>> {
        let m = self.measure()?;
        Ok(pressure_to_altitude(m.pressure, self.config.sea_level_pa))
    }

    pub fn set_oversampling(&mut self, oversampling: Oversampling) {
        self.config.oversampling = oversampling;
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn send_command(&mut self, cmd: u8) -> Result<(), Error<I2C::Error>> {
        self.i2c.write(self.config.address, &[cmd]).map_err(Error::Bus)
    }

    fn convert(&mut self, cmd: u8) -> Result<u32, Error<I2C::Error>> {
        let osr = self.config.oversampling;
        self.send_command(cmd | osr.code())?;
        self.delay.delay_ms(osr.conversion_ms());
        let mut buf = [0u8; 3];
        bus::read_registers(&mut self.i2c, self.config.address, commands::ADC_READ, &mut buf)?;
        let value = bus::be_u24(&buf);
        // A read before the conversion finished returns 0.
        if value == 0 {
            return Err(Error::Timeout);
        }
        Ok(value)
    }
}

impl<I2C, D> SensorDriver for Altitude2<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    type RawData = RawSample;
    type ParsedData = Measurement;
    type Error = Error<I2C::Error>;

    fn read_raw(&mut self) -> Result<RawSample, Self::Error> {
        Altitude2::read_raw(self)
    }

    fn parse(&self, raw: RawSample) -> Result<Measurement, Self::Error> {
        if !self.calibrated {
            return Err(Error::InvalidArgument);
        }
        Ok(compensate(&self.prom, raw))
    }
}

/// CRC4 over the PROM as in application note AN520 (the CRC nibble itself
/// is excluded).
pub fn prom_crc4(prom: &[u16; 8]) -> u16 {
    let mut words = *prom;
    words[7] &= 0xFF00;
    let mut rem: u16 = 0;
    for cnt in 0..16 {
        let word = words[cnt >> 1];
        rem ^= if cnt % 2 == 1 { word & 0x00FF } else { word >> 8 };
        for _ in 0..8 {
            rem = if rem & 0x8000 != 0 { (rem << 1) ^ 0x3000 } else { rem << 1 };
        }
    }
    (rem >> 12) & 0x000F
}

/// First and second order temperature compensation.
pub fn compensate(prom: &[u16; 8], raw: RawSample) -> Measurement {
    let c = |i: usize| prom[i] as i64;
    let d1 = raw.pressure as i64;
    let d2 = raw.temperature as i64;

    let dt = d2 - (c(5) << 8);
    let mut temp = 2000 + ((dt * c(6)) >> 23);
    let mut off = (c(2) << 17) + ((c(4) * dt) >> 6);
    let mut sens = (c(1) << 16) + ((c(3) * dt) >> 7);

    if temp < 2000 {
        let t2 = (dt * dt) >> 31;
        let d = temp - 2000;
        let mut off2 = (61 * d * d) >> 4;
        let mut sens2 = 2 * d * d;
        if temp < -1500 {
            let e = temp + 1500;
            off2 += 15 * e * e;
            sens2 += 8 * e * e;
        }
        temp -= t2;
        off -= off2;
        sens -= sens2;
    }

    let pressure = (((d1 * sens) >> 21) - off) >> 15;
    Measurement { temperature: temp as i32, pressure: pressure as i32 }
}

/// Barometric formula `44330 * (1 - (p/p0)^0.190263)` expanded to fourth
/// order in `1 - p/p0`; under 0.1 m error within 1 km of the reference.
pub fn pressure_to_altitude(pressure_pa: i32, sea_level_pa: i32) -> f32 {
    const A: f32 = 0.190_263;
    let u = 1.0 - pressure_pa as f32 / sea_level_pa as f32;
    let t1 = A * u;
    let t2 = t1 * (1.0 - A) / 2.0 * u;
    let t3 = t2 * (2.0 - A) / 3.0 * u;
    let t4 = t3 * (3.0 - A) / 4.0 * u;
    44_330.0 * (t1 + t2 + t3 + t4)
}

//! Thermo Click: MAX31855 thermocouple-to-digital converter (SPI, read-only)
//!
//! One 32-bit read returns everything:
//! - D31..D18: thermocouple temperature, 14-bit signed, 0.25 C/LSB
//! - D16: fault (any of D2..D0)
//! - D15..D4: cold-junction temperature, 12-bit signed, 0.0625 C/LSB
//! - D2 short to VCC, D1 short to GND, D0 open circuit

use embedded_hal::spi::SpiDevice;

use super::sensor_trait::SensorDriver;
use crate::bus;
use crate::error::Error;

const FAULT: u32 = 1 << 16;

/// Fault bits D2..D0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultStatus {
    pub short_to_vcc: bool,
    pub short_to_gnd: bool,
    pub open_circuit: bool,
}

impl FaultStatus {
    pub fn any(&self) -> bool {
        self.short_to_vcc || self.short_to_gnd || self.open_circuit
    }
}

impl From<u32> for FaultStatus {
    fn from(raw: u32) -> Self {
        Self { short_to_vcc: raw & 0x04 != 0, short_to_gnd: raw & 0x02 != 0, open_circuit: raw & 0x01 != 0 }
    }
}

pub struct Thermo<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> Thermo<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    pub fn read_raw(&mut self) -> Result<u32, Error<SPI::Error>> {
        let mut buf = [0u8; 4];
        self.spi.read(&mut buf).map_err(Error::Bus)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// Thermocouple temperature in C; [`Error::SensorFault`] while a fault is flagged.
    pub fn read_temperature(&mut self) -> Result<f32, Error<SPI::Error>> {
        let raw = self.read_raw()?;
        thermocouple_celsius(raw).ok_or(Error::SensorFault)
    }

    /// Cold-junction (package) temperature in C. Valid even during a fault.
    pub fn read_internal_temperature(&mut self) -> Result<f32, Error<SPI::Error>> {
        Ok(internal_celsius(self.read_raw()?))
    }

    pub fn fault_status(&mut self) -> Result<FaultStatus, Error<SPI::Error>> {
        Ok(FaultStatus::from(self.read_raw()?))
    }

    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: SpiDevice> SensorDriver for Thermo<SPI> {
    type RawData = u32;
    type ParsedData = f32;
    type Error = Error<SPI::Error>;

    fn read_raw(&mut self) -> Result<u32, Self::Error> {
        Thermo::read_raw(self)
    }

    fn parse(&self, raw: u32) -> Result<f32, Self::Error> {
        thermocouple_celsius(raw).ok_or(Error::SensorFault)
    }
}

fn thermocouple_celsius(raw: u32) -> Option<f32> {
    if raw & FAULT != 0 {
        warn!("MAX31855 fault flags 0x{:X}", raw & 0x07);
        return None;
    }
    Some(bus::sign_extend(raw >> 18, 14) as f32 * 0.25)
}

fn internal_celsius(raw: u32) -> f32 {
    bus::sign_extend((raw >> 4) & 0x0FFF, 12) as f32 * 0.0625
}

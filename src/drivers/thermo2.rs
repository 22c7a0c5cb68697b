//! Thermo 2 Click: DS1825 programmable-resolution 1-Wire thermometer
//!
//! Scratchpad layout (9 bytes, CRC8 in the last byte):
//! - 0..1: temperature, little-endian two's complement, 1/16 C
//! - 2..3: TH / TL alarm thresholds (EEPROM backed)
//! - 4: configuration, bits 6..5 resolution, bits 3..0 AD3..AD0 strap
//!
//! Conversion time doubles with each resolution bit: 93.75 ms at 9 bits to
//! 750 ms at 12 bits. Bits below the selected resolution read as undefined.

use embedded_hal::delay::DelayNs;
use heapless::Vec;

use crate::error::Error;
use crate::onewire::{self, OneWireBus, Rom};

pub const DS1825_FAMILY: u8 = 0x3B;

/// Function commands
pub mod commands {
    pub const CONVERT_T: u8 = 0x44;
    pub const WRITE_SCRATCHPAD: u8 = 0x4E;
    pub const READ_SCRATCHPAD: u8 = 0xBE;
    pub const COPY_SCRATCHPAD: u8 = 0x48;
    pub const RECALL_E2: u8 = 0xB8;
    pub const READ_POWER_SUPPLY: u8 = 0xB4;
}

const COPY_SCRATCHPAD_MS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    Bits9 = 0b00,
    Bits10 = 0b01,
    Bits11 = 0b10,
    Bits12 = 0b11,
}

impl Resolution {
    pub fn conversion_ms(self) -> u32 {
        match self {
            Resolution::Bits9 => 94,
            Resolution::Bits10 => 188,
            Resolution::Bits11 => 375,
            Resolution::Bits12 => 750,
        }
    }

    fn config_byte(self) -> u8 {
        ((self as u8) << 5) | 0x1F
    }

    fn from_config(config: u8) -> Self {
        match (config >> 5) & 0x03 {
            0b00 => Resolution::Bits9,
            0b01 => Resolution::Bits10,
            0b10 => Resolution::Bits11,
            _ => Resolution::Bits12,
        }
    }

    /// Mask clearing the undefined low bits of a raw reading.
    fn raw_mask(self) -> i16 {
        !((1i16 << (3 - self as u8)) - 1)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub resolution: Resolution,
    pub alarm_high: i8,
    pub alarm_low: i8,
    /// Device to address; `None` uses SKIP ROM (single device on the bus).
    pub rom: Option<Rom>,
    /// Copy thresholds and resolution to EEPROM in `default_cfg`.
    pub persist: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { resolution: Resolution::Bits12, alarm_high: 125, alarm_low: -55, rom: None, persist: false }
    }
}

pub struct Thermo2<B, D> {
    bus: B,
    delay: D,
    config: Config,
}

impl<B, D> Thermo2<B, D>
where
    B: OneWireBus,
    D: DelayNs,
{
    pub fn new(bus: B, delay: D, config: Config) -> Self {
        Self { bus, delay, config }
    }

    /// Write thresholds and resolution, optionally persisting them.
    pub fn default_cfg(&mut self) -> Result<(), Error<B::Error>> {
        let cfg = self.config;
        self.select()?;
        self.command(commands::WRITE_SCRATCHPAD)?;
        self.bus
            .write_bytes(&[cfg.alarm_high as u8, cfg.alarm_low as u8, cfg.resolution.config_byte()])
            .map_err(Error::Bus)?;
        if cfg.persist {
            self.select()?;
            self.command(commands::COPY_SCRATCHPAD)?;
            self.delay.delay_ms(COPY_SCRATCHPAD_MS);
        }
        info!("DS1825 configured, resolution code {}", cfg.resolution as u8);
        Ok(())
    }

    pub fn read_scratchpad(&mut self) -> Result<[u8; 9], Error<B::Error>> {
        self.select()?;
        self.command(commands::READ_SCRATCHPAD)?;
        let mut pad = [0u8; 9];
        self.bus.read_bytes(&mut pad).map_err(Error::Bus)?;
        if onewire::crc8(&pad[..8]) != pad[8] {
            warn!("DS1825 scratchpad CRC mismatch");
            return Err(Error::Crc);
        }
        Ok(pad)
    }

    pub fn start_conversion(&mut self) -> Result<(), Error<B::Error>> {
        self.select()?;
        self.command(commands::CONVERT_T)
    }

    /// Convert, wait the conversion time for the configured resolution, read.
    pub fn read_temperature(&mut self) -> Result<f32, Error<B::Error>> {
        self.start_conversion()?;
        self.delay.delay_ms(self.config.resolution.conversion_ms());
        let pad = self.read_scratchpad()?;
        Ok(scratchpad_celsius(&pad))
    }

    /// AD3..AD0 strap inputs, for telling devices apart on a shared bus.
    pub fn hardware_address(&mut self) -> Result<u8, Error<B::Error>> {
        Ok(self.read_scratchpad()?[4] & 0x0F)
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.config.resolution = resolution;
    }

    pub fn select_device(&mut self, rom: Option<Rom>) {
        self.config.rom = rom;
    }

    /// ROMs of every DS1825 on the bus.
    pub fn search_devices<const N: usize>(&mut self) -> Result<Vec<Rom, N>, Error<B::Error>> {
        let mut found = Vec::new();
        let mut search = onewire::Search::new();
        while let Some(rom) = search.next(&mut self.bus)? {
            if rom.family() == DS1825_FAMILY {
                found.push(rom).map_err(|_| Error::Full)?;
            }
        }
        Ok(found)
    }

    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }

    fn select(&mut self) -> Result<(), Error<B::Error>> {
        let rom = self.config.rom;
        self.bus.select(rom.as_ref())
    }

    fn command(&mut self, cmd: u8) -> Result<(), Error<B::Error>> {
        self.bus.write_byte(cmd).map_err(Error::Bus)
    }
}

/// Temperature from a scratchpad, honoring the resolution it reports.
pub fn scratchpad_celsius(pad: &[u8; 9]) -> f32 {
    let raw = i16::from_le_bytes([pad[0], pad[1]]) & Resolution::from_config(pad[4]).raw_mask();
    raw as f32 / 16.0
}

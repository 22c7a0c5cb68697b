//! RTC 6 Click: MCP79411 real-time clock with SRAM and EEPROM (I2C)
//!
//! Two I2C targets share the bus:
//! - 0x6F: RTCC registers, 64 bytes battery-backed SRAM at 0x20..0x5F
//! - 0x57: 128 byte EEPROM (8 byte pages, 5 ms write cycle) plus the
//!   protected ID block at 0xF0..0xF7 (EUI-48 in the last six bytes)
//!
//! Time registers are BCD. The chip counts weekdays 1..=7 with no fixed
//! meaning; this driver stores Sunday as 1 so it maps onto
//! [`DateTime::weekday`] (0 = Sunday) by an offset of one. Years are
//! stored as 00..99 from 2000.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::bus;
use crate::datetime::{bcd_to_bin, bin_to_bcd, DateTime};
use crate::error::Error;

pub const RTC6_ADDR: u8 = 0x6F;
pub const RTC6_EEPROM_ADDR: u8 = 0x57;

pub const SRAM_SIZE: usize = 64;
pub const EEPROM_SIZE: usize = 128;
pub const EEPROM_PAGE_SIZE: usize = 8;
const EEPROM_WRITE_MS: u32 = 5;

// Register map
pub mod reg {
    pub const RTCSEC: u8 = 0x00; // bit7 ST
    pub const RTCMIN: u8 = 0x01;
    pub const RTCHOUR: u8 = 0x02; // bit6 12/24, bit5 AM/PM in 12 h mode
    pub const RTCWKDAY: u8 = 0x03; // bit5 OSCRUN, bit4 PWRFAIL, bit3 VBATEN
    pub const RTCDATE: u8 = 0x04;
    pub const RTCMTH: u8 = 0x05; // bit5 LPYR
    pub const RTCYEAR: u8 = 0x06;
    pub const CONTROL: u8 = 0x07;
    pub const OSCTRIM: u8 = 0x08;
    pub const ALM0SEC: u8 = 0x0A;
    pub const ALM1SEC: u8 = 0x11;
    pub const PWRDNMIN: u8 = 0x18;
    pub const SRAM_START: u8 = 0x20;

    pub const EEPROM_ID: u8 = 0xF0;
}

pub mod bits {
    pub const ST: u8 = 1 << 7;
    pub const HOUR_12H: u8 = 1 << 6;
    pub const HOUR_PM: u8 = 1 << 5;
    pub const OSCRUN: u8 = 1 << 5;
    pub const PWRFAIL: u8 = 1 << 4;
    pub const VBATEN: u8 = 1 << 3;
    pub const LPYR: u8 = 1 << 5;
    pub const ALM1EN: u8 = 1 << 5;
    pub const ALM0EN: u8 = 1 << 4;
    pub const ALMIF: u8 = 1 << 3;
    pub const ALMMSK_SHIFT: u8 = 4;
}

/// Offsets within an alarm register block.
const ALM_WKDAY: u8 = 3;

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub rtc_address: u8,
    pub eeprom_address: u8,
    /// Local time minus UTC, in minutes
    pub time_zone_minutes: i16,
}

impl Default for Config {
    fn default() -> Self {
        Self { rtc_address: RTC6_ADDR, eeprom_address: RTC6_EEPROM_ADDR, time_zone_minutes: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Alarm {
    Zero,
    One,
}

impl Alarm {
    fn base(self) -> u8 {
        match self {
            Alarm::Zero => reg::ALM0SEC,
            Alarm::One => reg::ALM1SEC,
        }
    }

    fn enable_bit(self) -> u8 {
        match self {
            Alarm::Zero => bits::ALM0EN,
            Alarm::One => bits::ALM1EN,
        }
    }
}

/// Fields compared for an alarm match (ALMxMSK).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmMatch {
    Seconds = 0b000,
    Minutes = 0b001,
    Hours = 0b010,
    Weekday = 0b011,
    Date = 0b100,
    /// Seconds, minutes, hours, weekday, date and month
    All = 0b111,
}

pub struct Rtc6<I2C, D> {
    i2c: I2C,
    delay: D,
    config: Config,
}

impl<I2C, D> Rtc6<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I2C, delay: D, config: Config) -> Self {
        Self { i2c, delay, config }
    }

    /// Battery backup on, 24 hour mode, oscillator running.
    pub fn default_cfg(&mut self) -> Result<(), Error<I2C::Error>> {
        self.enable_battery_backup(true)?;
        let hour = self.read_register(reg::RTCHOUR)?;
        if hour & bits::HOUR_12H != 0 {
            // Switching modes needs the hour rewritten in the new format.
            let h = decode_hour(hour).ok_or(Error::Parse)?;
            self.write_register(reg::RTCHOUR, bin_to_bcd(h).ok_or(Error::Parse)?)?;
        }
        self.start_oscillator()?;
        info!("MCP79411 configured (tz {} min)", self.config.time_zone_minutes);
        Ok(())
    }

    pub fn start_oscillator(&mut self) -> Result<(), Error<I2C::Error>> {
        self.update_register(reg::RTCSEC, bits::ST, bits::ST)
    }

    pub fn stop_oscillator(&mut self) -> Result<(), Error<I2C::Error>> {
        self.update_register(reg::RTCSEC, bits::ST, 0)
    }

    /// OSCRUN flag: the oscillator is actually ticking.
    pub fn is_running(&mut self) -> Result<bool, Error<I2C::Error>> {
        Ok(self.read_register(reg::RTCWKDAY)? & bits::OSCRUN != 0)
    }

    pub fn enable_battery_backup(&mut self, enable: bool) -> Result<(), Error<I2C::Error>> {
        self.update_register(reg::RTCWKDAY, bits::VBATEN, if enable { bits::VBATEN } else { 0 })
    }

    /// Main supply was lost while running from battery.
    pub fn power_failed(&mut self) -> Result<bool, Error<I2C::Error>> {
        Ok(self.read_register(reg::RTCWKDAY)? & bits::PWRFAIL != 0)
    }

    /// Clears PWRFAIL, which also clears the power-fail time stamps.
    pub fn clear_power_fail(&mut self) -> Result<(), Error<I2C::Error>> {
        self.update_register(reg::RTCWKDAY, bits::PWRFAIL, 0)
    }

    /// Digital trim: signed count of clock cycles added or removed per minute.
    pub fn set_trim(&mut self, trim: i8) -> Result<(), Error<I2C::Error>> {
        let sign = if trim >= 0 { 0x80 } else { 0x00 };
        let magnitude = trim.unsigned_abs().min(0x7F);
        self.write_register(reg::OSCTRIM, sign | magnitude)
    }

    /// Write local time; keeps ST, VBATEN and PWRFAIL as they are.
    pub fn set_time(&mut self, time: &DateTime) -> Result<(), Error<I2C::Error>> {
        if !time.is_valid() || !(2000..=2099).contains(&time.year) {
            return Err(Error::InvalidArgument);
        }
        let sec = self.read_register(reg::RTCSEC)?;
        let wkday = self.read_register(reg::RTCWKDAY)?;
        let bcd = |v: u8| bin_to_bcd(v).ok_or(Error::InvalidArgument);
        let frame = [
            (sec & bits::ST) | bcd(time.second)?,
            bcd(time.minute)?,
            bcd(time.hour)?,
            (wkday & (bits::VBATEN | bits::PWRFAIL)) | (time.weekday + 1),
            bcd(time.day)?,
            bcd(time.month)?,
            bcd((time.year - 2000) as u8)?,
        ];
        self.write_registers(reg::RTCSEC, &frame)?;
        debug!("RTC set to {}-{}-{} {}:{}:{}", time.year, time.month, time.day, time.hour, time.minute, time.second);
        Ok(())
    }

    /// Read local time. 12 hour register contents are converted to 0..=23.
    pub fn get_time(&mut self) -> Result<DateTime, Error<I2C::Error>> {
        let mut buf = [0u8; 7];
        self.read_registers(reg::RTCSEC, &mut buf)?;
        let field = |v: u8| bcd_to_bin(v).ok_or(Error::Parse);
        let weekday = buf[3] & 0x07;
        if weekday == 0 {
            return Err(Error::Parse);
        }
        let time = DateTime {
            second: field(buf[0] & 0x7F)?,
            minute: field(buf[1] & 0x7F)?,
            hour: decode_hour(buf[2]).ok_or(Error::Parse)?,
            weekday: weekday - 1,
            day: field(buf[4] & 0x3F)?,
            month: field(buf[5] & 0x1F)?,
            year: 2000 + field(buf[6])? as u16,
        };
        if !time.is_valid() {
            return Err(Error::Parse);
        }
        Ok(time)
    }

    /// Set the clock from UTC seconds; stored as local time per the zone offset.
    pub fn set_unix_time(&mut self, utc: i64) -> Result<(), Error<I2C::Error>> {
        let local = utc.checked_add(self.zone_offset_secs()).ok_or(Error::InvalidArgument)?;
        let time = DateTime::from_unix(local).ok_or(Error::InvalidArgument)?;
        self.set_time(&time)
    }

    pub fn get_unix_time(&mut self) -> Result<i64, Error<I2C::Error>> {
        Ok(self.get_time()?.to_unix() - self.zone_offset_secs())
    }

    pub fn set_time_zone(&mut self, minutes: i16) {
        self.config.time_zone_minutes = minutes;
    }

    /// Program and enable an alarm. `time` fields not covered by `mask` are
    /// written but ignored by the comparator.
    pub fn set_alarm(&mut self, alarm: Alarm, mask: AlarmMatch, time: &DateTime) -> Result<(), Error<I2C::Error>> {
        if !time.is_valid() {
            return Err(Error::InvalidArgument);
        }
        let bcd = |v: u8| bin_to_bcd(v).ok_or(Error::InvalidArgument);
        let frame = [
            bcd(time.second)?,
            bcd(time.minute)?,
            bcd(time.hour)?,
            ((mask as u8) << bits::ALMMSK_SHIFT) | (time.weekday + 1),
            bcd(time.day)?,
            bcd(time.month)?,
        ];
        self.write_registers(alarm.base(), &frame)?;
        self.update_register(reg::CONTROL, alarm.enable_bit(), alarm.enable_bit())
    }

    pub fn disable_alarm(&mut self, alarm: Alarm) -> Result<(), Error<I2C::Error>> {
        self.update_register(reg::CONTROL, alarm.enable_bit(), 0)
    }

    pub fn alarm_triggered(&mut self, alarm: Alarm) -> Result<bool, Error<I2C::Error>> {
        Ok(self.read_register(alarm.base() + ALM_WKDAY)? & bits::ALMIF != 0)
    }

    pub fn clear_alarm(&mut self, alarm: Alarm) -> Result<(), Error<I2C::Error>> {
        self.update_register(alarm.base() + ALM_WKDAY, bits::ALMIF, 0)
    }

    pub fn write_sram(&mut self, offset: usize, data: &[u8]) -> Result<(), Error<I2C::Error>> {
        if !in_range(offset, data.len(), SRAM_SIZE) {
            return Err(Error::InvalidArgument);
        }
        for (i, chunk) in data.chunks(bus::MAX_WRITE_LEN).enumerate() {
            let addr = reg::SRAM_START + (offset + i * bus::MAX_WRITE_LEN) as u8;
            self.write_registers(addr, chunk)?;
        }
        Ok(())
    }

    pub fn read_sram(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Error<I2C::Error>> {
        if !in_range(offset, buf.len(), SRAM_SIZE) {
            return Err(Error::InvalidArgument);
        }
        self.read_registers(reg::SRAM_START + offset as u8, buf)
    }

    /// Write the EEPROM, one page at a time, waiting out each write cycle.
    pub fn write_eeprom(&mut self, address: usize, data: &[u8]) -> Result<(), Error<I2C::Error>> {
        if !in_range(address, data.len(), EEPROM_SIZE) {
            return Err(Error::InvalidArgument);
        }
        let mut addr = address;
        let mut rest = data;
        while !rest.is_empty() {
            let room = EEPROM_PAGE_SIZE - addr % EEPROM_PAGE_SIZE;
            let (page, tail) = rest.split_at(room.min(rest.len()));
            bus::write_registers(&mut self.i2c, self.config.eeprom_address, addr as u8, page)?;
            self.delay.delay_ms(EEPROM_WRITE_MS);
            addr += page.len();
            rest = tail;
        }
        Ok(())
    }

    pub fn read_eeprom(&mut self, address: usize, buf: &mut [u8]) -> Result<(), Error<I2C::Error>> {
        if !in_range(address, buf.len(), EEPROM_SIZE) {
            return Err(Error::InvalidArgument);
        }
        bus::read_registers(&mut self.i2c, self.config.eeprom_address, address as u8, buf)
    }

    /// ID block at 0xF0; bytes 2..8 hold the factory EUI-48.
    pub fn read_unique_id(&mut self) -> Result<[u8; 8], Error<I2C::Error>> {
        let mut id = [0u8; 8];
        bus::read_registers(&mut self.i2c, self.config.eeprom_address, reg::EEPROM_ID, &mut id)?;
        Ok(id)
    }

    pub fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        bus::write_register(&mut self.i2c, self.config.rtc_address, reg, value)
    }

    pub fn read_register(&mut self, reg: u8) -> Result<u8, Error<I2C::Error>> {
        bus::read_register(&mut self.i2c, self.config.rtc_address, reg)
    }

    pub fn write_registers(&mut self, reg: u8, data: &[u8]) -> Result<(), Error<I2C::Error>> {
        bus::write_registers(&mut self.i2c, self.config.rtc_address, reg, data)
    }

    pub fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Error<I2C::Error>> {
        bus::read_registers(&mut self.i2c, self.config.rtc_address, reg, buf)
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn update_register(&mut self, reg: u8, mask: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        let current = self.read_register(reg)?;
        self.write_register(reg, (current & !mask) | (value & mask))
    }

    fn zone_offset_secs(&self) -> i64 {
        self.config.time_zone_minutes as i64 * 60
    }
}

/// RTCHOUR to 0..=23 for either hour format.
fn decode_hour(raw: u8) -> Option<u8> {
    if raw & bits::HOUR_12H != 0 {
        let h12 = bcd_to_bin(raw & 0x1F)?;
        if !(1..=12).contains(&h12) {
            return None;
        }
        let pm = raw & bits::HOUR_PM != 0;
        Some(h12 % 12 + if pm { 12 } else { 0 })
    } else {
        bcd_to_bin(raw & 0x3F)
    }
}

fn in_range(offset: usize, len: usize, size: usize) -> bool {
    matches!(offset.checked_add(len), Some(end) if end <= size)
}

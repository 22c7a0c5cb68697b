//! EEPROM Click: AT24C08-class 8 Kbit I2C EEPROM with write protect pin
//!
//! The 1024 byte array is split in four 256 byte blocks. The block number
//! (address bits 9..8) goes into the low bits of the device address, so the
//! chip answers on 0x50..0x53. Writes are limited to one 16 byte page and
//! take up to 5 ms, during which the chip does not acknowledge.
//! WP high blocks writes; the driver only drops it around a write.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;

use crate::bus;
use crate::error::Error;

pub const EEPROM_ADDR: u8 = 0x50;

const BLOCK_SIZE: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub base_address: u8,
    /// Bytes
    pub capacity: usize,
    pub page_size: usize,
    pub write_time_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self { base_address: EEPROM_ADDR, capacity: 1024, page_size: 16, write_time_ms: 5 }
    }
}

pub struct Eeprom<I2C, WP, D> {
    i2c: I2C,
    wp: WP,
    delay: D,
    config: Config,
}

impl<I2C, WP, D> Eeprom<I2C, WP, D>
where
    I2C: I2c,
    WP: OutputPin,
    D: DelayNs,
{
    /// Takes the bus and the WP pin; the array starts write protected.
    /// Pages must tile a 256 byte block so no page write crosses a block.
    pub fn new(i2c: I2C, mut wp: WP, delay: D, config: Config) -> Result<Self, Error<I2C::Error>> {
        if config.page_size == 0
            || config.page_size > bus::MAX_WRITE_LEN
            || BLOCK_SIZE % config.page_size != 0
            || config.capacity > 4 * BLOCK_SIZE
        {
            return Err(Error::InvalidArgument);
        }
        wp.set_high().map_err(Error::pin)?;
        Ok(Self { i2c, wp, delay, config })
    }

    pub fn write_protect(&mut self, enable: bool) -> Result<(), Error<I2C::Error>> {
        if enable {
            self.wp.set_high().map_err(Error::pin)
        } else {
            self.wp.set_low().map_err(Error::pin)
        }
    }

    pub fn write_byte(&mut self, address: usize, value: u8) -> Result<(), Error<I2C::Error>> {
        self.write(address, &[value])
    }

    pub fn read_byte(&mut self, address: usize) -> Result<u8, Error<I2C::Error>> {
        let mut buf = [0u8; 1];
        self.read(address, &mut buf)?;
        Ok(buf[0])
    }

    /// Write `data` at `address`, page by page. WP is re-asserted even if a
    /// page write fails.
    pub fn write(&mut self, address: usize, data: &[u8]) -> Result<(), Error<I2C::Error>> {
        self.check_range(address, data.len())?;
        self.write_protect(false)?;
        let result = self.write_pages(address, data);
        self.write_protect(true)?;
        result
    }

    /// Sequential read; split where the device address changes.
    pub fn read(&mut self, address: usize, buf: &mut [u8]) -> Result<(), Error<I2C::Error>> {
        self.check_range(address, buf.len())?;
        let mut addr = address;
        for chunk in split_at_boundaries(addr, buf, BLOCK_SIZE) {
            let (dev, offset) = self.locate(addr);
            bus::read_registers(&mut self.i2c, dev, offset, chunk)?;
            addr += chunk.len();
        }
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn release(self) -> (I2C, WP, D) {
        (self.i2c, self.wp, self.delay)
    }

    fn write_pages(&mut self, address: usize, data: &[u8]) -> Result<(), Error<I2C::Error>> {
        let page_size = self.config.page_size;
        let mut addr = address;
        let mut rest = data;
        while !rest.is_empty() {
            let room = page_size - addr % page_size;
            let (page, tail) = rest.split_at(room.min(rest.len()));
            let (dev, offset) = self.locate(addr);
            bus::write_registers(&mut self.i2c, dev, offset, page)?;
            self.delay.delay_ms(self.config.write_time_ms);
            trace!("EEPROM page write at {} ({} bytes)", addr, page.len());
            addr += page.len();
            rest = tail;
        }
        Ok(())
    }

    /// Device address and word address for a linear address.
    fn locate(&self, address: usize) -> (u8, u8) {
        let block = (address / BLOCK_SIZE) as u8;
        (self.config.base_address | block, (address % BLOCK_SIZE) as u8)
    }

    fn check_range(&self, address: usize, len: usize) -> Result<(), Error<I2C::Error>> {
        match address.checked_add(len) {
            Some(end) if end <= self.config.capacity => Ok(()),
            _ => Err(Error::InvalidArgument),
        }
    }
}

/// Split `buf` (starting at linear `address`) so no piece crosses a
/// multiple of `boundary`.
fn split_at_boundaries(address: usize, buf: &mut [u8], boundary: usize) -> impl Iterator<Item = &mut [u8]> {
    let first = (boundary - address % boundary).min(buf.len());
    let (head, tail) = buf.split_at_mut(first);
    core::iter::once(head).filter(|c| !c.is_empty()).chain(tail.chunks_mut(boundary))
}

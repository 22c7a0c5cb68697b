//! Register framing shared by the drivers.
//!
//! Most Click chips use the same two shapes: I2C "register address then
//! data" and SPI "header bytes then data" inside one chip-select window.

use embedded_hal::i2c::I2c;
use embedded_hal::spi::{Operation, SpiDevice};

use crate::error::Error;

/// Longest payload `write_registers` frames on the stack.
pub const MAX_WRITE_LEN: usize = 32;

/// Write one register.
pub fn write_register<I: I2c>(i2c: &mut I, address: u8, reg: u8, value: u8) -> Result<(), Error<I::Error>> {
    i2c.write(address, &[reg, value]).map_err(Error::Bus)
}

/// Write `data` starting at `reg` in a single bus transfer.
pub fn write_registers<I: I2c>(i2c: &mut I, address: u8, reg: u8, data: &[u8]) -> Result<(), Error<I::Error>> {
    if data.len() > MAX_WRITE_LEN {
        return Err(Error::InvalidArgument);
    }
    let mut frame = [0u8; MAX_WRITE_LEN + 1];
    frame[0] = reg;
    frame[1..=data.len()].copy_from_slice(data);
    i2c.write(address, &frame[..=data.len()]).map_err(Error::Bus)
}

/// Read one register.
pub fn read_register<I: I2c>(i2c: &mut I, address: u8, reg: u8) -> Result<u8, Error<I::Error>> {
    let mut buf = [0u8; 1];
    i2c.write_read(address, &[reg], &mut buf).map_err(Error::Bus)?;
    Ok(buf[0])
}

/// Read `buf.len()` registers starting at `reg`.
pub fn read_registers<I: I2c>(i2c: &mut I, address: u8, reg: u8, buf: &mut [u8]) -> Result<(), Error<I::Error>> {
    i2c.write_read(address, &[reg], buf).map_err(Error::Bus)
}

/// Clock out `header` followed by `data` with chip select held.
pub fn spi_write_registers<S: SpiDevice>(spi: &mut S, header: &[u8], data: &[u8]) -> Result<(), Error<S::Error>> {
    spi.transaction(&mut [Operation::Write(header), Operation::Write(data)])
        .map_err(Error::Bus)
}

/// Clock out `header`, then read `buf.len()` bytes with chip select held.
pub fn spi_read_registers<S: SpiDevice>(spi: &mut S, header: &[u8], buf: &mut [u8]) -> Result<(), Error<S::Error>> {
    spi.transaction(&mut [Operation::Write(header), Operation::Read(buf)])
        .map_err(Error::Bus)
}

/// Big-endian 24-bit value from the first three bytes.
#[inline]
pub fn be_u24(bytes: &[u8]) -> u32 {
    ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | (bytes[2] as u32)
}

/// Sign-extend the low `bits` bits of `value`.
#[inline]
pub fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

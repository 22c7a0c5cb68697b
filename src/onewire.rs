//! 1-Wire bus: bit-banged master, ROM commands, CRC8 and ROM search.
//!
//! Timing follows the standard-speed slot table from Maxim AN126:
//! - reset: 480 us low, sample presence 70 us after release, 410 us recovery
//! - write 1: 6 us low then 64 us high; write 0: 60 us low then 10 us high
//! - read: 6 us low, sample 9 us after release, 55 us recovery
//!
//! Bytes go LSB first. The pin must be open-drain with an external pull-up.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use heapless::Vec;

use crate::error::Error;

/// ROM command set
pub mod commands {
    pub const READ_ROM: u8 = 0x33;
    pub const MATCH_ROM: u8 = 0x55;
    pub const SKIP_ROM: u8 = 0xCC;
    pub const SEARCH_ROM: u8 = 0xF0;
    pub const ALARM_SEARCH: u8 = 0xEC;
}

/// 64-bit device ROM: family code, 48-bit serial, CRC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rom(pub [u8; 8]);

impl Rom {
    pub fn family(&self) -> u8 {
        self.0[0]
    }

    pub fn serial(&self) -> [u8; 6] {
        let mut s = [0u8; 6];
        s.copy_from_slice(&self.0[1..7]);
        s
    }

    pub fn crc(&self) -> u8 {
        self.0[7]
    }

    /// CRC byte matches the first seven bytes and the ROM is not all zeros
    /// (a shorted bus reads as zeros, which has a valid CRC).
    pub fn is_valid(&self) -> bool {
        self.0.iter().any(|&b| b != 0) && crc8(&self.0[..7]) == self.0[7]
    }
}

/// Dallas/Maxim CRC8 (x^8 + x^5 + x^4 + 1, reflected).
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}

/// Bit-level access to a 1-Wire bus. Byte and ROM operations are provided.
pub trait OneWireBus {
    type Error;

    /// Reset pulse; `true` when at least one device answered with presence.
    fn reset(&mut self) -> Result<bool, Self::Error>;
    fn write_bit(&mut self, bit: bool) -> Result<(), Self::Error>;
    fn read_bit(&mut self) -> Result<bool, Self::Error>;

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        for i in 0..8 {
            self.write_bit((byte >> i) & 0x01 != 0)?;
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        for &b in bytes {
            self.write_byte(b)?;
        }
        Ok(())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        for b in buf {
            *b = self.read_byte()?;
        }
        Ok(())
    }

    /// Reset, failing with [`Error::NoDevice`] when nobody answers.
    fn reset_expect_presence(&mut self) -> Result<(), Error<Self::Error>> {
        if self.reset().map_err(Error::Bus)? {
            Ok(())
        } else {
            Err(Error::NoDevice)
        }
    }

    /// ROM of the single device on the bus (READ ROM). CRC checked.
    fn read_rom(&mut self) -> Result<Rom, Error<Self::Error>> {
        self.reset_expect_presence()?;
        self.write_byte(commands::READ_ROM).map_err(Error::Bus)?;
        let mut rom = Rom::default();
        self.read_bytes(&mut rom.0).map_err(Error::Bus)?;
        if !rom.is_valid() {
            warn!("1-Wire ROM CRC mismatch (crc byte 0x{:02X})", rom.crc());
            return Err(Error::Crc);
        }
        Ok(rom)
    }

    /// Reset and address every device on the bus.
    fn skip_rom(&mut self) -> Result<(), Error<Self::Error>> {
        self.reset_expect_presence()?;
        self.write_byte(commands::SKIP_ROM).map_err(Error::Bus)
    }

    /// Reset and address the device with `rom`.
    fn match_rom(&mut self, rom: &Rom) -> Result<(), Error<Self::Error>> {
        self.reset_expect_presence()?;
        self.write_byte(commands::MATCH_ROM).map_err(Error::Bus)?;
        self.write_bytes(&rom.0).map_err(Error::Bus)
    }

    /// [`match_rom`](Self::match_rom) when a ROM is given, else [`skip_rom`](Self::skip_rom).
    fn select(&mut self, rom: Option<&Rom>) -> Result<(), Error<Self::Error>> {
        match rom {
            Some(rom) => self.match_rom(rom),
            None => self.skip_rom(),
        }
    }
}

/// Bit-banged 1-Wire master on one open-drain pin.
pub struct OneWire<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> OneWire<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    /// Takes the bus pin and releases it (idle high).
    pub fn new(mut pin: P, delay: D) -> Result<Self, P::Error> {
        pin.set_high()?;
        Ok(Self { pin, delay })
    }

    pub fn release(self) -> (P, D) {
        (self.pin, self.delay)
    }
}

impl<P, D> OneWireBus for OneWire<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    type Error = P::Error;

    fn reset(&mut self) -> Result<bool, P::Error> {
        self.pin.set_low()?;
        self.delay.delay_us(480);
        self.pin.set_high()?;
        self.delay.delay_us(70);
        let presence = self.pin.is_low()?;
        self.delay.delay_us(410);
        Ok(presence)
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), P::Error> {
        self.pin.set_low()?;
        if bit {
            self.delay.delay_us(6);
            self.pin.set_high()?;
            self.delay.delay_us(64);
        } else {
            self.delay.delay_us(60);
            self.pin.set_high()?;
            self.delay.delay_us(10);
        }
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, P::Error> {
        self.pin.set_low()?;
        self.delay.delay_us(6);
        self.pin.set_high()?;
        self.delay.delay_us(9);
        let bit = self.pin.is_high()?;
        self.delay.delay_us(55);
        Ok(bit)
    }
}

/// ROM search state (Maxim AN187). Each call to [`Search::next`] walks the
/// ROM tree once and returns the next device.
#[derive(Debug, Clone)]
pub struct Search {
    command: u8,
    rom: [u8; 8],
    last_discrepancy: u8, // 1-based bit index, 0 = none
    last_device: bool,
}

impl Default for Search {
    fn default() -> Self {
        Self::new()
    }
}

impl Search {
    /// Enumerate every device.
    pub fn new() -> Self {
        Self::with_command(commands::SEARCH_ROM)
    }

    /// Enumerate only devices with an active alarm flag.
    pub fn alarm() -> Self {
        Self::with_command(commands::ALARM_SEARCH)
    }

    fn with_command(command: u8) -> Self {
        Self { command, rom: [0; 8], last_discrepancy: 0, last_device: false }
    }

    fn restart(&mut self) {
        self.rom = [0; 8];
        self.last_discrepancy = 0;
        self.last_device = false;
    }

    /// Next ROM on the bus, `Ok(None)` once all devices were returned.
    pub fn next<B: OneWireBus>(&mut self, bus: &mut B) -> Result<Option<Rom>, Error<B::Error>> {
        if self.last_device {
            return Ok(None);
        }
        if !bus.reset().map_err(Error::Bus)? {
            self.restart();
            return Ok(None);
        }
        bus.write_byte(self.command).map_err(Error::Bus)?;

        let mut last_zero = 0u8;
        for bit_number in 1..=64u8 {
            let id_bit = bus.read_bit().map_err(Error::Bus)?;
            let cmp_id_bit = bus.read_bit().map_err(Error::Bus)?;
            let byte = ((bit_number - 1) / 8) as usize;
            let mask = 1u8 << ((bit_number - 1) % 8);

            let direction = match (id_bit, cmp_id_bit) {
                // Nobody is participating any more.
                (true, true) => {
                    self.restart();
                    return Ok(None);
                }
                (a, b) if a != b => a,
                _ => {
                    let dir = if bit_number < self.last_discrepancy {
                        self.rom[byte] & mask != 0
                    } else {
                        bit_number == self.last_discrepancy
                    };
                    if !dir {
                        last_zero = bit_number;
                    }
                    dir
                }
            };

            if direction {
                self.rom[byte] |= mask;
            } else {
                self.rom[byte] &= !mask;
            }
            bus.write_bit(direction).map_err(Error::Bus)?;
        }

        self.last_discrepancy = last_zero;
        if last_zero == 0 {
            self.last_device = true;
        }
        let rom = Rom(self.rom);
        if !rom.is_valid() {
            warn!("1-Wire search produced ROM with bad CRC");
            return Err(Error::Crc);
        }
        Ok(Some(rom))
    }
}

/// Every ROM on the bus. [`Error::Full`] when more than `N` devices answer.
pub fn search_all<B: OneWireBus, const N: usize>(bus: &mut B) -> Result<Vec<Rom, N>, Error<B::Error>> {
    let mut found = Vec::new();
    let mut search = Search::new();
    while let Some(rom) = search.next(bus)? {
        found.push(rom).map_err(|_| Error::Full)?;
    }
    debug!("1-Wire search found {} device(s)", found.len());
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDelay, FakeDevice, FakeOneWire, FakePin};

    #[test]
    fn crc8_reference_rom() {
        // Example ROM from Maxim AN27.
        assert_eq!(crc8(&[0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00]), 0xA2);
        assert!(Rom([0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00, 0xA2]).is_valid());
        assert!(!Rom([0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00, 0xA3]).is_valid());
        assert!(!Rom([0; 8]).is_valid());
    }

    #[test]
    fn rom_fields() {
        let rom = Rom([0x01, 1, 2, 3, 4, 5, 6, 0x99]);
        assert_eq!(rom.family(), 0x01);
        assert_eq!(rom.serial(), [1, 2, 3, 4, 5, 6]);
        assert_eq!(rom.crc(), 0x99);
    }

    #[test]
    fn read_rom_of_single_device() {
        let dev = FakeDevice::new([0x01, 0x6B, 0x2A, 0x3C, 0x12, 0x00, 0x00]);
        let expected = dev.rom;
        let mut bus = FakeOneWire::new(vec![dev]);
        assert_eq!(bus.read_rom().unwrap(), Rom(expected));
        assert_eq!(expected[7], 0x1C);
    }

    #[test]
    fn read_rom_without_presence() {
        let mut bus = FakeOneWire::new(vec![]);
        assert_eq!(bus.read_rom(), Err(Error::NoDevice));
    }

    #[test]
    fn search_finds_every_device_once() {
        let roms = [
            [0x28, 0x10, 0x00, 0x00, 0x00, 0x00, 0x01],
            [0x28, 0x10, 0x00, 0x00, 0x00, 0x00, 0x02],
            [0x3B, 0xAA, 0x55, 0x00, 0x12, 0x34, 0x56],
            [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
        ];
        let devices: std::vec::Vec<_> = roms.iter().map(|r| FakeDevice::new(*r)).collect();
        let mut expected: std::vec::Vec<Rom> = devices.iter().map(|d| Rom(d.rom)).collect();
        let mut bus = FakeOneWire::new(devices);

        let found: Vec<Rom, 8> = search_all(&mut bus).unwrap();
        let mut found: std::vec::Vec<Rom> = found.into_iter().collect();
        found.sort_by_key(|r| r.0);
        expected.sort_by_key(|r| r.0);
        assert_eq!(found, expected);
    }

    #[test]
    fn alarm_search_returns_only_flagged_devices() {
        let quiet = FakeDevice::new([0x28, 0x01, 0, 0, 0, 0, 0]);
        let hot = FakeDevice::new([0x28, 0x02, 0, 0, 0, 0, 0]).with_alarm();
        let cold = FakeDevice::new([0x3B, 0x03, 0, 0, 0, 0, 0]).with_alarm();
        let mut expected = vec![Rom(hot.rom), Rom(cold.rom)];
        let mut bus = FakeOneWire::new(vec![quiet, hot, cold]);

        let mut search = Search::alarm();
        let mut found = std::vec::Vec::new();
        while let Some(rom) = search.next(&mut bus).unwrap() {
            found.push(rom);
        }
        found.sort_by_key(|r| r.0);
        expected.sort_by_key(|r| r.0);
        assert_eq!(found, expected);
    }

    #[test]
    fn alarm_search_without_alarms_is_empty() {
        let mut bus = FakeOneWire::new(vec![FakeDevice::new([0x28, 0x01, 0, 0, 0, 0, 0])]);
        assert_eq!(Search::alarm().next(&mut bus), Ok(None));
    }

    #[test]
    fn search_on_empty_bus() {
        let mut bus = FakeOneWire::new(vec![]);
        let found: Vec<Rom, 4> = search_all(&mut bus).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn search_overflow_reports_full() {
        let devices = (1..=3u8).map(|i| FakeDevice::new([0x28, i, 0, 0, 0, 0, 0])).collect();
        let mut bus = FakeOneWire::new(devices);
        assert_eq!(search_all::<_, 2>(&mut bus), Err(Error::Full));
    }

    #[test]
    fn bit_banged_reset_samples_presence() {
        let pin = FakePin::new();
        let delay = FakeDelay::default();
        let mut ow = OneWire::new(pin.clone(), delay.clone()).unwrap();
        pin.queue_input(false); // device pulls the line low
        assert!(ow.reset().unwrap());
        pin.queue_input(true);
        assert!(!ow.reset().unwrap());
        assert_eq!(delay.elapsed_us(), 2 * (480 + 70 + 410));
    }

    #[test]
    fn bit_banged_byte_write_is_lsb_first() {
        let pin = FakePin::new();
        let mut ow = OneWire::new(pin.clone(), FakeDelay::default()).unwrap();
        pin.clear_history();
        ow.write_byte(0x01).unwrap();
        // Every slot is low then high; 8 slots.
        assert_eq!(pin.history().len(), 16);
        let mut read = OneWire::new(pin.clone(), FakeDelay::default()).unwrap();
        for level in [true, false, true, false, false, false, false, false] {
            pin.queue_input(level);
        }
        assert_eq!(read.read_byte().unwrap(), 0x05);
    }
}

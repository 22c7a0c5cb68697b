//! Host-side fakes for the embedded-hal traits the drivers use.

use core::convert::Infallible;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::i2c::{self, I2c};
use embedded_hal::pwm::{self, SetDutyCycle};
use embedded_hal::spi::{self, SpiDevice};
use embedded_hal_nb::serial;

use crate::onewire::{crc8, OneWireBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeBusError;

impl i2c::Error for FakeBusError {
    fn kind(&self) -> i2c::ErrorKind {
        i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Address)
    }
}

impl spi::Error for FakeBusError {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

impl serial::Error for FakeBusError {
    fn kind(&self) -> serial::ErrorKind {
        serial::ErrorKind::Other
    }
}

/// I2C bus with one 256-byte register bank per device address.
///
/// A write sets the register pointer from its first byte and stores the rest
/// with auto-increment. Reads return queued responses first, then register
/// contents from the pointer.
pub struct FakeI2c {
    devices: BTreeMap<u8, [u8; 256]>,
    pointer: u8,
    /// Applied to the first byte of a write to get the register pointer.
    pub pointer_mask: u8,
    pub writes: Vec<(u8, Vec<u8>)>,
    responses: VecDeque<Vec<u8>>,
}

impl FakeI2c {
    pub fn new(addresses: &[u8]) -> Self {
        Self {
            devices: addresses.iter().map(|&a| (a, [0u8; 256])).collect(),
            pointer: 0,
            pointer_mask: 0xFF,
            writes: Vec::new(),
            responses: VecDeque::new(),
        }
    }

    pub fn set(&mut self, address: u8, reg: u8, bytes: &[u8]) {
        let bank = self.devices.get_mut(&address).expect("unknown address");
        for (i, &b) in bytes.iter().enumerate() {
            bank[(reg as usize + i) % 256] = b;
        }
    }

    pub fn reg(&self, address: u8, reg: u8) -> u8 {
        self.devices[&address][reg as usize]
    }

    pub fn regs(&self, address: u8, reg: u8, len: usize) -> Vec<u8> {
        (0..len).map(|i| self.devices[&address][(reg as usize + i) % 256]).collect()
    }

    pub fn queue_response(&mut self, bytes: &[u8]) {
        self.responses.push_back(bytes.to_vec());
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }
}

impl i2c::ErrorType for FakeI2c {
    type Error = FakeBusError;
}

impl I2c for FakeI2c {
    fn transaction(&mut self, address: u8, operations: &mut [i2c::Operation<'_>]) -> Result<(), FakeBusError> {
        if !self.devices.contains_key(&address) {
            return Err(FakeBusError);
        }
        for op in operations {
            match op {
                i2c::Operation::Write(bytes) => {
                    self.writes.push((address, bytes.to_vec()));
                    if let Some((&first, rest)) = bytes.split_first() {
                        self.pointer = first & self.pointer_mask;
                        let bank = self.devices.get_mut(&address).expect("checked above");
                        for &b in rest {
                            bank[self.pointer as usize] = b;
                            self.pointer = self.pointer.wrapping_add(1);
                        }
                    }
                }
                i2c::Operation::Read(buf) => {
                    if let Some(resp) = self.responses.pop_front() {
                        for (dst, src) in buf.iter_mut().zip(resp.iter()) {
                            *dst = *src;
                        }
                    } else {
                        let bank = &self.devices[&address];
                        for b in buf.iter_mut() {
                            *b = bank[self.pointer as usize];
                            self.pointer = self.pointer.wrapping_add(1);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// SPI device recording the bytes written per transaction and answering
/// reads from a byte queue (0x00 once empty).
#[derive(Default)]
pub struct FakeSpi {
    pub transactions: Vec<Vec<u8>>,
    responses: VecDeque<u8>,
}

impl FakeSpi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_response(&mut self, bytes: &[u8]) {
        self.responses.extend(bytes.iter().copied());
    }

    fn next_byte(&mut self) -> u8 {
        self.responses.pop_front().unwrap_or(0)
    }
}

impl spi::ErrorType for FakeSpi {
    type Error = FakeBusError;
}

impl SpiDevice for FakeSpi {
    fn transaction(&mut self, operations: &mut [spi::Operation<'_, u8>]) -> Result<(), FakeBusError> {
        let mut written = Vec::new();
        for op in operations {
            match op {
                spi::Operation::Read(buf) => {
                    for b in buf.iter_mut() {
                        *b = self.next_byte();
                    }
                }
                spi::Operation::Write(data) => written.extend_from_slice(data),
                spi::Operation::Transfer(read, write) => {
                    written.extend_from_slice(write);
                    for b in read.iter_mut() {
                        *b = self.next_byte();
                    }
                }
                spi::Operation::TransferInPlace(buf) => {
                    written.extend_from_slice(buf);
                    for b in buf.iter_mut() {
                        *b = self.next_byte();
                    }
                }
                spi::Operation::DelayNs(_) => {}
            }
        }
        self.transactions.push(written);
        Ok(())
    }
}

#[derive(Default)]
struct PinInner {
    high: bool,
    history: Vec<bool>,
    inputs: VecDeque<bool>,
}

/// GPIO whose clones share state, so a test keeps a handle to a pin it
/// moved into a driver.
#[derive(Clone, Default)]
pub struct FakePin {
    inner: Rc<RefCell<PinInner>>,
}

impl FakePin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set_high(&self) -> bool {
        self.inner.borrow().high
    }

    pub fn history(&self) -> Vec<bool> {
        self.inner.borrow().history.clone()
    }

    pub fn clear_history(&self) {
        self.inner.borrow_mut().history.clear();
    }

    /// Level returned by the next input sample (falls back to the driven level).
    pub fn queue_input(&self, level: bool) {
        self.inner.borrow_mut().inputs.push_back(level);
    }
}

impl digital::ErrorType for FakePin {
    type Error = Infallible;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        let mut inner = self.inner.borrow_mut();
        inner.high = false;
        inner.history.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        let mut inner = self.inner.borrow_mut();
        inner.high = true;
        inner.history.push(true);
        Ok(())
    }
}

impl InputPin for FakePin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        let mut inner = self.inner.borrow_mut();
        let level = match inner.inputs.pop_front() {
            Some(level) => level,
            None => inner.high,
        };
        Ok(level)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|h| !h)
    }
}

/// Delay that only accumulates the requested time.
#[derive(Clone, Default)]
pub struct FakeDelay {
    total_ns: Rc<Cell<u64>>,
}

impl FakeDelay {
    pub fn elapsed_us(&self) -> u64 {
        self.total_ns.get() / 1_000
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.total_ns.get() / 1_000_000
    }
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns.set(self.total_ns.get() + ns as u64);
    }

    fn delay_us(&mut self, us: u32) {
        self.total_ns.set(self.total_ns.get() + us as u64 * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ns.set(self.total_ns.get() + ms as u64 * 1_000_000);
    }
}

/// PWM channel with a 0..=1000 duty range.
#[derive(Clone)]
pub struct FakePwm {
    duty: Rc<Cell<u16>>,
}

impl FakePwm {
    pub const MAX: u16 = 1000;

    pub fn new() -> Self {
        Self { duty: Rc::new(Cell::new(Self::MAX)) }
    }

    pub fn duty(&self) -> u16 {
        self.duty.get()
    }
}

impl pwm::ErrorType for FakePwm {
    type Error = Infallible;
}

impl SetDutyCycle for FakePwm {
    fn max_duty_cycle(&self) -> u16 {
        Self::MAX
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        self.duty.set(duty);
        Ok(())
    }
}

/// Serial port fed from a byte queue; `read` would-blocks once it is empty.
#[derive(Default)]
pub struct FakeSerial {
    rx: VecDeque<u8>,
    pub tx: Vec<u8>,
}

impl FakeSerial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }
}

impl serial::ErrorType for FakeSerial {
    type Error = FakeBusError;
}

impl serial::Read<u8> for FakeSerial {
    fn read(&mut self) -> nb::Result<u8, FakeBusError> {
        self.rx.pop_front().ok_or(nb::Error::WouldBlock)
    }
}

impl serial::Write<u8> for FakeSerial {
    fn write(&mut self, word: u8) -> nb::Result<(), FakeBusError> {
        self.tx.push(word);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), FakeBusError> {
        Ok(())
    }
}

/// A 1-Wire slave: ROM plus a DS18x20-style scratchpad.
#[derive(Debug, Clone)]
pub struct FakeDevice {
    pub rom: [u8; 8],
    pub scratchpad: [u8; 9],
    /// Answers ALARM SEARCH
    pub alarm: bool,
}

impl FakeDevice {
    /// Device with the CRC byte appended to `rom` and a power-on scratchpad
    /// (+85 C, 12-bit resolution).
    pub fn new(rom: [u8; 7]) -> Self {
        let mut full = [0u8; 8];
        full[..7].copy_from_slice(&rom);
        full[7] = crc8(&rom);
        let mut dev = Self { rom: full, scratchpad: [0x50, 0x05, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0], alarm: false };
        dev.fix_crc();
        dev
    }

    pub fn with_temperature_raw(mut self, raw: i16) -> Self {
        let [lsb, msb] = raw.to_le_bytes();
        self.scratchpad[0] = lsb;
        self.scratchpad[1] = msb;
        self.fix_crc();
        self
    }

    pub fn with_alarm(mut self) -> Self {
        self.alarm = true;
        self
    }

    pub fn fix_crc(&mut self) {
        self.scratchpad[8] = crc8(&self.scratchpad[..8]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    All,
    One(usize),
    Nobody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireState {
    Idle,
    RomCommand,
    Matching,
    Function,
    Search { bit: u8, phase: u8 },
    WriteScratchpad(usize),
}

/// Bit-level 1-Wire bus simulating every attached device, wired-AND.
pub struct FakeOneWire {
    pub devices: Vec<FakeDevice>,
    /// Function commands received after ROM selection.
    pub functions: Vec<u8>,
    state: WireState,
    target: Target,
    active: Vec<bool>,
    match_buf: Vec<u8>,
    reads: VecDeque<bool>,
    acc: u8,
    acc_bits: u8,
}

impl FakeOneWire {
    pub fn new(devices: Vec<FakeDevice>) -> Self {
        let n = devices.len();
        Self {
            devices,
            functions: Vec::new(),
            state: WireState::Idle,
            target: Target::Nobody,
            active: vec![true; n],
            match_buf: Vec::new(),
            reads: VecDeque::new(),
            acc: 0,
            acc_bits: 0,
        }
    }

    fn rom_bit(&self, dev: usize, bit: u8) -> bool {
        self.devices[dev].rom[(bit / 8) as usize] & (1 << (bit % 8)) != 0
    }

    fn queue_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            for i in 0..8 {
                self.reads.push_back(b & (1 << i) != 0);
            }
        }
    }

    fn targets(&self) -> Vec<usize> {
        match self.target {
            Target::All => (0..self.devices.len()).collect(),
            Target::One(i) => vec![i],
            Target::Nobody => Vec::new(),
        }
    }

    fn on_byte(&mut self, b: u8) {
        match self.state {
            WireState::RomCommand => match b {
                0x33 => {
                    // Wired-AND of every ROM; a single device reads cleanly.
                    let mut rom = [0xFFu8; 8];
                    for dev in &self.devices {
                        for (r, d) in rom.iter_mut().zip(dev.rom.iter()) {
                            *r &= d;
                        }
                    }
                    self.queue_bytes(&rom);
                    self.target = Target::All;
                    self.state = WireState::Function;
                }
                0xCC => {
                    self.target = Target::All;
                    self.state = WireState::Function;
                }
                0x55 => {
                    self.match_buf.clear();
                    self.state = WireState::Matching;
                }
                0xF0 => {
                    self.active = vec![true; self.devices.len()];
                    self.state = WireState::Search { bit: 0, phase: 0 };
                }
                0xEC => {
                    self.active = self.devices.iter().map(|d| d.alarm).collect();
                    self.state = WireState::Search { bit: 0, phase: 0 };
                }
                _ => self.state = WireState::Idle,
            },
            WireState::Matching => {
                self.match_buf.push(b);
                if self.match_buf.len() == 8 {
                    self.target = match self.devices.iter().position(|d| d.rom[..] == self.match_buf[..]) {
                        Some(i) => Target::One(i),
                        None => Target::Nobody,
                    };
                    self.state = WireState::Function;
                }
            }
            WireState::Function => {
                self.functions.push(b);
                match b {
                    0xBE => {
                        if let Some(&i) = self.targets().first() {
                            let pad = self.devices[i].scratchpad;
                            self.queue_bytes(&pad);
                        }
                    }
                    0x4E => self.state = WireState::WriteScratchpad(0),
                    _ => {}
                }
            }
            WireState::WriteScratchpad(n) => {
                for i in self.targets() {
                    self.devices[i].scratchpad[2 + n] = b;
                    self.devices[i].fix_crc();
                }
                self.state = if n == 2 { WireState::Idle } else { WireState::WriteScratchpad(n + 1) };
            }
            WireState::Idle | WireState::Search { .. } => {}
        }
    }
}

impl OneWireBus for FakeOneWire {
    type Error = Infallible;

    fn reset(&mut self) -> Result<bool, Infallible> {
        self.state = WireState::RomCommand;
        self.target = Target::Nobody;
        self.reads.clear();
        self.acc = 0;
        self.acc_bits = 0;
        Ok(!self.devices.is_empty())
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), Infallible> {
        if let WireState::Search { bit: idx, .. } = self.state {
            for dev in 0..self.devices.len() {
                if self.rom_bit(dev, idx) != bit {
                    self.active[dev] = false;
                }
            }
            self.state = if idx == 63 { WireState::Idle } else { WireState::Search { bit: idx + 1, phase: 0 } };
            return Ok(());
        }
        if bit {
            self.acc |= 1 << self.acc_bits;
        }
        self.acc_bits += 1;
        if self.acc_bits == 8 {
            let b = self.acc;
            self.acc = 0;
            self.acc_bits = 0;
            self.on_byte(b);
        }
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, Infallible> {
        if let WireState::Search { bit, phase } = self.state {
            let want = phase == 0;
            let level = (0..self.devices.len())
                .filter(|&d| self.active[d])
                .all(|d| self.rom_bit(d, bit) == want);
            self.state = WireState::Search { bit, phase: phase + 1 };
            return Ok(level);
        }
        Ok(self.reads.pop_front().unwrap_or(true))
    }
}

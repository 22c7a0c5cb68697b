//! ETH WIZ Click: W5500 hardwired TCP/IP controller (SPI)
//!
//! Every SPI frame starts with a 3 byte header:
//! - 16-bit offset address, big-endian
//! - control byte: block select (bits 7..3), RWB (bit 2, 1 = write),
//!   operation mode (bits 1..0, 00 = variable length, CS framed)
//!
//! Block 0 is the common register file; socket `n` uses block `4n + 1` for
//! its registers, `4n + 2` for its TX buffer and `4n + 3` for RX.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

use crate::bus;
use crate::error::Error;

pub const CHIP_VERSION: u8 = 0x04;
pub const SOCKETS: u8 = 8;

const RESET_POLLS: u32 = 100;
const COMMAND_POLLS: u32 = 100;

/// Common register offsets (block 0)
pub mod reg {
    pub const MR: u16 = 0x0000;
    pub const GAR: u16 = 0x0001;
    pub const SUBR: u16 = 0x0005;
    pub const SHAR: u16 = 0x0009;
    pub const SIPR: u16 = 0x000F;
    pub const PHYCFGR: u16 = 0x002E;
    pub const VERSIONR: u16 = 0x0039;

    pub const MR_RST: u8 = 1 << 7;
}

/// Socket register offsets (block 4n + 1)
pub mod sreg {
    pub const MR: u16 = 0x0000;
    pub const CR: u16 = 0x0001;
    pub const IR: u16 = 0x0002;
    pub const SR: u16 = 0x0003;
    pub const PORT: u16 = 0x0004;
    pub const RXBUF_SIZE: u16 = 0x001E;
    pub const TXBUF_SIZE: u16 = 0x001F;
}

/// Sn_CR commands
pub mod command {
    pub const OPEN: u8 = 0x01;
    pub const LISTEN: u8 = 0x02;
    pub const CONNECT: u8 = 0x04;
    pub const DISCON: u8 = 0x08;
    pub const CLOSE: u8 = 0x10;
    pub const SEND: u8 = 0x20;
    pub const RECV: u8 = 0x40;
}

/// Sn_MR protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Protocol {
    Closed = 0x00,
    Tcp = 0x01,
    Udp = 0x02,
    MacRaw = 0x04,
}

/// Sn_SR values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketStatus {
    Closed,
    Init,
    Listen,
    Established,
    CloseWait,
    Udp,
    MacRaw,
    /// Transitional states (SYNSENT, FIN_WAIT, ...)
    Other(u8),
}

impl From<u8> for SocketStatus {
    fn from(v: u8) -> Self {
        match v {
            0x00 => SocketStatus::Closed,
            0x13 => SocketStatus::Init,
            0x14 => SocketStatus::Listen,
            0x17 => SocketStatus::Established,
            0x1C => SocketStatus::CloseWait,
            0x22 => SocketStatus::Udp,
            0x42 => SocketStatus::MacRaw,
            other => SocketStatus::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStatus {
    pub up: bool,
    pub speed_100m: bool,
    pub full_duplex: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub mac: [u8; 6],
    pub ip: [u8; 4],
    pub gateway: [u8; 4],
    pub subnet: [u8; 4],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mac: [0x00, 0x08, 0xDC, 0x01, 0x02, 0x03],
            ip: [192, 168, 1, 100],
            gateway: [192, 168, 1, 1],
            subnet: [255, 255, 255, 0],
        }
    }
}

pub const COMMON_BLOCK: u8 = 0x00;

/// Block select bits of a socket's register file; `None` past [`SOCKETS`].
pub fn socket_register_block(socket: u8) -> Option<u8> {
    (socket < SOCKETS).then(|| socket * 4 + 1)
}

pub fn socket_tx_block(socket: u8) -> Option<u8> {
    (socket < SOCKETS).then(|| socket * 4 + 2)
}

pub fn socket_rx_block(socket: u8) -> Option<u8> {
    (socket < SOCKETS).then(|| socket * 4 + 3)
}

fn header(block: u8, address: u16, write: bool) -> [u8; 3] {
    let [hi, lo] = address.to_be_bytes();
    [hi, lo, (block << 3) | if write { 0x04 } else { 0x00 }]
}

pub struct EthWiz<SPI, D> {
    spi: SPI,
    delay: D,
    config: Config,
}

impl<SPI, D> EthWiz<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    pub fn new(spi: SPI, delay: D, config: Config) -> Self {
        Self { spi, delay, config }
    }

    pub fn write_registers(&mut self, block: u8, address: u16, data: &[u8]) -> Result<(), Error<SPI::Error>> {
        bus::spi_write_registers(&mut self.spi, &header(block, address, true), data)
    }

    pub fn read_registers(&mut self, block: u8, address: u16, buf: &mut [u8]) -> Result<(), Error<SPI::Error>> {
        bus::spi_read_registers(&mut self.spi, &header(block, address, false), buf)
    }

    pub fn write_register(&mut self, block: u8, address: u16, value: u8) -> Result<(), Error<SPI::Error>> {
        self.write_registers(block, address, &[value])
    }

    pub fn read_register(&mut self, block: u8, address: u16) -> Result<u8, Error<SPI::Error>> {
        let mut buf = [0u8; 1];
        self.read_registers(block, address, &mut buf)?;
        Ok(buf[0])
    }

    /// Set MR.RST and wait for the chip to clear it.
    pub fn software_reset(&mut self) -> Result<(), Error<SPI::Error>> {
        self.write_register(COMMON_BLOCK, reg::MR, reg::MR_RST)?;
        for _ in 0..RESET_POLLS {
            if self.read_register(COMMON_BLOCK, reg::MR)? & reg::MR_RST == 0 {
                return Ok(());
            }
            self.delay.delay_ms(1);
        }
        error!("W5500 reset did not complete");
        Err(Error::Timeout)
    }

    pub fn check_version(&mut self) -> Result<(), Error<SPI::Error>> {
        let version = self.read_register(COMMON_BLOCK, reg::VERSIONR)?;
        if version != CHIP_VERSION {
            warn!("W5500 VERSIONR 0x{:02X}", version);
            return Err(Error::InvalidDevice(version));
        }
        Ok(())
    }

    /// Reset, verify the chip and load the network settings from `Config`.
    pub fn default_cfg(&mut self) -> Result<(), Error<SPI::Error>> {
        self.software_reset()?;
        self.check_version()?;
        let cfg = self.config;
        self.set_mac(cfg.mac)?;
        self.set_gateway(cfg.gateway)?;
        self.set_subnet(cfg.subnet)?;
        self.set_ip(cfg.ip)?;
        info!("W5500 up at {}.{}.{}.{}", cfg.ip[0], cfg.ip[1], cfg.ip[2], cfg.ip[3]);
        Ok(())
    }

    pub fn set_mac(&mut self, mac: [u8; 6]) -> Result<(), Error<SPI::Error>> {
        self.write_registers(COMMON_BLOCK, reg::SHAR, &mac)?;
        self.config.mac = mac;
        Ok(())
    }

    pub fn mac(&mut self) -> Result<[u8; 6], Error<SPI::Error>> {
        let mut mac = [0u8; 6];
        self.read_registers(COMMON_BLOCK, reg::SHAR, &mut mac)?;
        Ok(mac)
    }

    pub fn set_ip(&mut self, ip: [u8; 4]) -> Result<(), Error<SPI::Error>> {
        self.write_registers(COMMON_BLOCK, reg::SIPR, &ip)?;
        self.config.ip = ip;
        Ok(())
    }

    pub fn ip(&mut self) -> Result<[u8; 4], Error<SPI::Error>> {
        let mut ip = [0u8; 4];
        self.read_registers(COMMON_BLOCK, reg::SIPR, &mut ip)?;
        Ok(ip)
    }

    pub fn set_gateway(&mut self, gateway: [u8; 4]) -> Result<(), Error<SPI::Error>> {
        self.write_registers(COMMON_BLOCK, reg::GAR, &gateway)?;
        self.config.gateway = gateway;
        Ok(())
    }

    pub fn set_subnet(&mut self, subnet: [u8; 4]) -> Result<(), Error<SPI::Error>> {
        self.write_registers(COMMON_BLOCK, reg::SUBR, &subnet)?;
        self.config.subnet = subnet;
        Ok(())
    }

    pub fn link_status(&mut self) -> Result<LinkStatus, Error<SPI::Error>> {
        let phy = self.read_register(COMMON_BLOCK, reg::PHYCFGR)?;
        Ok(LinkStatus { up: phy & 0x01 != 0, speed_100m: phy & 0x02 != 0, full_duplex: phy & 0x04 != 0 })
    }

    pub fn socket_status(&mut self, socket: u8) -> Result<SocketStatus, Error<SPI::Error>> {
        let block = Self::socket_block(socket)?;
        self.read_register(block, sreg::SR).map(SocketStatus::from)
    }

    /// Issue a Sn_CR command and wait until the chip accepts it (Sn_CR reads 0).
    pub fn socket_command(&mut self, socket: u8, cmd: u8) -> Result<(), Error<SPI::Error>> {
        let block = Self::socket_block(socket)?;
        self.write_register(block, sreg::CR, cmd)?;
        for _ in 0..COMMAND_POLLS {
            if self.read_register(block, sreg::CR)? == 0 {
                return Ok(());
            }
            self.delay.delay_us(10);
        }
        Err(Error::Timeout)
    }

    /// Set protocol and source port, then OPEN.
    pub fn open_socket(&mut self, socket: u8, protocol: Protocol, port: u16) -> Result<(), Error<SPI::Error>> {
        let block = Self::socket_block(socket)?;
        self.write_register(block, sreg::MR, protocol as u8)?;
        self.write_registers(block, sreg::PORT, &port.to_be_bytes())?;
        self.socket_command(socket, command::OPEN)
    }

    /// Buffer sizes in KB; each must be 0, 1, 2, 4, 8 or 16.
    pub fn set_socket_buffer_sizes(&mut self, socket: u8, rx_kb: u8, tx_kb: u8) -> Result<(), Error<SPI::Error>> {
        let block = Self::socket_block(socket)?;
        let valid = |kb: u8| matches!(kb, 0 | 1 | 2 | 4 | 8 | 16);
        if !valid(rx_kb) || !valid(tx_kb) {
            return Err(Error::InvalidArgument);
        }
        self.write_register(block, sreg::RXBUF_SIZE, rx_kb)?;
        self.write_register(block, sreg::TXBUF_SIZE, tx_kb)
    }

    pub fn socket_interrupts(&mut self, socket: u8) -> Result<u8, Error<SPI::Error>> {
        let block = Self::socket_block(socket)?;
        self.read_register(block, sreg::IR)
    }

    pub fn release(self) -> (SPI, D) {
        (self.spi, self.delay)
    }

    fn socket_block(socket: u8) -> Result<u8, Error<SPI::Error>> {
        socket_register_block(socket).ok_or(Error::InvalidArgument)
    }
}

//! Crate-wide driver error.

use core::convert::Infallible;
use core::fmt;

/// Errors returned by every driver in this crate.
///
/// `E` is the error type of the bus the driver talks over. Drivers that only
/// toggle GPIO keep the default `Infallible`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E = Infallible> {
    /// I2C / SPI / UART / 1-Wire transfer failed
    Bus(E),
    /// Setting or sampling a GPIO failed
    Pin,
    /// Identification register held an unexpected value (value read)
    InvalidDevice(u8),
    /// Argument outside the range the device accepts
    InvalidArgument,
    /// Device did not become ready in time
    Timeout,
    /// Checksum or CRC mismatch
    Crc,
    /// No device answered (e.g. missing 1-Wire presence pulse)
    NoDevice,
    /// Malformed data received from the device
    Parse,
    /// Device reported a fault condition
    SensorFault,
    /// Fixed-capacity storage is full
    Full,
}

impl<E> Error<E> {
    /// Collapses any GPIO error into [`Error::Pin`]; pin error types differ per pin.
    pub(crate) fn pin<P>(_: P) -> Self {
        Error::Pin
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "bus error: {:?}", e),
            Error::Pin => f.write_str("gpio error"),
            Error::InvalidDevice(id) => write!(f, "unexpected device id 0x{:02X}", id),
            Error::InvalidArgument => f.write_str("argument out of range"),
            Error::Timeout => f.write_str("device timed out"),
            Error::Crc => f.write_str("crc mismatch"),
            Error::NoDevice => f.write_str("no device present"),
            Error::Parse => f.write_str("malformed data"),
            Error::SensorFault => f.write_str("sensor fault"),
            Error::Full => f.write_str("storage full"),
        }
    }
}

/// `Result` with the crate error.
pub type Result<T, E = Infallible> = core::result::Result<T, Error<E>>;

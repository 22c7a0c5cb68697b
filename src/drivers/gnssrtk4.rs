//! GNSS RTK 4 Click: RTK-capable GNSS receiver streaming NMEA 0183 over UART.
//!
//! Only GGA (fix data) is decoded; every other sentence is still handed out
//! by [`GnssRtk4::read_sentence`] for the caller to use or drop.
//!
//! GGA layout (field index after splitting on ','):
//! ```text
//! 0 $xxGGA  1 hhmmss.ss  2 ddmm.mmmm  3 N/S  4 dddmm.mmmm  5 E/W
//! 6 quality  7 satellites  8 HDOP  9 altitude  10 M  11 geoid sep  12 M
//! 13 differential age  14 differential station ID
//! ```
//! followed by `*hh`, the XOR of every byte between `$` and `*`.

use core::fmt::Write as _;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal_nb::serial::{Read, Write};
use heapless::String;

use crate::error::Error;

pub const MAX_SENTENCE_LEN: usize = 128;

const GGA_FIELDS: usize = 15;
const RESET_PULSE_MS: u32 = 10;
const BOOT_MS: u32 = 100;

/// GGA fix quality indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FixQuality {
    Invalid,
    Gps,
    Dgps,
    Pps,
    RtkFixed,
    RtkFloat,
    Estimated,
    Manual,
    Simulation,
}

impl FixQuality {
    fn from_digit(d: u8) -> Option<Self> {
        Some(match d {
            0 => FixQuality::Invalid,
            1 => FixQuality::Gps,
            2 => FixQuality::Dgps,
            3 => FixQuality::Pps,
            4 => FixQuality::RtkFixed,
            5 => FixQuality::RtkFloat,
            6 => FixQuality::Estimated,
            7 => FixQuality::Manual,
            8 => FixQuality::Simulation,
            _ => return None,
        })
    }

    pub fn has_fix(&self) -> bool {
        !matches!(self, FixQuality::Invalid)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UtcTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millis: u16,
}

impl UtcTime {
    pub fn seconds_of_day(&self) -> u32 {
        self.hour as u32 * 3600 + self.minute as u32 * 60 + self.second as u32
    }
}

/// Decoded GGA sentence. Empty fields are `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gga {
    pub talker: [u8; 2],
    pub time: Option<UtcTime>,
    /// Decimal degrees, north positive
    pub latitude: Option<f64>,
    /// Decimal degrees, east positive
    pub longitude: Option<f64>,
    pub quality: FixQuality,
    pub satellites: Option<u8>,
    pub hdop: Option<f32>,
    /// Metres above mean sea level
    pub altitude: Option<f32>,
    pub geoid_separation: Option<f32>,
    /// Seconds since the last differential correction
    pub differential_age: Option<f32>,
    pub differential_station: Option<u16>,
}

/// XOR checksum of a sentence body. A leading `$` and anything from `*` on
/// are ignored.
pub fn nmea_checksum(sentence: &str) -> u8 {
    let body = sentence.strip_prefix('$').unwrap_or(sentence);
    let body = body.split('*').next().unwrap_or("");
    body.bytes().fold(0, |acc, b| acc ^ b)
}

/// Field `index` of a sentence (0 is the `$xxYYY` address), checksum excluded.
pub fn parse_field(sentence: &str, index: usize) -> Option<&str> {
    let body = sentence.trim_end_matches(['\r', '\n']);
    let body = body.split('*').next().unwrap_or("");
    body.split(',').nth(index)
}

/// Parse and validate a GGA sentence.
///
/// - [`Error::Parse`]: not GGA, missing checksum, malformed field
/// - [`Error::Crc`]: checksum mismatch
pub fn parse_gga(line: &str) -> Result<Gga, Error> {
    let line = line.trim_end_matches(['\r', '\n']);
    if !line.is_ascii() {
        return Err(Error::Parse);
    }
    let (body, checksum) = line.split_once('*').ok_or(Error::Parse)?;
    if checksum.len() != 2 || !checksum.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::Parse);
    }
    let expected = u8::from_str_radix(checksum, 16).map_err(|_| Error::Parse)?;
    if nmea_checksum(body) != expected {
        return Err(Error::Crc);
    }

    let mut fields: heapless::Vec<&str, GGA_FIELDS> = heapless::Vec::new();
    for field in body.split(',') {
        fields.push(field).map_err(|_| Error::Parse)?;
    }
    if fields.len() != GGA_FIELDS {
        return Err(Error::Parse);
    }

    let address = fields[0].as_bytes();
    if address.len() != 6 || address[0] != b'$' || &address[3..] != b"GGA" {
        return Err(Error::Parse);
    }

    let quality = fields[6]
        .parse::<u8>()
        .ok()
        .and_then(FixQuality::from_digit)
        .ok_or(Error::Parse)?;

    Ok(Gga {
        talker: [address[1], address[2]],
        time: optional(fields[1], parse_time)?,
        latitude: coordinate(fields[2], fields[3], 2, 'N', 'S')?,
        longitude: coordinate(fields[4], fields[5], 3, 'E', 'W')?,
        quality,
        satellites: optional(fields[7], |s| s.parse().ok())?,
        hdop: optional(fields[8], |s| s.parse().ok())?,
        altitude: optional(fields[9], |s| s.parse().ok())?,
        geoid_separation: optional(fields[11], |s| s.parse().ok())?,
        differential_age: optional(fields[13], |s| s.parse().ok())?,
        differential_station: optional(fields[14], |s| s.parse().ok())?,
    })
}

/// `None` for an empty field, `Parse` when a non-empty field does not decode.
fn optional<T>(field: &str, parse: impl FnOnce(&str) -> Option<T>) -> Result<Option<T>, Error> {
    if field.is_empty() {
        return Ok(None);
    }
    parse(field).map(Some).ok_or(Error::Parse)
}

fn parse_time(s: &str) -> Option<UtcTime> {
    let (hms, frac) = match s.split_once('.') {
        Some((hms, frac)) => (hms, frac),
        None => (s, ""),
    };
    if hms.len() != 6 || !hms.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour: u8 = hms[0..2].parse().ok()?;
    let minute: u8 = hms[2..4].parse().ok()?;
    let second: u8 = hms[4..6].parse().ok()?;
    if hour > 23 || minute > 59 || second > 60 {
        return None;
    }
    let mut millis: u16 = 0;
    let mut scale = 100;
    for b in frac.bytes().take(3) {
        if !b.is_ascii_digit() {
            return None;
        }
        millis += (b - b'0') as u16 * scale;
        scale /= 10;
    }
    Some(UtcTime { hour, minute, second, millis })
}

/// `(d)ddmm.mmmm` plus hemisphere to signed decimal degrees.
fn coordinate(value: &str, hemisphere: &str, degree_digits: usize, positive: char, negative: char) -> Result<Option<f64>, Error> {
    if value.is_empty() && hemisphere.is_empty() {
        return Ok(None);
    }
    let dot = value.find('.').unwrap_or(value.len());
    if dot != degree_digits + 2 {
        return Err(Error::Parse);
    }
    let degrees: u16 = value[..degree_digits].parse().map_err(|_| Error::Parse)?;
    let minutes: f64 = value[degree_digits..].parse().map_err(|_| Error::Parse)?;
    if minutes >= 60.0 {
        return Err(Error::Parse);
    }
    let magnitude = degrees as f64 + minutes / 60.0;
    match hemisphere.chars().next() {
        Some(c) if c == positive => Ok(Some(magnitude)),
        Some(c) if c == negative => Ok(Some(-magnitude)),
        _ => Err(Error::Parse),
    }
}

pub struct GnssRtk4<S, RST> {
    serial: S,
    reset: RST,
    line: String<MAX_SENTENCE_LEN>,
    in_sentence: bool,
    complete: bool,
    overflows: u32,
}

impl<S, RST> GnssRtk4<S, RST>
where
    S: Read<u8> + Write<u8>,
    RST: OutputPin,
{
    /// RST is active low; the receiver is left running.
    pub fn new(serial: S, mut reset: RST) -> Result<Self, Error<S::Error>> {
        reset.set_high().map_err(Error::pin)?;
        Ok(Self { serial, reset, line: String::new(), in_sentence: false, complete: false, overflows: 0 })
    }

    /// Hardware reset pulse, then wait for the receiver to boot.
    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<S::Error>> {
        self.reset.set_low().map_err(Error::pin)?;
        delay.delay_ms(RESET_PULSE_MS);
        self.reset.set_high().map_err(Error::pin)?;
        delay.delay_ms(BOOT_MS);
        self.line.clear();
        self.in_sentence = false;
        self.complete = false;
        Ok(())
    }

    /// Drain received bytes into the line buffer. Returns the next complete
    /// sentence (without CR/LF), or `None` once the UART has nothing more.
    /// Sentences longer than [`MAX_SENTENCE_LEN`] are dropped.
    pub fn read_sentence(&mut self) -> Result<Option<&str>, Error<S::Error>> {
        if self.complete {
            self.line.clear();
            self.complete = false;
        }
        loop {
            let byte = match self.serial.read() {
                Ok(b) => b,
                Err(nb::Error::WouldBlock) => return Ok(None),
                Err(nb::Error::Other(e)) => return Err(Error::Bus(e)),
            };
            match byte {
                b'$' => {
                    self.line.clear();
                    self.in_sentence = self.line.push('$').is_ok();
                }
                b'\r' => {}
                b'\n' if self.in_sentence => {
                    self.in_sentence = false;
                    self.complete = true;
                    return Ok(Some(self.line.as_str()));
                }
                b if self.in_sentence && b.is_ascii() && !b.is_ascii_control() => {
                    if self.line.push(b as char).is_err() {
                        self.overflows = self.overflows.wrapping_add(1);
                        warn!("NMEA sentence longer than {} bytes dropped", MAX_SENTENCE_LEN);
                        self.line.clear();
                        self.in_sentence = false;
                    }
                }
                _ => {
                    // Noise or binary data outside a sentence.
                    if self.in_sentence {
                        self.line.clear();
                        self.in_sentence = false;
                    }
                }
            }
        }
    }

    /// Read every pending sentence and return the last GGA that parsed.
    pub fn poll_gga(&mut self) -> Result<Option<Gga>, Error<S::Error>> {
        let mut latest = None;
        while let Some(line) = self.read_sentence()? {
            if parse_field(line, 0).is_some_and(|a| a.ends_with("GGA")) {
                match parse_gga(line) {
                    Ok(gga) => latest = Some(gga),
                    Err(_) => debug!("GGA sentence rejected"),
                }
            }
        }
        Ok(latest)
    }

    /// Send `$body*hh\r\n`. `body` must not contain `$` or `*`.
    pub fn send_command(&mut self, body: &str) -> Result<(), Error<S::Error>> {
        if body.contains(['$', '*']) || body.len() + 6 > MAX_SENTENCE_LEN {
            return Err(Error::InvalidArgument);
        }
        let mut out: String<MAX_SENTENCE_LEN> = String::new();
        write!(out, "${}*{:02X}\r\n", body, nmea_checksum(body)).map_err(|_| Error::InvalidArgument)?;
        for b in out.bytes() {
            nb::block!(self.serial.write(b)).map_err(Error::Bus)?;
        }
        nb::block!(self.serial.flush()).map_err(Error::Bus)
    }

    /// Sentences dropped for exceeding the line buffer.
    pub fn overflows(&self) -> u32 {
        self.overflows
    }

    pub fn release(self) -> (S, RST) {
        (self.serial, self.reset)
    }
}

//! GNSS middleware: keeps the last usable GGA fix from a [`GnssRtk4`] and
//! turns it into log-friendly output.

use core::fmt::Write as _;
use embedded_hal::digital::OutputPin;
use embedded_hal_nb::serial::{Read, Write};
use heapless::String;

use crate::drivers::gnssrtk4::{parse_field, parse_gga, FixQuality, Gga, GnssRtk4};
use crate::error::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Counters {
    /// Complete sentences of any type
    pub sentences: u32,
    /// GGA sentences that decoded
    pub gga: u32,
    /// GGA sentences failing checksum or layout
    pub rejected: u32,
}

#[derive(Default)]
pub struct FixTracker {
    last: Option<Gga>,
    counters: Counters,
}

impl FixTracker {
    pub fn new() -> Self {
        Self { last: None, counters: Counters::default() }
    }

    /// Feed one sentence. Returns `true` when it replaced the stored fix.
    /// Counters wrap.
    pub fn handle_sentence(&mut self, line: &str) -> bool {
        self.counters.sentences = self.counters.sentences.wrapping_add(1);
        if !parse_field(line, 0).is_some_and(|a| a.ends_with("GGA")) {
            return false;
        }
        match parse_gga(line) {
            Ok(gga) => {
                self.counters.gga = self.counters.gga.wrapping_add(1);
                // A no-fix GGA must not wipe the last position.
                if gga.quality.has_fix() && gga.latitude.is_some() && gga.longitude.is_some() {
                    self.last = Some(gga);
                    return true;
                }
                false
            }
            Err(_) => {
                self.counters.rejected = self.counters.rejected.wrapping_add(1);
                false
            }
        }
    }

    /// Drain the receiver. Returns `true` when a new fix arrived.
    pub fn update<S, RST>(&mut self, gnss: &mut GnssRtk4<S, RST>) -> Result<bool, Error<S::Error>>
    where
        S: Read<u8> + Write<u8>,
        RST: OutputPin,
    {
        let mut updated = false;
        while let Some(line) = gnss.read_sentence()? {
            updated |= self.handle_sentence(line);
        }
        Ok(updated)
    }

    pub fn last(&self) -> Option<&Gga> {
        self.last.as_ref()
    }

    pub fn quality(&self) -> FixQuality {
        self.last.map_or(FixQuality::Invalid, |g| g.quality)
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn utc_seconds_of_day(&self) -> Option<u32> {
        self.last.and_then(|g| g.time).map(|t| t.seconds_of_day())
    }

    /// `hh:mm:ss,lat,lon,alt,quality,sats,hdop`; empty fields stay empty.
    pub fn csv(&self) -> String<128> {
        let mut out = String::new();
        let Some(g) = &self.last else {
            return out;
        };
        // 128 bytes always fits this layout; a failed write only truncates.
        if let Some(t) = g.time {
            let _ = write!(out, "{:02}:{:02}:{:02}", t.hour, t.minute, t.second);
        }
        let _ = out.push(',');
        if let Some(lat) = g.latitude {
            let _ = write!(out, "{:.7}", lat);
        }
        let _ = out.push(',');
        if let Some(lon) = g.longitude {
            let _ = write!(out, "{:.7}", lon);
        }
        let _ = out.push(',');
        if let Some(alt) = g.altitude {
            let _ = write!(out, "{:.1}", alt);
        }
        let _ = write!(out, ",{},", g.quality as u8);
        if let Some(sats) = g.satellites {
            let _ = write!(out, "{}", sats);
        }
        let _ = out.push(',');
        if let Some(hdop) = g.hdop {
            let _ = write!(out, "{:.2}", hdop);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePin, FakeSerial};

    const CLASSIC: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
    const NO_FIX: &str = "$GNGGA,,,,,,0,00,99.99,,,,,,*56";

    #[test]
    fn keeps_last_valid_fix() {
        let mut t = FixTracker::new();
        assert!(t.handle_sentence(CLASSIC));
        assert!(!t.handle_sentence(NO_FIX));
        assert_eq!(t.quality(), FixQuality::Gps);
        assert_eq!(t.utc_seconds_of_day(), Some(12 * 3600 + 35 * 60 + 19));
        assert_eq!(t.counters(), Counters { sentences: 2, gga: 2, rejected: 0 });
    }

    #[test]
    fn counts_rejected_and_other_sentences() {
        let mut t = FixTracker::new();
        assert!(!t.handle_sentence(&CLASSIC.replace("*47", "*00")));
        assert!(!t.handle_sentence("$GPGSV,1,1,00*79"));
        assert_eq!(t.counters(), Counters { sentences: 2, gga: 0, rejected: 1 });
        assert!(t.last().is_none());
        assert_eq!(t.csv().as_str(), "");
    }

    #[test]
    fn counters_wrap_instead_of_overflowing() {
        let mut t = FixTracker::new();
        t.counters = Counters { sentences: u32::MAX, gga: u32::MAX, rejected: u32::MAX };
        t.handle_sentence(CLASSIC);
        t.handle_sentence(&CLASSIC.replace("*47", "*00"));
        assert_eq!(t.counters(), Counters { sentences: 1, gga: 0, rejected: 0 });
    }

    #[test]
    fn csv_summary() {
        let mut t = FixTracker::new();
        t.handle_sentence(CLASSIC);
        assert_eq!(t.csv().as_str(), "12:35:19,48.1173000,11.5166667,545.4,1,8,0.90");
    }

    #[test]
    fn update_drains_receiver() {
        let mut serial = FakeSerial::new();
        for line in [NO_FIX, CLASSIC, "$GPGSV,1,1,00*79"] {
            serial.feed(line.as_bytes());
            serial.feed(b"\r\n");
        }
        let mut gnss = GnssRtk4::new(serial, FakePin::new()).unwrap();
        let mut t = FixTracker::new();
        assert!(t.update(&mut gnss).unwrap());
        assert_eq!(t.counters().sentences, 3);
        assert!(!t.update(&mut gnss).unwrap());
    }
}

//! Calendar date/time shared by the RTC drivers.
//!
//! RTC chips store time as packed BCD fields; this module converts those
//! fields and maps calendar time to and from Unix seconds. The conversion
//! uses the days-from-civil algorithm over the proleptic Gregorian calendar,
//! so it is exact for any date representable in [`DateTime`].

use core::fmt::Write as _;
use heapless::String;

/// Date and time of day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTime {
    pub year: u16,   // full year, e.g. 2025
    pub month: u8,   // 1..=12
    pub day: u8,     // 1..=31
    pub weekday: u8, // 0..=6, 0 = Sunday
    pub hour: u8,    // 0..=23
    pub minute: u8,  // 0..=59
    pub second: u8,  // 0..=59
}

const SECONDS_PER_DAY: i64 = 86_400;

impl DateTime {
    /// Build a date/time with the weekday filled in.
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        let mut dt = Self { year, month, day, weekday: 0, hour, minute, second };
        dt.calculate_weekday();
        dt
    }

    /// True when every field is in range, including the month length.
    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month)
            && self.day >= 1
            && self.day <= days_in_month(self.year, self.month)
            && self.hour <= 23
            && self.minute <= 59
            && self.second <= 59
            && self.weekday <= 6
    }

    /// Recompute `weekday` from the date (0 = Sunday).
    pub fn calculate_weekday(&mut self) {
        let days = days_from_civil(self.year as i64, self.month, self.day);
        self.weekday = weekday_from_days(days);
    }

    /// Seconds since 1970-01-01T00:00:00, treating the fields as UTC.
    pub fn to_unix(&self) -> i64 {
        days_from_civil(self.year as i64, self.month, self.day) * SECONDS_PER_DAY
            + self.hour as i64 * 3600
            + self.minute as i64 * 60
            + self.second as i64
    }

    /// Calendar time for `secs` since the Unix epoch. `None` when the year
    /// falls outside `0..=9999`.
    pub fn from_unix(secs: i64) -> Option<Self> {
        let days = secs.div_euclid(SECONDS_PER_DAY);
        let rem = secs.rem_euclid(SECONDS_PER_DAY);
        let (year, month, day) = civil_from_days(days);
        if !(0..=9999).contains(&year) {
            return None;
        }
        Some(Self {
            year: year as u16,
            month,
            day,
            weekday: weekday_from_days(days),
            hour: (rem / 3600) as u8,
            minute: (rem % 3600 / 60) as u8,
            second: (rem % 60) as u8,
        })
    }

    /// `MM/DD/YYYY HH:MM:SS`
    pub fn format(&self) -> String<32> {
        let mut output = String::new();
        let _ = write!(
            output,
            "{:02}/{:02}/{:04} {:02}:{:02}:{:02}",
            self.month, self.day, self.year, self.hour, self.minute, self.second
        );
        output
    }

    /// `YYYY-MM-DDTHH:MM:SSZ`
    pub fn format_iso8601(&self) -> String<32> {
        let mut s = String::new();
        let _ = write!(
            s,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        );
        s
    }
}

pub fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian date.
fn days_from_civil(year: i64, month: u8, day: u8) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = (if y >= 0 { y } else { y - 399 }) / 400;
    let yoe = y - era * 400;
    let m = month as i64;
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Inverse of [`days_from_civil`].
fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}

// 1970-01-01 was a Thursday.
fn weekday_from_days(days: i64) -> u8 {
    (days + 4).rem_euclid(7) as u8
}

/// Packed BCD to binary; rejects nibbles above 9.
#[inline]
pub fn bcd_to_bin(bcd: u8) -> Option<u8> {
    let hi = bcd >> 4;
    let lo = bcd & 0x0F;
    if hi <= 9 && lo <= 9 { Some(hi * 10 + lo) } else { None }
}

/// Binary to packed BCD; values above 99 do not fit.
#[inline]
pub fn bin_to_bcd(bin: u8) -> Option<u8> {
    if bin > 99 {
        return None;
    }
    Some(((bin / 10) << 4) | (bin % 10))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcd_conversion() {
        assert_eq!(bcd_to_bin(0x23), Some(23));
        assert_eq!(bcd_to_bin(0x59), Some(59));
        assert_eq!(bcd_to_bin(0x5A), None);
        assert_eq!(bin_to_bcd(23), Some(0x23));
        assert_eq!(bin_to_bcd(59), Some(0x59));
        assert_eq!(bin_to_bcd(100), None);
    }

    #[test]
    fn weekday_calculation() {
        let mut dt = DateTime { year: 2025, month: 7, day: 7, weekday: 0, hour: 18, minute: 30, second: 0 };
        dt.calculate_weekday();
        assert_eq!(dt.weekday, 1); // July 7, 2025 is a Monday
    }

    #[test]
    fn unix_epoch_round_trip_known_instants() {
        let cases = [
            (0, DateTime { year: 1970, month: 1, day: 1, weekday: 4, hour: 0, minute: 0, second: 0 }),
            (951_782_400, DateTime { year: 2000, month: 2, day: 29, weekday: 2, hour: 0, minute: 0, second: 0 }),
            (1_700_000_000, DateTime { year: 2023, month: 11, day: 14, weekday: 2, hour: 22, minute: 13, second: 20 }),
            (4_102_444_799, DateTime { year: 2099, month: 12, day: 31, weekday: 4, hour: 23, minute: 59, second: 59 }),
            (-86_400, DateTime { year: 1969, month: 12, day: 31, weekday: 3, hour: 0, minute: 0, second: 0 }),
        ];
        for (secs, dt) in cases {
            assert_eq!(DateTime::from_unix(secs), Some(dt), "from_unix({secs})");
            assert_eq!(dt.to_unix(), secs);
        }
    }

    #[test]
    fn leap_day_noon() {
        assert_eq!(DateTime::new(2024, 2, 29, 12, 0, 0).to_unix(), 1_709_208_000);
    }

    #[test]
    fn every_day_of_a_century_round_trips() {
        let start = DateTime::new(2000, 1, 1, 0, 0, 0).to_unix();
        let mut prev = DateTime::from_unix(start).unwrap();
        for day in 1..36_525 {
            let dt = DateTime::from_unix(start + day * SECONDS_PER_DAY).unwrap();
            assert!(dt.is_valid());
            assert_eq!(dt.weekday, (prev.weekday + 1) % 7);
            assert_eq!(dt.to_unix(), start + day * SECONDS_PER_DAY);
            prev = dt;
        }
        assert_eq!((prev.year, prev.month, prev.day), (2099, 12, 31));
    }

    #[test]
    fn validity_checks_month_length() {
        assert!(DateTime::new(2024, 2, 29, 0, 0, 0).is_valid());
        assert!(!DateTime { year: 2023, month: 2, day: 29, ..Default::default() }.is_valid());
        assert!(!DateTime { year: 2023, month: 13, day: 1, ..Default::default() }.is_valid());
        assert!(days_in_month(1900, 2) == 28 && days_in_month(2000, 2) == 29);
    }

    #[test]
    fn formatting() {
        let dt = DateTime::new(2025, 7, 7, 18, 30, 5);
        assert_eq!(dt.format().as_str(), "07/07/2025 18:30:05");
        assert_eq!(dt.format_iso8601().as_str(), "2025-07-07T18:30:05Z");
    }
}

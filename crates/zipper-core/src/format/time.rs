//! MS-DOS timestamps as stored in ZIP headers.

use std::time::SystemTime;

use chrono::DateTime;
use chrono::Datelike;
use chrono::Local;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::Timelike;

const DOS_MIN_YEAR: i32 = 1980;
const DOS_MAX_YEAR: i32 = 2107;

/// Packed date and time fields with two-second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DosDateTime {
    /// `hour << 11 | minute << 5 | second / 2`
    pub time: u16,
    /// `(year - 1980) << 9 | month << 5 | day`
    pub date: u16,
}

impl Default for DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable instant.
    fn default() -> Self {
        Self {
            time: 0,
            date: (1 << 5) | 1,
        }
    }
}

impl DosDateTime {
    /// Packs a local date-time, clamping to the 1980-2107 range.
    #[must_use]
    pub fn from_naive(value: NaiveDateTime) -> Self {
        if value.year() < DOS_MIN_YEAR {
            return Self::default();
        }
        if value.year() > DOS_MAX_YEAR {
            return Self {
                time: (23 << 11) | (59 << 5) | 29,
                date: (((DOS_MAX_YEAR - DOS_MIN_YEAR) as u16) << 9) | (12 << 5) | 31,
            };
        }

        let year = (value.year() - DOS_MIN_YEAR) as u16;
        Self {
            time: ((value.hour() as u16) << 11)
                | ((value.minute() as u16) << 5)
                | ((value.second() as u16) / 2),
            date: (year << 9) | ((value.month() as u16) << 5) | value.day() as u16,
        }
    }

    /// Packs a filesystem timestamp in the local time zone.
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Self {
        Self::from_naive(DateTime::<Local>::from(time).naive_local())
    }

    /// Returns the current local time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Unpacks the fields, or `None` if they do not form a valid date.
    #[must_use]
    pub fn to_naive(self) -> Option<NaiveDateTime> {
        let year = i32::from(self.date >> 9) + DOS_MIN_YEAR;
        let month = u32::from((self.date >> 5) & 0x0F);
        let day = u32::from(self.date & 0x1F);
        let hour = u32::from(self.time >> 11);
        let minute = u32::from((self.time >> 5) & 0x3F);
        let second = u32::from(self.time & 0x1F) * 2;

        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn naive(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_pack_and_unpack() {
        let value = naive(2024, 3, 15, 13, 45, 30);
        let dos = DosDateTime::from_naive(value);
        assert_eq!(dos.to_naive(), Some(value));
    }

    #[test]
    fn test_odd_seconds_round_down() {
        let dos = DosDateTime::from_naive(naive(2000, 1, 1, 0, 0, 59));
        assert_eq!(dos.to_naive(), Some(naive(2000, 1, 1, 0, 0, 58)));
    }

    #[test]
    fn test_clamps_out_of_range_years() {
        let early = DosDateTime::from_naive(naive(1970, 1, 1, 0, 0, 0));
        assert_eq!(early, DosDateTime::default());
        assert_eq!(early.to_naive(), Some(naive(1980, 1, 1, 0, 0, 0)));

        let late = DosDateTime::from_naive(naive(2200, 6, 1, 0, 0, 0));
        assert_eq!(late.to_naive(), Some(naive(2107, 12, 31, 23, 59, 58)));
    }

    #[test]
    fn test_invalid_fields_unpack_to_none() {
        let dos = DosDateTime { time: 0, date: 0 };
        assert_eq!(dos.to_naive(), None);
    }
}

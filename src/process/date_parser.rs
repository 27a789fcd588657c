use chrono::{DateTime, Datelike, Local, NaiveDate, Timelike};

use crate::config::LocalClock;

/// Calendar features of one `YYYYMMDD` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateParts {
    /// ISO-8601 week number (1..=53).
    pub week_of_year: u32,
    pub month: u32,
    /// `day / 8`: days 1-7 → 0, 8-15 → 1, 16-23 → 2, 24-31 → 3.
    pub quarter_month: u32,
    /// Monday = 0 … Sunday = 6.
    pub weekday: u32,
}

impl From<NaiveDate> for DateParts {
    fn from(d: NaiveDate) -> Self {
        Self {
            week_of_year: d.iso_week().week(),
            month: d.month(),
            quarter_month: d.day() / 8,
            weekday: d.weekday().num_days_from_monday(),
        }
    }
}

/// Fast parse of `"YYYYMMDD"` → date
pub fn parse_yyyymmdd(s: &str) -> Option<NaiveDate> {
    let s = s.trim().trim_matches('"');
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = s[0..4].parse().ok()?;
    let month: u32 = s[4..6].parse().ok()?;
    let day: u32 = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Wall-clock hour of `epoch_secs` under `clock`, or `None` if out of range.
pub fn local_hour(epoch_secs: i64, clock: &LocalClock) -> Option<u32> {
    let utc = DateTime::from_timestamp(epoch_secs, 0)?;
    let hour = match clock {
        LocalClock::System => utc.with_timezone(&Local).hour(),
        LocalClock::Fixed(offset) => utc.with_timezone(offset).hour(),
    };
    Some(hour)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn known_date_decomposes_exactly() {
        let d = parse_yyyymmdd("20170815").unwrap();
        let parts = DateParts::from(d);
        // 2017-08-15 is a Tuesday
        assert_eq!(parts.weekday, 1);
        assert_eq!(parts.month, 8);
        assert_eq!(parts.quarter_month, 1);
        assert_eq!(parts.week_of_year, 33);
    }

    #[test]
    fn iso_week_wraps_at_year_start() {
        // 2016-01-01 belongs to ISO week 53 of 2015
        let parts = DateParts::from(parse_yyyymmdd("20160101").unwrap());
        assert_eq!(parts.week_of_year, 53);
        assert_eq!(parts.weekday, 4);
        assert_eq!(parts.quarter_month, 0);
    }

    #[test]
    fn quarter_month_buckets() {
        let bucket = |s| DateParts::from(parse_yyyymmdd(s).unwrap()).quarter_month;
        assert_eq!(bucket("20170807"), 0);
        assert_eq!(bucket("20170808"), 1);
        assert_eq!(bucket("20170816"), 2);
        assert_eq!(bucket("20170831"), 3);
    }

    #[test]
    fn rejects_malformed_dates() {
        assert!(parse_yyyymmdd("2017081").is_none());
        assert!(parse_yyyymmdd("2017-08-15").is_none());
        assert!(parse_yyyymmdd("20171301").is_none());
        assert!(parse_yyyymmdd("20170230").is_none());
        assert!(parse_yyyymmdd("").is_none());
    }

    #[test]
    fn hour_follows_fixed_offset() {
        // 2017-08-15T00:00:00Z
        let ts = 1_502_755_200;
        let utc = LocalClock::Fixed(FixedOffset::east_opt(0).unwrap());
        let aest = LocalClock::Fixed(FixedOffset::east_opt(10 * 3600).unwrap());
        let pdt = LocalClock::Fixed(FixedOffset::west_opt(7 * 3600).unwrap());
        assert_eq!(local_hour(ts, &utc), Some(0));
        assert_eq!(local_hour(ts + 3 * 3600 + 59, &utc), Some(3));
        assert_eq!(local_hour(ts, &aest), Some(10));
        assert_eq!(local_hour(ts, &pdt), Some(17));
    }

    #[test]
    fn hour_rejects_out_of_range_epoch() {
        assert_eq!(local_hour(i64::MAX, &LocalClock::System), None);
    }
}

//! Packed date and time values.
//!
//! WebUntis encodes calendar dates as `YYYYMMDD` integers and times of day as
//! `HHMM` integers, so `845` means 08:45 and `20191022` means 22 October
//! 2019. This module turns them into chrono values and rejects anything that
//! is not a real date or time of day.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Error returned when a packed value is not a valid date or time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid packed {what}: {value}")]
pub struct TimeError {
    what: &'static str,
    value: i64,
}

impl TimeError {
    fn new(what: &'static str, value: i64) -> Self {
        Self { what, value }
    }
}

/// `HHMM` value some schools use for a span ending at midnight.
const END_OF_DAY: i64 = 2400;

/// Decode an `HHMM` integer into a time of day.
///
/// # Examples
///
/// ```
/// use chrono::NaiveTime;
/// use untis_client::domain::decode_hhmm;
///
/// assert_eq!(decode_hhmm(845).unwrap(), NaiveTime::from_hms_opt(8, 45, 0).unwrap());
/// assert_eq!(decode_hhmm(0).unwrap(), NaiveTime::from_hms_opt(0, 0, 0).unwrap());
///
/// // Minutes past 59 and hours past 23 are rejected
/// assert!(decode_hhmm(860).is_err());
/// assert!(decode_hhmm(2400).is_err());
/// assert!(decode_hhmm(-5).is_err());
/// ```
pub fn decode_hhmm(value: i64) -> Result<NaiveTime, TimeError> {
    if !(0..=2359).contains(&value) {
        return Err(TimeError::new("time", value));
    }

    let hour = (value / 100) as u32;
    let minute = (value % 100) as u32;

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or(TimeError::new("time", value))
}

/// Decode a `YYYYMMDD` integer into a calendar date.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use untis_client::domain::decode_yyyymmdd;
///
/// assert_eq!(
///     decode_yyyymmdd(20191022).unwrap(),
///     NaiveDate::from_ymd_opt(2019, 10, 22).unwrap()
/// );
/// assert!(decode_yyyymmdd(20190230).is_err());
/// ```
pub fn decode_yyyymmdd(value: i64) -> Result<NaiveDate, TimeError> {
    if !(1_00_01..=9999_12_31).contains(&value) {
        return Err(TimeError::new("date", value));
    }

    let year = (value / 10_000) as i32;
    let month = (value / 100 % 100) as u32;
    let day = (value % 100) as u32;

    NaiveDate::from_ymd_opt(year, month, day).ok_or(TimeError::new("date", value))
}

/// Combine a packed date and a packed time into one timestamp.
pub fn decode_datetime(date: i64, time: i64) -> Result<NaiveDateTime, TimeError> {
    Ok(decode_yyyymmdd(date)?.and_time(decode_hhmm(time)?))
}

/// Like [`decode_datetime`], for the end of a time span: `2400` is accepted
/// and means midnight at the start of the following day. Minutes past 59
/// are still rejected.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use untis_client::domain::decode_end_datetime;
///
/// let midnight = NaiveDate::from_ymd_opt(2019, 10, 23).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// assert_eq!(decode_end_datetime(20191022, 2400).unwrap(), midnight);
/// assert!(decode_end_datetime(20191022, 2401).is_err());
/// ```
pub fn decode_end_datetime(date: i64, time: i64) -> Result<NaiveDateTime, TimeError> {
    if time != END_OF_DAY {
        return decode_datetime(date, time);
    }

    decode_yyyymmdd(date)?
        .succ_opt()
        .map(|next| next.and_time(NaiveTime::MIN))
        .ok_or(TimeError::new("date", date))
}

/// Format a date the way the web API expects it in query strings.
pub fn query_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

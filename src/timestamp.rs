//! Header timestamps.
//!
//! Outgoing messages carry the BSD style `Mmm dd hh:mm:ss` local time. On the
//! receiving side a header may start with that form or with a single RFC3339
//! token; the scanners here only report how long the timestamp is so the
//! codec can keep the original text verbatim.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use thiserror::Error;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("timestamp too short")]
    TooShort,
    #[error("invalid character in digit position")]
    InvalidDigit,
    #[error("invalid date/time separator")]
    InvalidCharDateTimeSep,
    #[error("invalid time separator")]
    InvalidCharTimeSep,
    #[error("month out of range")]
    OutOfRangeMonth,
    #[error("day out of range")]
    OutOfRangeDay,
    #[error("hour out of range")]
    OutOfRangeHour,
    #[error("minute out of range")]
    OutOfRangeMinute,
    #[error("second out of range")]
    OutOfRangeSecond,
    #[error("second fraction missing")]
    SecondFractionMissing,
    #[error("second fraction too long")]
    SecondFractionTooLong,
    #[error("invalid timezone sign")]
    InvalidCharTzSign,
    #[error("timezone out of range")]
    OutOfRangeTimezone,
    #[error("extra characters after timestamp")]
    ExtraCharacters,
}

// get a character from the bytes as as a decimal
macro_rules! get_digit {
    ($bytes:ident, $index:expr, $error:ident) => {
        match $bytes.get($index) {
            Some(c) if c.is_ascii_digit() => u32::from(c - b'0'),
            _ => return Err(TimestampError::$error),
        }
    };
}

fn two_digits(buf: &[u8], at: usize) -> Result<u32, TimestampError> {
    let tens = get_digit!(buf, at, InvalidDigit);
    let ones = get_digit!(buf, at + 1, InvalidDigit);
    Ok(tens * 10 + ones)
}

/// Render `at` the way outgoing headers carry it, e.g. `Oct  5 09:03:07`.
pub fn format_rfc3164<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    at.format("%b %e %H:%M:%S").to_string()
}

/// Length in bytes of a leading `Mmm dd hh:mm:ss` timestamp, if `input` starts
/// with one. The day may be one or two digits and may be padded with an extra
/// space.
pub(crate) fn rfc3164_len(input: &str) -> Option<usize> {
    let buf = input.as_bytes();
    let month = buf.get(..3)?;
    if !MONTHS.iter().any(|m| m.as_bytes() == month) {
        return None;
    }

    let mut pos = 3;
    if buf.get(pos) != Some(&b' ') {
        return None;
    }
    pos += 1;
    if buf.get(pos) == Some(&b' ') {
        pos += 1;
    }

    let mut day = match buf.get(pos) {
        Some(c) if c.is_ascii_digit() => u32::from(c - b'0'),
        _ => return None,
    };
    pos += 1;
    if let Some(c) = buf.get(pos).filter(|c| c.is_ascii_digit()) {
        day = day * 10 + u32::from(c - b'0');
        pos += 1;
    }
    if !(1..=31).contains(&day) || buf.get(pos) != Some(&b' ') {
        return None;
    }
    pos += 1;

    let hour = two_digits(buf, pos).ok()?;
    if buf.get(pos + 2) != Some(&b':') {
        return None;
    }
    let minute = two_digits(buf, pos + 3).ok()?;
    if buf.get(pos + 5) != Some(&b':') {
        return None;
    }
    let second = two_digits(buf, pos + 6).ok()?;
    if hour > 23 || minute > 59 || second > 60 {
        return None;
    }

    Some(pos + 8)
}

/// Length in bytes of a leading RFC3339 token, if the first space-delimited
/// word of `input` is one.
pub(crate) fn rfc3339_len(input: &str) -> Option<usize> {
    let token = input.split(' ').next()?;
    parse_timestamp_rfc3339(token.as_bytes())
        .ok()
        .map(|_| token.len())
}

pub fn parse_timestamp_rfc3339(buf: &[u8]) -> Result<DateTime<FixedOffset>, TimestampError> {
    // First up, parse the full date if we can
    let (year, month, day) = parse_date(buf)?;

    // Next parse the separator between date and time
    let sep = buf.get(10).copied();
    if sep != Some(b'T') && sep != Some(b't') && sep != Some(b'_') {
        return Err(TimestampError::InvalidCharDateTimeSep);
    }

    // Next try to parse the time
    let (hour, minute, second, nanosecond, offset) = parse_time(buf, 11)?;

    let offset =
        FixedOffset::east_opt(offset.unwrap_or(0)).ok_or(TimestampError::OutOfRangeTimezone)?;
    let datetime = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(TimestampError::OutOfRangeDay)?
        .and_hms_nano_opt(hour, minute, second, nanosecond)
        .ok_or(TimestampError::OutOfRangeSecond)?;

    offset
        .from_local_datetime(&datetime)
        .single()
        .ok_or(TimestampError::OutOfRangeTimezone)
}

fn parse_date(buf: &[u8]) -> Result<(i32, u32, u32), TimestampError> {
    if buf.len() < 10 {
        return Err(TimestampError::TooShort);
    }

    let year = (two_digits(buf, 0)? * 100 + two_digits(buf, 2)?) as i32;
    if buf[4] != b'-' {
        return Err(TimestampError::InvalidCharDateTimeSep);
    }
    let month = two_digits(buf, 5)?;
    if buf[7] != b'-' {
        return Err(TimestampError::InvalidCharDateTimeSep);
    }
    let day = two_digits(buf, 8)?;

    // calculate the maximum number of days in the month, accounting for leap years in the
    // gregorian calendar
    let max_days = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) {
                29
            } else {
                28
            }
        }
        _ => return Err(TimestampError::OutOfRangeMonth),
    };

    if day < 1 || day > max_days {
        return Err(TimestampError::OutOfRangeDay);
    }

    Ok((year, month, day))
}

/// Parse a time from bytes with a starting index, extra characters
/// at the end of the string result in an error
fn parse_time(
    buf: &[u8],
    offset: usize,
) -> Result<(u32, u32, u32, u32, Option<i32>), TimestampError> {
    let (hour, minute, second, nanosecond, mut position) =
        parse_time_without_timezone(buf, offset)?;

    let mut tz_offset: Option<i32> = None;

    if let Some(next_char) = buf.get(position).copied() {
        position += 1;
        if next_char == b'Z' || next_char == b'z' {
            tz_offset = Some(0);
        } else {
            let sign = match next_char {
                b'+' => 1,
                b'-' => -1,
                _ => return Err(TimestampError::InvalidCharTzSign),
            };

            let hours = two_digits(buf, position)? as i32;
            position += 2;
            if buf.get(position) == Some(&b':') {
                position += 1;
            }
            let minutes = two_digits(buf, position)? as i32;
            position += 2;

            if minutes >= 60 {
                return Err(TimestampError::OutOfRangeTimezone);
            }
            let offset_val = sign * (hours * 3600 + minutes * 60);
            if offset_val.abs() >= 24 * 3600 {
                return Err(TimestampError::OutOfRangeTimezone);
            }
            tz_offset = Some(offset_val);
        }
    }

    if buf.len() > position {
        return Err(TimestampError::ExtraCharacters);
    }

    Ok((hour, minute, second, nanosecond, tz_offset))
}

/// Parse time
///     * Hour: 0 to 23
///     * Minute: 0 to 59
///     * Second: 0 to 59
///     * NanoSecond: 0 to 999999999
///     * Position: position of the cursor after parsing
fn parse_time_without_timezone(
    buf: &[u8],
    offset: usize,
) -> Result<(u32, u32, u32, u32, usize), TimestampError> {
    if buf.len() < offset + 5 {
        return Err(TimestampError::TooShort);
    }

    let hour = two_digits(buf, offset)?;
    if hour > 23 {
        return Err(TimestampError::OutOfRangeHour);
    }
    if buf[offset + 2] != b':' {
        return Err(TimestampError::InvalidCharTimeSep);
    }

    let minute = two_digits(buf, offset + 3)?;
    if minute > 59 {
        return Err(TimestampError::OutOfRangeMinute);
    }

    let mut length: usize = 5;
    let (second, nano_second) = match buf.get(offset + 5) {
        Some(b':') => {
            let second = two_digits(buf, offset + 6)?;
            if second > 59 {
                return Err(TimestampError::OutOfRangeSecond);
            }
            length = 8;

            let mut nano_second = 0;
            let frac_sep = buf.get(offset + 8).copied();
            if frac_sep == Some(b'.') || frac_sep == Some(b',') {
                length = 9;
                let mut i: usize = 0;
                while let Some(c) = buf.get(offset + length + i).filter(|c| c.is_ascii_digit()) {
                    if i == 9 {
                        return Err(TimestampError::SecondFractionTooLong);
                    }
                    nano_second = nano_second * 10 + u32::from(c - b'0');
                    i += 1;
                }
                if i == 0 {
                    return Err(TimestampError::SecondFractionMissing);
                }
                nano_second *= 10_u32.pow(9 - i as u32);
                length += i;
            }

            (second, nano_second)
        }
        _ => (0, 0),
    };

    Ok((hour, minute, second, nano_second, offset + length))
}

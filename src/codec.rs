//! Wire format: `<PRI>TIMESTAMP HOSTNAME[ APP:] MESSAGE`.
//!
//! Both directions are total. [`build`] only touches the outside world to read
//! the clock when the message has no timestamp, and [`parse`] degrades
//! malformed input to default field values instead of failing.

use std::fmt::Write;

use chrono::{DateTime, TimeZone};

use crate::message::SyslogMessage;
use crate::severity::Severity;
use crate::timestamp;

const DEFAULT_HOSTNAME: &str = "localhost";

/// Longest priority we accept, in digits. `u32::MAX * 8 + 7` has 11.
const MAX_PRI_DIGITS: usize = 11;

/// Longest application tag recognised in front of the body.
const MAX_TAG_LEN: usize = 48;

/// Serialize `message` for the wire, stamping it with the local time if it has
/// no timestamp of its own. No line delimiter is appended.
///
/// # Example
///
/// ```
/// use syslogkit::{codec, Facility, Severity, SyslogMessage};
///
/// let msg = SyslogMessage::new(Facility::USER, Severity::INFO, "hello")
///     .with_timestamp("Jan  1 00:00:00")
///     .with_hostname("web1")
///     .with_app_name("nginx");
///
/// assert_eq!(codec::build(&msg), "<14>Jan  1 00:00:00 web1 nginx: hello");
/// ```
pub fn build(message: &SyslogMessage) -> String {
    build_at(message, &chrono::Local::now())
}

/// [`build`] with an explicit clock.
pub fn build_at<Tz>(message: &SyslogMessage, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::with_capacity(32 + message.message().len());

    // writing into a String cannot fail
    let _ = write!(out, "<{}>", message.priority());

    if message.timestamp().is_empty() {
        out.push_str(&timestamp::format_rfc3164(now));
    } else {
        out.push_str(message.timestamp());
    }
    out.push(' ');

    if message.hostname().is_empty() {
        out.push_str(DEFAULT_HOSTNAME);
    } else {
        out.push_str(message.hostname());
    }
    out.push(' ');

    if !message.app_name().is_empty() {
        out.push_str(message.app_name());
        out.push_str(": ");
    }

    out.push_str(message.message());
    out
}

/// Decode raw bytes received from the wire.
///
/// A header that starts with a BSD or RFC3339 timestamp is split into
/// timestamp, hostname and optional `APP:` tag. Anything else falls back to
/// skipping three space separated header words plus one more word, with
/// timestamp, hostname and app name left empty.
pub fn parse(raw: &[u8]) -> SyslogMessage {
    let text = String::from_utf8_lossy(raw);

    let (pri, rest) =
        parse_pri(&text).unwrap_or((SyslogMessage::default().priority(), &*text));
    let facility = (pri / 8) as u32;
    let severity = Severity::from_priority(pri);

    match split_header(rest) {
        Some(header) => SyslogMessage::new(facility, severity, header.body)
            .with_timestamp(header.timestamp)
            .with_hostname(header.hostname)
            .with_app_name(header.app_name),
        None => SyslogMessage::new(facility, severity, legacy_body(rest)),
    }
}

/// `<digits>` at the very start of the input.
fn parse_pri(input: &str) -> Option<(u64, &str)> {
    let rest = input.strip_prefix('<')?;
    let end = rest.find('>')?;
    let digits = &rest[..end];
    if digits.is_empty()
        || digits.len() > MAX_PRI_DIGITS
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let pri: u64 = digits.parse().ok()?;
    if pri / 8 > u64::from(u32::MAX) {
        return None;
    }
    Some((pri, &rest[end + 1..]))
}

struct Header<'a> {
    timestamp: &'a str,
    hostname: &'a str,
    app_name: &'a str,
    body: &'a str,
}

fn split_header(input: &str) -> Option<Header<'_>> {
    let ts_len = timestamp::rfc3164_len(input).or_else(|| timestamp::rfc3339_len(input))?;
    let (ts, rest) = input.split_at(ts_len);
    let rest = rest.strip_prefix(' ').unwrap_or(rest);

    let (hostname, body) = match rest.split_once(' ') {
        Some((hostname, body)) => (hostname, body),
        None => ("", rest),
    };

    let (app_name, body) = match split_tag(body) {
        Some((tag, body)) => (tag, body),
        None => ("", body),
    };

    Some(Header {
        timestamp: ts,
        hostname,
        app_name,
        body,
    })
}

/// `APP: body`, where APP looks like a syslog tag.
fn split_tag(body: &str) -> Option<(&str, &str)> {
    let colon = body.find(':')?;
    let tag = &body[..colon];
    if tag.is_empty()
        || tag.len() > MAX_TAG_LEN
        || !tag
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"_.-/[]".contains(&b))
    {
        return None;
    }

    let after = &body[colon + 1..];
    if after.is_empty() {
        return Some((tag, after));
    }
    after.strip_prefix(' ').map(|rest| (tag, rest))
}

/// Skip three spaces, then up to the next space; whatever follows is the body.
fn legacy_body(input: &str) -> &str {
    let mut start = 0;
    for (seen, (idx, _)) in input.match_indices(' ').enumerate() {
        if seen == 3 {
            break;
        }
        start = idx + 1;
    }

    match input[start..].find(' ') {
        Some(space) => &input[start + space + 1..],
        None => &input[start..],
    }
}

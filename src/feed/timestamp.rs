//! Publication date normalization.
//!
//! RSS `pubDate` values in the wild are mostly RFC 2822, but plenty of feeds
//! emit RFC 3339 or a long-form variant instead. [`normalize`] tries a fixed
//! chain of layouts and returns the first instant that parses.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use thiserror::Error;

/// No known layout matched the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not parse time: {0:?}")]
pub struct TimeParseError(pub String);

/// Timestamp layouts, tried in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `Mon, 02 Jan 2006 15:04:05 -0700`
    Rfc1123Numeric,
    /// `Mon, 02 Jan 2006 15:04:05 GMT`
    Rfc1123Named,
    /// `2006-01-02T15:04:05.999+07:00`
    Rfc3339,
    /// `2006-01-02T15:04:05Z`
    ///
    /// [`Layout::Rfc3339`] already accepts these strings, so in [`LAYOUTS`]
    /// this is only a last-resort zulu layout kept in its place in the chain.
    IsoZulu,
    /// `Monday, 02 January 2006 15:04:05 -0700`
    Verbose,
}

pub const LAYOUTS: [Layout; 5] = [
    Layout::Rfc1123Numeric,
    Layout::Rfc1123Named,
    Layout::Rfc3339,
    Layout::IsoZulu,
    Layout::Verbose,
];

impl Layout {
    /// Parse `s` with this layout only.
    pub fn parse(self, s: &str) -> Option<DateTime<Utc>> {
        match self {
            Layout::Rfc1123Numeric => {
                DateTime::parse_from_str(s, "%a, %d %b %Y %H:%M:%S %z")
                    .ok()
                    .map(to_utc)
            }
            Layout::Rfc1123Named => parse_named_zone(s),
            Layout::Rfc3339 => DateTime::parse_from_rfc3339(s).ok().map(to_utc),
            Layout::IsoZulu => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ")
                .ok()
                .map(|naive| naive.and_utc()),
            Layout::Verbose => DateTime::parse_from_str(s, "%A, %d %B %Y %H:%M:%S %z")
                .ok()
                .map(to_utc),
        }
    }
}

/// Convert a feed timestamp into a UTC instant.
///
/// Surrounding whitespace is ignored. Never panics.
pub fn normalize(raw: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(TimeParseError(raw.to_string()));
    }

    LAYOUTS
        .iter()
        .find_map(|layout| layout.parse(s))
        .ok_or_else(|| TimeParseError(raw.to_string()))
}

fn to_utc(dt: DateTime<FixedOffset>) -> DateTime<Utc> {
    dt.with_timezone(&Utc)
}

/// RFC 2822 zone names carry their offset; any other alphabetic
/// abbreviation (`CET`, `JST`, ...) is read as UTC.
fn parse_named_zone(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(to_utc(dt));
    }

    let (head, zone) = s.rsplit_once(' ')?;
    if zone.is_empty() || !zone.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    NaiveDateTime::parse_from_str(head, "%a, %d %b %Y %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

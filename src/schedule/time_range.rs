//! Time-slot labels such as `"1:00-2:30pm"` or `"1300-1430"`

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(?:-|–|—|\bto\b)\s*").unwrap());
static MERIDIEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(a\.?m\.?|p\.?m\.?)\s*$").unwrap());
static CLOCK_BODY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\d:.\s]+$").unwrap());

const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

/// A start/end pair in minutes since midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    pub start: u16,
    pub end: u16,
}

impl TimeRange {
    /// Minutes from start to end, wrapping past midnight when end < start
    pub fn duration_minutes(&self) -> u16 {
        if self.end >= self.start {
            self.end - self.start
        } else {
            self.end + MINUTES_PER_DAY - self.start
        }
    }

    /// Zero-padded 24h `HH:MM` start
    pub fn start_label(&self) -> String {
        format_minutes(self.start)
    }

    /// Zero-padded 24h `HH:MM` end
    pub fn end_label(&self) -> String {
        format_minutes(self.end)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_label(), self.end_label())
    }
}

fn format_minutes(minutes: u16) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Splits a token into its clock part and an optional am/pm marker
fn split_meridiem(token: &str) -> (&str, Option<Meridiem>) {
    match MERIDIEM.captures(token) {
        Some(caps) => {
            let marker = if caps[1].to_lowercase().starts_with('p') {
                Meridiem::Pm
            } else {
                Meridiem::Am
            };
            let cut = caps.get(0).map(|m| m.start()).unwrap_or(token.len());
            (token[..cut].trim(), Some(marker))
        }
        None => (token.trim(), None),
    }
}

/// Reads a clock token positionally from its digits
///
/// 1-2 digits are an hour, 3 digits are H+MM, 4 or more are HH+MM.
fn parse_clock(body: &str, marker: Option<Meridiem>) -> Option<u16> {
    if !CLOCK_BODY.is_match(body) {
        return None;
    }
    let digits: Vec<u16> = body
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| d as u16)
        .collect();

    let (hour, minute) = match digits.len() {
        0 => return None,
        1 => (digits[0], 0),
        2 => (digits[0] * 10 + digits[1], 0),
        3 => (digits[0], digits[1] * 10 + digits[2]),
        _ => (digits[0] * 10 + digits[1], digits[2] * 10 + digits[3]),
    };

    if minute > 59 {
        return None;
    }

    let hour = match marker {
        None if hour <= 23 => hour,
        Some(_) if hour == 0 || hour > 12 => return None,
        Some(Meridiem::Am) if hour == 12 => 0,
        Some(Meridiem::Am) => hour,
        Some(Meridiem::Pm) if hour < 12 => hour + 12,
        Some(Meridiem::Pm) => hour,
        None => return None,
    };

    Some(hour * 60 + minute)
}

/// Parses a slot label into a 24h range
///
/// The end token's am/pm marker is carried over to the start token when the
/// start has none, so `"1:00-2:30pm"` reads as 13:00-14:30.
///
/// # Returns
///
/// `None` when the label is not exactly two clock tokens around a separator
///
/// # Example
///
/// ```
/// use campus_harvest::schedule::parse_time_range;
///
/// let range = parse_time_range("1:00-2:30pm").unwrap();
/// assert_eq!(range.to_string(), "13:00-14:30");
/// assert_eq!(range.duration_minutes(), 90);
/// ```
pub fn parse_time_range(label: &str) -> Option<TimeRange> {
    let label = label.trim();
    let parts: Vec<&str> = SEPARATOR.split(label).collect();
    if parts.len() != 2 || parts.iter().any(|p| p.trim().is_empty()) {
        return None;
    }

    let (start_body, start_marker) = split_meridiem(parts[0]);
    let (end_body, end_marker) = split_meridiem(parts[1]);
    let start_marker = start_marker.or(end_marker);

    Some(TimeRange {
        start: parse_clock(start_body, start_marker)?,
        end: parse_clock(end_body, end_marker)?,
    })
}

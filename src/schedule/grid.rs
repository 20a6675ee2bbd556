//! Weekly grid detection and event assembly

use crate::extract::{single_line, ExtractedTable};
use crate::schedule::days::DayKey;
use crate::schedule::entry::{parse_entry, split_cell_entries};
use crate::schedule::time_range::{parse_time_range, TimeRange};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static TIME_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:time|hours?|period|slot)s?\b").unwrap());

/// A day column, in the order the grid shows it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleDay {
    pub key: DayKey,
    pub label: String,
}

/// One class meeting placed on the week
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEvent {
    pub day_key: DayKey,
    pub day_label: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: u16,
    pub course_code: String,
    pub section: Option<String>,
    pub course_title: Option<String>,
    pub mode: Option<String>,
    pub room: Option<String>,
    pub instructor: Option<String>,
    pub details: Vec<String>,
    pub raw: String,
}

/// A grid row: one time slot with the events of every day column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub label: String,
    pub start_time: String,
    pub end_time: String,
    pub events_by_day: BTreeMap<DayKey, Vec<ScheduleEvent>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySchedule {
    pub days: Vec<ScheduleDay>,
    pub slots: Vec<TimeSlot>,
    /// Sorted by day column position, then start time
    pub events: Vec<ScheduleEvent>,
    /// Set by the scraper when the page is captured; never by the parser
    pub generated_at: Option<DateTime<Utc>>,
}

/// True if at least half of the label's visible characters are digits
fn is_numeric_heavy(label: &str) -> bool {
    let visible: Vec<char> = label.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = visible.iter().filter(|c| c.is_ascii_digit()).count();
    !visible.is_empty() && digits * 2 >= visible.len()
}

fn first_column_is_time(table: &ExtractedTable) -> bool {
    let first = table.headers[0].trim();
    if TIME_HEADER.is_match(first) || is_numeric_heavy(first) {
        return true;
    }
    if !first.is_empty() {
        return false;
    }
    let parsed = table
        .rows
        .iter()
        .filter(|row| {
            row.first()
                .is_some_and(|cell| parse_time_range(&single_line(cell)).is_some())
        })
        .count();
    parsed * 2 >= table.rows.len()
}

/// Returns the (column index, day) pairs of a grid table, or None if the
/// table is not a weekly grid
fn grid_columns(table: &ExtractedTable) -> Option<Vec<(usize, DayKey)>> {
    if table.headers.len() < 2 || !first_column_is_time(table) {
        return None;
    }
    let columns: Vec<(usize, DayKey)> = table
        .headers
        .iter()
        .enumerate()
        .skip(1)
        .filter_map(|(idx, header)| DayKey::resolve(header).map(|day| (idx, day)))
        .collect();
    if columns.is_empty() {
        None
    } else {
        Some(columns)
    }
}

fn build_event(day: DayKey, range: &TimeRange, block: &str) -> ScheduleEvent {
    let entry = parse_entry(block);
    ScheduleEvent {
        day_key: day,
        day_label: day.label().to_string(),
        start_time: range.start_label(),
        end_time: range.end_label(),
        duration_minutes: range.duration_minutes(),
        course_code: entry.course_code,
        section: entry.section,
        course_title: entry.course_title,
        mode: entry.mode,
        room: entry.room,
        instructor: entry.instructor,
        details: entry.details,
        raw: entry.raw,
    }
}

/// Parses a located grid table into a schedule
fn parse_grid(table: &ExtractedTable, columns: &[(usize, DayKey)]) -> WeeklySchedule {
    let days = columns
        .iter()
        .map(|(_, day)| ScheduleDay {
            key: *day,
            label: day.label().to_string(),
        })
        .collect();

    let mut slots = Vec::new();
    let mut events = Vec::new();

    for row in &table.rows {
        let label = row.first().map(|c| single_line(c)).unwrap_or_default();
        let Some(range) = parse_time_range(&label) else {
            tracing::debug!("Skipping grid row with unparseable time '{}'", label);
            continue;
        };

        let mut events_by_day: BTreeMap<DayKey, Vec<ScheduleEvent>> = BTreeMap::new();
        for (idx, day) in columns {
            let Some(cell) = row.get(*idx) else { continue };
            for block in split_cell_entries(cell) {
                let event = build_event(*day, &range, &block);
                events.push(event.clone());
                events_by_day.entry(*day).or_default().push(event);
            }
        }

        slots.push(TimeSlot {
            label,
            start_time: range.start_label(),
            end_time: range.end_label(),
            events_by_day,
        });
    }

    // Stable sort keeps row order for equal keys
    let position = |day: DayKey| {
        columns
            .iter()
            .position(|(_, d)| *d == day)
            .unwrap_or(usize::MAX)
    };
    events.sort_by(|a, b| {
        position(a.day_key)
            .cmp(&position(b.day_key))
            .then_with(|| a.start_time.cmp(&b.start_time))
    });

    WeeklySchedule {
        days,
        slots,
        events,
        generated_at: None,
    }
}

/// Finds the first weekly grid among the tables and parses it
///
/// Returns `None` when no table qualifies; that is not an error.
pub fn build_weekly_schedule(tables: &[ExtractedTable]) -> Option<WeeklySchedule> {
    tables.iter().find_map(|table| {
        let columns = grid_columns(table)?;
        Some(parse_grid(table, &columns))
    })
}

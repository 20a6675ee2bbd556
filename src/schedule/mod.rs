//! Weekly class schedule parsing
//!
//! The pipeline is layered: locate the grid table among the extracted tables,
//! parse each time-slot row, split stacked cell entries, parse each entry and
//! finally sort the events by day column and start time. Everything here is a
//! pure function of the input tables.

mod days;
mod entry;
mod grid;
mod time_range;

pub use days::DayKey;
pub use entry::{parse_entry, split_cell_entries, ParsedEntry};
pub use grid::{build_weekly_schedule, ScheduleDay, ScheduleEvent, TimeSlot, WeeklySchedule};
pub use time_range::{parse_time_range, TimeRange};

//! Display view of one dataset
//!
//! Page captures are shown as their cleaned tables (or the weekly grid for
//! the class schedule); record datasets are shown as their record array.

use crate::datasets::{DatasetKey, DatasetPayload};
use crate::extract::{sanitize_tables_for_dataset, ExtractedTable, NavFilter};
use crate::schedule::WeeklySchedule;
use crate::state::ScrapeState;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AggregatedView {
    Tables(Vec<ExtractedTable>),
    Schedule(WeeklySchedule),
    Records(serde_json::Value),
}

impl AggregatedView {
    /// Rows or events in the view
    pub fn len(&self) -> usize {
        match self {
            Self::Tables(tables) => tables.iter().map(|t| t.total_rows).sum(),
            Self::Schedule(schedule) => schedule.events.len(),
            Self::Records(serde_json::Value::Array(items)) => items.len(),
            Self::Records(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn records_value<T: Serialize>(records: &[T]) -> serde_json::Value {
    serde_json::to_value(records).unwrap_or_else(|e| {
        tracing::warn!("Failed to serialize records: {}", e);
        serde_json::Value::Array(Vec::new())
    })
}

/// Builds the display view of `key`, or `None` if it was never scraped
pub fn aggregate_dataset(
    state: &ScrapeState,
    key: DatasetKey,
    filter: &NavFilter,
) -> Option<AggregatedView> {
    let view = match state.payload(key)? {
        DatasetPayload::ClassOfferings(rows) => AggregatedView::Records(records_value(rows)),
        DatasetPayload::Curriculum(rows) => AggregatedView::Records(records_value(rows)),
        DatasetPayload::Grades(rows) => AggregatedView::Records(records_value(rows)),
        DatasetPayload::Page(page) => match &page.weekly_schedule {
            Some(schedule) if !schedule.events.is_empty() => {
                AggregatedView::Schedule(schedule.clone())
            }
            _ => AggregatedView::Tables(sanitize_tables_for_dataset(&page.tables, filter)),
        },
    };
    Some(view)
}

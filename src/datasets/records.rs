//! Typed records and dataset payloads stored in the scrape state

use crate::extract::ExtractedTable;
use crate::schedule::WeeklySchedule;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the schedule of classes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassOffering {
    pub department: String,
    pub subject_code: String,
    pub section: String,
    pub course_title: String,
    pub units: String,
    pub time: String,
    pub room: String,
    pub instructor: String,
    pub max_no: String,
    pub lang: String,
    pub level: String,
    pub free_slots: String,
    pub remarks: String,
    pub s: String,
    pub p: String,
}

/// One course of an official curriculum
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumEntry {
    pub degree_program: String,
    pub degree_code: String,
    /// Year/semester banner of the table the course was listed under
    pub term: Option<String>,
    pub cat_no: String,
    pub course_title: String,
    pub units: String,
    pub prerequisites: String,
    pub category: String,
}

/// One graded course
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    pub school_year: String,
    pub semester: String,
    pub program: String,
    pub course_code: String,
    pub course_title: String,
    pub units: String,
    pub grade: String,
}

/// Table-centric capture of a single report page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePayload {
    /// Raw markup, cut at the snapshot limit
    pub html: String,
    /// Flattened page text
    pub text: String,
    pub tables: Vec<ExtractedTable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_schedule: Option<WeeklySchedule>,
    pub captured_at: DateTime<Utc>,
}

/// What a dataset stores in `scrapedData`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum DatasetPayload {
    ClassOfferings(Vec<ClassOffering>),
    Curriculum(Vec<CurriculumEntry>),
    Grades(Vec<GradeRecord>),
    Page(PagePayload),
}

impl DatasetPayload {
    /// Number of records (or table rows for page captures)
    pub fn item_count(&self) -> usize {
        match self {
            Self::ClassOfferings(rows) => rows.len(),
            Self::Curriculum(rows) => rows.len(),
            Self::Grades(rows) => rows.len(),
            Self::Page(page) => page.tables.iter().map(|t| t.total_rows).sum(),
        }
    }
}

/// A record produced by a paginated catalog
///
/// The sub-item key identifies the drop-down option the record came from,
/// which is what resume uses to prune rows of a re-fetched sub-item.
pub trait CatalogRecord: Clone + Sized {
    fn sub_item_key(&self) -> &str;

    /// Borrows this record type's list out of a payload of the same kind
    fn records_mut(payload: &mut DatasetPayload) -> Option<&mut Vec<Self>>;

    fn into_payload(records: Vec<Self>) -> DatasetPayload;
}

impl CatalogRecord for ClassOffering {
    fn sub_item_key(&self) -> &str {
        &self.department
    }

    fn records_mut(payload: &mut DatasetPayload) -> Option<&mut Vec<Self>> {
        match payload {
            DatasetPayload::ClassOfferings(rows) => Some(rows),
            _ => None,
        }
    }

    fn into_payload(records: Vec<Self>) -> DatasetPayload {
        DatasetPayload::ClassOfferings(records)
    }
}

impl CatalogRecord for CurriculumEntry {
    fn sub_item_key(&self) -> &str {
        &self.degree_code
    }

    fn records_mut(payload: &mut DatasetPayload) -> Option<&mut Vec<Self>> {
        match payload {
            DatasetPayload::Curriculum(rows) => Some(rows),
            _ => None,
        }
    }

    fn into_payload(records: Vec<Self>) -> DatasetPayload {
        DatasetPayload::Curriculum(records)
    }
}

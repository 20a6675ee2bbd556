//! Schedule of classes, one department at a time

use crate::datasets::catalog::{header_position, keyed_tables, CatalogIndex, CatalogSource};
use crate::datasets::records::ClassOffering;
use crate::datasets::DatasetKey;
use crate::extract::{
    find_named_select_options, selected_option_value, single_line, SelectOption,
};
use crate::{HarvestError, Result};
use std::collections::BTreeMap;

const DEPARTMENT_FIELD: &str = "deptCode";
const PERIOD_FIELD: &str = "applicablePeriod";
const HEADER_PHRASE: &str = "Subject Code";
const MIN_CELLS: usize = 7;

#[derive(Debug, Clone, Copy, Default)]
pub struct ClassOfferingsSource;

impl CatalogSource for ClassOfferingsSource {
    type Record = ClassOffering;

    fn key(&self) -> DatasetKey {
        DatasetKey::ScheduleOfClasses
    }

    fn step_prefix(&self) -> &'static str {
        "schedule"
    }

    fn item_noun(&self) -> &'static str {
        "department"
    }

    fn parse_index(&self, html: &str) -> Result<CatalogIndex> {
        let departments: Vec<SelectOption> = find_named_select_options(html, DEPARTMENT_FIELD)
            .into_iter()
            .filter(|opt| !opt.value.is_empty() && opt.value != "ALL")
            .collect();
        if departments.is_empty() {
            return Err(HarvestError::Parse {
                context: "scheduleOfClasses".to_string(),
                message: "could not find the department drop-down".to_string(),
            });
        }

        // The selected term, else the first one listed
        let period = selected_option_value(html, PERIOD_FIELD)
            .or_else(|| {
                find_named_select_options(html, PERIOD_FIELD)
                    .into_iter()
                    .next()
                    .map(|opt| opt.value)
            })
            .ok_or_else(|| HarvestError::Parse {
                context: "scheduleOfClasses".to_string(),
                message: "could not find the applicable period".to_string(),
            })?;

        let mut context = BTreeMap::new();
        context.insert(PERIOD_FIELD.to_string(), period);
        Ok(CatalogIndex {
            sub_items: departments,
            context,
        })
    }

    fn query_form(
        &self,
        item: &SelectOption,
        context: &BTreeMap<String, String>,
    ) -> Vec<(String, String)> {
        vec![
            (
                PERIOD_FIELD.to_string(),
                context.get(PERIOD_FIELD).cloned().unwrap_or_default(),
            ),
            ("command".to_string(), "displayResults".to_string()),
            (DEPARTMENT_FIELD.to_string(), item.value.clone()),
            ("subjCode".to_string(), "ALL".to_string()),
        ]
    }

    fn parse_records(&self, html: &str, item: &SelectOption) -> Vec<ClassOffering> {
        let Some(rows) = keyed_tables(html, HEADER_PHRASE).into_iter().next() else {
            return Vec::new();
        };
        let first_data = header_position(&rows, HEADER_PHRASE).map_or(0, |i| i + 1);

        rows[first_data..]
            .iter()
            .filter(|row| row.cells.len() >= MIN_CELLS)
            .map(|row| {
                let cell = |i: usize| row.cells.get(i).map(|c| single_line(c)).unwrap_or_default();
                ClassOffering {
                    department: item.value.clone(),
                    subject_code: cell(0),
                    section: cell(1),
                    course_title: cell(2),
                    units: cell(3),
                    time: cell(4),
                    room: cell(5),
                    instructor: cell(6),
                    max_no: cell(7),
                    lang: cell(8),
                    level: cell(9),
                    free_slots: cell(10),
                    remarks: cell(11),
                    s: cell(12),
                    p: cell(13),
                }
            })
            .collect()
    }
}

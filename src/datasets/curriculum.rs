//! Official curriculum, one degree program at a time

use crate::datasets::catalog::{header_position, keyed_tables, CatalogIndex, CatalogSource};
use crate::datasets::records::CurriculumEntry;
use crate::datasets::DatasetKey;
use crate::extract::{find_named_select_options, single_line, ScannedRow, SelectOption};
use crate::{HarvestError, Result};
use std::collections::BTreeMap;

const DEGREE_FIELD: &str = "degCode";
const HEADER_PHRASE: &str = "Course Title";
const MIN_CELLS: usize = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct CurriculumSource;

/// Banner row above the column headers (e.g. "First Year, First Semester")
fn term_label(rows: &[ScannedRow], header: usize) -> Option<String> {
    let banner = rows.get(header.checked_sub(1)?)?;
    let text = banner
        .cells
        .iter()
        .map(|c| single_line(c))
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}

impl CatalogSource for CurriculumSource {
    type Record = CurriculumEntry;

    fn key(&self) -> DatasetKey {
        DatasetKey::OfficialCurriculum
    }

    fn step_prefix(&self) -> &'static str {
        "curriculum"
    }

    fn item_noun(&self) -> &'static str {
        "degree program"
    }

    fn parse_index(&self, html: &str) -> Result<CatalogIndex> {
        let degrees: Vec<SelectOption> = find_named_select_options(html, DEGREE_FIELD)
            .into_iter()
            .filter(|opt| !opt.value.is_empty())
            .collect();
        if degrees.is_empty() {
            return Err(HarvestError::Parse {
                context: "officialCurriculum".to_string(),
                message: "could not find the degree code drop-down".to_string(),
            });
        }
        Ok(CatalogIndex {
            sub_items: degrees,
            context: BTreeMap::new(),
        })
    }

    fn query_form(
        &self,
        item: &SelectOption,
        _context: &BTreeMap<String, String>,
    ) -> Vec<(String, String)> {
        vec![(DEGREE_FIELD.to_string(), item.value.clone())]
    }

    /// Every table keyed by "Course Title" is one term of the program
    fn parse_records(&self, html: &str, item: &SelectOption) -> Vec<CurriculumEntry> {
        let mut entries = Vec::new();
        for rows in keyed_tables(html, HEADER_PHRASE) {
            let Some(header) = header_position(&rows, HEADER_PHRASE) else {
                continue;
            };
            let term = term_label(&rows, header);

            for row in rows[header + 1..]
                .iter()
                .filter(|row| row.cells.len() >= MIN_CELLS)
            {
                let cell = |i: usize| row.cells.get(i).map(|c| single_line(c)).unwrap_or_default();
                entries.push(CurriculumEntry {
                    degree_program: item.label.clone(),
                    degree_code: item.value.clone(),
                    term: term.clone(),
                    cat_no: cell(0),
                    course_title: cell(1),
                    units: cell(2),
                    prerequisites: cell(3),
                    category: cell(4),
                });
            }
        }
        entries
    }
}

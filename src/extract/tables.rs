//! Table extraction by tag-bounded pattern scanning
//!
//! The portal nests data tables inside layout tables, so the scanner pairs
//! `<table>` / `</table>` tags with a stack and only yields tables that contain
//! no other table. Stray closing tags and tables left open at the end of the
//! document are skipped.

use crate::extract::text::normalize_cell_text;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static TABLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(/?)table\b[^>]*>").unwrap());
static ROW: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").unwrap());
static CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(td|th)\b[^>]*>(.*?)</(?:td|th)\s*>").unwrap());
static CAPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<caption\b[^>]*>(.*?)</caption\s*>").unwrap());

/// A table lifted out of a page
///
/// Rows may be ragged; a row shorter than `headers` simply has fewer cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedTable {
    pub caption: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

impl ExtractedTable {
    /// All text of the table joined with spaces
    pub fn flat_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(caption) = &self.caption {
            parts.push(caption);
        }
        parts.extend(self.headers.iter().map(String::as_str));
        parts.extend(self.rows.iter().flatten().map(String::as_str));
        parts.join(" ")
    }
}

/// One `<tr>` of a table region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedRow {
    pub cells: Vec<String>,
    /// True if any cell of the row used `<th>`
    pub is_header: bool,
}

/// Returns the inner markup of every innermost table, in document order
pub fn table_regions(html: &str) -> Vec<&str> {
    // (end of the opening tag, saw a nested table)
    let mut stack: Vec<(usize, bool)> = Vec::new();
    let mut regions = Vec::new();

    for caps in TABLE_TAG.captures_iter(html) {
        let Some(tag) = caps.get(0) else { continue };
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());

        if !closing {
            if let Some(parent) = stack.last_mut() {
                parent.1 = true;
            }
            stack.push((tag.end(), false));
            continue;
        }

        // Unmatched closing tag
        let Some((inner_start, has_child)) = stack.pop() else {
            continue;
        };
        if !has_child {
            regions.push(&html[inner_start..tag.start()]);
        }
    }

    regions
}

/// Splits a table region into rows of normalized cell text
pub fn scan_rows(region: &str) -> Vec<ScannedRow> {
    ROW.captures_iter(region)
        .filter_map(|row| {
            let inner = row.get(1)?.as_str();
            let mut is_header = false;
            let cells: Vec<String> = CELL
                .captures_iter(inner)
                .map(|cell| {
                    if cell[1].eq_ignore_ascii_case("th") {
                        is_header = true;
                    }
                    normalize_cell_text(&cell[2])
                })
                .collect();
            if cells.is_empty() {
                None
            } else {
                Some(ScannedRow { cells, is_header })
            }
        })
        .collect()
}

/// Extracts every innermost table that carries at least one data row
///
/// # Header detection
///
/// The first row containing a `<th>` supplies `headers`; without any `<th>`,
/// the first row does. Every other row is data, including later rows that
/// open with a `<th>` label.
///
/// # Example
///
/// ```
/// use campus_harvest::extract::extract_tables;
///
/// let html = "<table><tr><th>Subject</th><th>Units</th></tr>\
///             <tr><td>CSCI30</td><td>3</td></tr></table>";
/// let tables = extract_tables(html);
/// assert_eq!(tables[0].headers, vec!["Subject", "Units"]);
/// assert_eq!(tables[0].total_rows, 1);
/// ```
pub fn extract_tables(html: &str) -> Vec<ExtractedTable> {
    table_regions(html)
        .into_iter()
        .filter_map(|region| {
            let rows = scan_rows(region);
            // The first `<th>` row is the header, else the first row
            let header_at = rows.iter().position(|r| r.is_header).unwrap_or(0);
            let mut headers = Vec::new();
            let mut data = Vec::new();
            for (i, row) in rows.into_iter().enumerate() {
                if i == header_at {
                    headers = row.cells;
                } else {
                    data.push(row.cells);
                }
            }

            if data.is_empty() {
                return None;
            }

            let caption = CAPTION
                .captures(region)
                .map(|c| normalize_cell_text(&c[1]))
                .filter(|c| !c.is_empty());

            Some(ExtractedTable {
                caption,
                headers,
                total_rows: data.len(),
                rows: data,
            })
        })
        .collect()
}

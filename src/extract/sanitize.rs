//! Removal of portal chrome from extracted tables
//!
//! Menus, footers and account links are laid out as small tables, so every
//! single-page dataset would otherwise carry a few navigation "tables". A table
//! is treated as navigation when its text matches one of the configured
//! patterns and it is no larger than the configured row threshold.

use crate::config::ExtractionConfig;
use crate::extract::tables::ExtractedTable;
use crate::{ConfigError, ConfigResult};
use regex::Regex;

/// Compiled navigation heuristics
#[derive(Debug, Clone)]
pub struct NavFilter {
    patterns: Vec<Regex>,
    row_threshold: usize,
}

impl NavFilter {
    pub fn new(patterns: &[String], row_threshold: usize) -> ConfigResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", p, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            row_threshold,
        })
    }

    pub fn from_config(config: &ExtractionConfig) -> ConfigResult<Self> {
        Self::new(&config.nav_patterns, config.nav_row_threshold)
    }

    /// Returns true if the table looks like navigation chrome
    pub fn is_navigation(&self, table: &ExtractedTable) -> bool {
        if table.rows.len() > self.row_threshold {
            return false;
        }
        let text = table.flat_text();
        self.patterns.iter().any(|p| p.is_match(&text))
    }
}

/// Trims every line of a cell and drops the blank ones
fn normalize_cell(cell: &str) -> String {
    cell.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cleans a dataset's tables for display and aggregation
///
/// Cells are normalized, rows left entirely blank are dropped, then navigation
/// tables and tables left without rows are removed. The row count used by the
/// navigation check is the count after cleaning.
pub fn sanitize_tables_for_dataset(
    tables: &[ExtractedTable],
    filter: &NavFilter,
) -> Vec<ExtractedTable> {
    tables
        .iter()
        .filter_map(|table| {
            let rows: Vec<Vec<String>> = table
                .rows
                .iter()
                .map(|row| row.iter().map(|c| normalize_cell(c)).collect::<Vec<_>>())
                .filter(|row| row.iter().any(|c| !c.is_empty()))
                .collect();

            let cleaned = ExtractedTable {
                caption: table.caption.as_deref().map(normalize_cell),
                headers: table.headers.iter().map(|h| normalize_cell(h)).collect(),
                total_rows: rows.len(),
                rows,
            };

            if cleaned.rows.is_empty() || filter.is_navigation(&cleaned) {
                tracing::trace!("Dropping table with headers {:?}", cleaned.headers);
                None
            } else {
                Some(cleaned)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> ExtractedTable {
        ExtractedTable {
            caption: None,
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
            total_rows: rows.len(),
        }
    }

    fn default_filter() -> NavFilter {
        NavFilter::from_config(&ExtractionConfig::default()).unwrap()
    }

    #[test]
    fn test_small_nav_table_dropped() {
        let nav = table(
            &["Home", "Help"],
            &[&["My Account"], &["Change Password"], &["Sign Out"]],
        );
        let result = sanitize_tables_for_dataset(&[nav], &default_filter());
        assert!(result.is_empty());
    }

    #[test]
    fn test_large_table_matching_nav_kept() {
        let data = table(
            &["Item", "Note"],
            &[
                &["1", "Sign out sheet"],
                &["2", "x"],
                &["3", "y"],
                &["4", "z"],
            ],
        );
        let result = sanitize_tables_for_dataset(&[data], &default_filter());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].total_rows, 4);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let nav = table(&["Menu"], &[&["Sign Out"], &["a"], &["b"], &["c"]]);
        let strict = NavFilter::new(&[r"(?i)sign out".to_string()], 5).unwrap();
        assert!(sanitize_tables_for_dataset(&[nav.clone()], &strict).is_empty());

        let loose = NavFilter::new(&[r"(?i)sign out".to_string()], 3).unwrap();
        assert_eq!(sanitize_tables_for_dataset(&[nav], &loose).len(), 1);
    }

    #[test]
    fn test_cells_normalized_and_blank_rows_dropped() {
        let data = table(
            &["Code", "Title"],
            &[&["CSCI 30\n\n", "  Intro \n\n to Computing "], &["", "  "]],
        );
        let result = sanitize_tables_for_dataset(&[data], &default_filter());
        assert_eq!(result[0].rows, vec![vec!["CSCI 30", "Intro\nto Computing"]]);
        assert_eq!(result[0].total_rows, 1);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        assert!(NavFilter::new(&["(".to_string()], 3).is_err());
    }
}

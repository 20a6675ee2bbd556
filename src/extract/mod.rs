//! Markup extraction: cell text, tables, form fields and chrome filtering
//!
//! Extraction is deliberately narrow: callers only see [`extract_tables`],
//! [`find_named_select_options`] and friends, never the scanning details.

mod forms;
mod sanitize;
mod tables;
mod text;

pub use forms::{find_input_value, find_named_select_options, selected_option_value, SelectOption};
pub use sanitize::{sanitize_tables_for_dataset, NavFilter};
pub use tables::{extract_tables, scan_rows, table_regions, ExtractedTable, ScannedRow};
pub use text::{decode_entities, normalize_cell_text, single_line, strip_html};

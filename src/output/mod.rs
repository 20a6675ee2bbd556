//! Output module for reading scrape results
//!
//! This module handles:
//! - The display view of one dataset (`--show`)
//! - Statistics of the stored state and run history (`--stats`)

mod aggregate;
pub mod stats;

pub use aggregate::{aggregate_dataset, AggregatedView};
pub use stats::{load_statistics, print_statistics, summarize, HarvestStatistics};

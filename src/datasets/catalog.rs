//! Paginated catalog scraping
//!
//! A catalog dataset is an index page with a drop-down whose options are
//! queried one by one. The driver here is shared by every catalog; a
//! [`CatalogSource`] only says how to read the index, how to build the
//! per-option query and how to parse its result page.
//!
//! # Resume
//!
//! The checkpoint stores the option list and the query context captured from
//! the index page, plus the index of the next option. Rows of an option are
//! merged together with the checkpoint advance, and any rows already stored
//! under the same option key are replaced, so a resumed run ends with the
//! same rows as an uninterrupted one.

use crate::datasets::records::{CatalogRecord, DatasetPayload};
use crate::datasets::{DatasetKey, StepOutcome};
use crate::extract::{scan_rows, table_regions, ScannedRow, SelectOption};
use crate::harvest::{pause_for, PortalRequest, ScrapeContext};
use crate::state::{Checkpoint, LogLevel, ScrapeState};
use crate::{HarvestError, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

/// Key space and shared query fields read from an index page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogIndex {
    pub sub_items: Vec<SelectOption>,
    pub context: BTreeMap<String, String>,
}

/// One paginated dataset of the portal
pub trait CatalogSource {
    type Record: CatalogRecord;

    fn key(&self) -> DatasetKey;

    /// Prefix of per-item error steps, e.g. `schedule` for `schedule_MATH`
    fn step_prefix(&self) -> &'static str;

    /// What one sub-item is called in logs
    fn item_noun(&self) -> &'static str;

    /// Reads the option list (and shared context) off the index page
    ///
    /// An index without options is a dataset-level error.
    fn parse_index(&self, html: &str) -> Result<CatalogIndex>;

    /// Form fields of the query for one option
    fn query_form(
        &self,
        item: &SelectOption,
        context: &BTreeMap<String, String>,
    ) -> Vec<(String, String)>;

    /// Records of one option's result page; an empty list is not an error
    fn parse_records(&self, html: &str, item: &SelectOption) -> Vec<Self::Record>;
}

/// Rows of every innermost table whose text contains `phrase`
pub(crate) fn keyed_tables(html: &str, phrase: &str) -> Vec<Vec<ScannedRow>> {
    let needle = phrase.to_lowercase();
    table_regions(html)
        .into_iter()
        .map(scan_rows)
        .filter(|rows| {
            rows.iter()
                .flat_map(|row| row.cells.iter())
                .any(|cell| cell.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Position of the first row that contains `phrase`
pub(crate) fn header_position(rows: &[ScannedRow], phrase: &str) -> Option<usize> {
    let needle = phrase.to_lowercase();
    rows.iter().position(|row| {
        row.cells
            .iter()
            .any(|cell| cell.to_lowercase().contains(&needle))
    })
}

/// Replaces the rows stored for `sub_key` with `records`
fn merge_records<R: CatalogRecord>(
    state: &mut ScrapeState,
    key: DatasetKey,
    sub_key: &str,
    records: Vec<R>,
) {
    let payload = state
        .scraped_data
        .entry(key)
        .or_insert_with(|| Arc::new(R::into_payload(Vec::new())));
    let payload = Arc::make_mut(payload);
    if R::records_mut(payload).is_none() {
        *payload = R::into_payload(Vec::new());
    }
    if let Some(rows) = R::records_mut(payload) {
        rows.retain(|row| row.sub_item_key() != sub_key);
        rows.extend(records);
    }
}

async fn load_index<S: CatalogSource>(
    ctx: &mut ScrapeContext<'_>,
    source: &S,
    page_url: &Url,
) -> Result<CatalogIndex> {
    let referer = ctx.landing_referer()?;
    let page = ctx
        .fetch(PortalRequest::get(page_url.clone()).with_referer(referer))
        .await?
        .error_for_status()?;
    source.parse_index(&page.body)
}

/// Scrapes a catalog from its checkpoint (or from scratch)
///
/// # Returns
///
/// * `Ok(StepOutcome::Completed)` - Every option was attempted
/// * `Ok(StepOutcome::Paused)` - A stop was requested; the checkpoint points at the next option
/// * `Err(HarvestError)` - The index page could not be loaded or read
pub async fn scrape_catalog<S: CatalogSource>(
    ctx: &mut ScrapeContext<'_>,
    source: &S,
) -> Result<StepOutcome> {
    let key = source.key();
    let noun = source.item_noun();
    let page_url = ctx.portal_url(key.path(&ctx.config.portal))?;

    let resume = ctx
        .hub
        .get()
        .checkpoints
        .get(&key)
        .filter(|cp| !cp.sub_items.is_empty() && cp.next_index <= cp.sub_items.len())
        .cloned();

    let (sub_items, context, start) = match resume {
        Some(checkpoint) => {
            ctx.log_with(
                LogLevel::Info,
                format!(
                    "Resuming {} at {} {}/{}",
                    key.label(),
                    noun,
                    checkpoint.next_index + 1,
                    checkpoint.sub_items.len()
                ),
                [("step", key.as_str())],
            );
            (
                checkpoint.sub_items,
                checkpoint.context,
                checkpoint.next_index,
            )
        }
        None => {
            let index = load_index(ctx, source, &page_url).await?;
            let total = index.sub_items.len();
            ctx.log_with(
                LogLevel::Info,
                format!("Found {} {}s", total, noun),
                [("step", key.as_str())],
            );

            let checkpoint = Checkpoint {
                next_index: 0,
                total,
                sub_items: index.sub_items.clone(),
                context: index.context.clone(),
                updated_at: Utc::now(),
            };
            ctx.hub.update(|s| {
                s.store_payload(key, S::Record::into_payload(Vec::new()));
                s.checkpoints.insert(key, checkpoint);
                s.update_dataset_progress(key, |p| {
                    p.completed = 0;
                    p.total = total;
                    p.items = 0;
                    p.detail = None;
                    p.active = true;
                });
            });
            (index.sub_items, index.context, 0)
        }
    };

    let total = sub_items.len();
    for index in start..total {
        if ctx.control.stop_requested() {
            ctx.hub.update(|s| {
                if let Some(cp) = s.checkpoints.get_mut(&key) {
                    cp.next_index = index;
                    cp.updated_at = Utc::now();
                }
            });
            ctx.log_with(
                LogLevel::Warning,
                format!(
                    "Stopped {} before {} {}/{}",
                    key.label(),
                    noun,
                    index + 1,
                    total
                ),
                [("step", key.as_str())],
            );
            return Ok(StepOutcome::Paused);
        }

        let item = &sub_items[index];
        ctx.hub.update(|s| {
            s.current_step = format!(
                "Scraping {} {} ({}/{})...",
                noun,
                item.label,
                index + 1,
                total
            );
        });
        ctx.log_with(
            LogLevel::Info,
            format!("Fetching {} {}", noun, item.label),
            [("step", key.as_str()), ("item", item.value.as_str())],
        );

        let request = PortalRequest::post(page_url.clone(), source.query_form(item, &context))
            .with_referer(page_url.to_string());
        let fetched = match ctx.fetch(request).await {
            Ok(response) if response.is_success() => {
                Ok(source.parse_records(&response.body, item))
            }
            Ok(response) => Err(HarvestError::HttpStatus {
                url: response.final_url.to_string(),
                status: response.status,
            }),
            Err(e) => Err(e),
        };

        let detail = match &fetched {
            Ok(records) if records.is_empty() => {
                ctx.log_with(
                    LogLevel::Warning,
                    format!("No rows found for {}", item.label),
                    [("step", key.as_str()), ("item", item.value.as_str())],
                );
                item.label.clone()
            }
            Ok(records) => {
                ctx.log_with(
                    LogLevel::Success,
                    format!("Scraped {} rows from {}", records.len(), item.label),
                    [("step", key.as_str()), ("item", item.value.as_str())],
                );
                item.label.clone()
            }
            Err(e) => {
                ctx.log_with(
                    LogLevel::Error,
                    format!("Error processing {}: {}", item.label, e),
                    [("step", key.as_str()), ("item", item.value.as_str())],
                );
                format!("{} (error)", item.label)
            }
        };

        let next = index + 1;
        let step_tag = format!("{}_{}", source.step_prefix(), item.value);
        ctx.hub.update(|s| {
            match fetched {
                Ok(records) => merge_records(s, key, &item.value, records),
                Err(e) => s.push_error(step_tag, e.to_string()),
            }
            if let Some(cp) = s.checkpoints.get_mut(&key) {
                cp.next_index = next;
                cp.updated_at = Utc::now();
            }
            let items = s.payload(key).map_or(0, DatasetPayload::item_count);
            s.update_dataset_progress(key, |p| {
                p.completed = next;
                p.total = total;
                p.items = items;
                p.detail = Some(detail);
                p.active = true;
            });
            s.advance_substep(next as f64 / total as f64);
        });

        if next < total {
            pause_for(ctx.pacer.item_delay()).await;
        }
    }

    let collected = ctx.hub.update(|s| {
        s.checkpoints.remove(&key);
        s.update_dataset_progress(key, |p| p.active = false);
        s.payload(key).map_or(0, DatasetPayload::item_count)
    });
    ctx.log_with(
        LogLevel::Success,
        format!("{}: {} rows from {} {}s", key.label(), collected, total, noun),
        [("step", key.as_str())],
    );

    Ok(StepOutcome::Completed)
}

//! Single-page datasets
//!
//! One GET, the tables of the page, and for the class schedule a weekly grid
//! derived from those tables.

use crate::datasets::records::{DatasetPayload, PagePayload};
use crate::datasets::{DatasetKey, StepOutcome};
use crate::extract::{extract_tables, strip_html};
use crate::harvest::{pause_for, PortalRequest, ScrapeContext};
use crate::schedule::build_weekly_schedule;
use crate::state::LogLevel;
use crate::Result;
use chrono::Utc;

const SNAPSHOT_MARKER: &str = "\n<!-- truncated -->";

/// Cuts a page snapshot at `limit` characters, marking the cut
pub fn truncate_snapshot(html: &str, limit: usize) -> String {
    match html.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{}", &html[..cut], SNAPSHOT_MARKER),
        None => html.to_string(),
    }
}

/// GETs the dataset's page with the landing page as referer
///
/// A non-2xx status is a dataset-level error.
pub(crate) async fn fetch_page(ctx: &mut ScrapeContext<'_>, key: DatasetKey) -> Result<String> {
    let url = ctx.portal_url(key.path(&ctx.config.portal))?;
    let referer = ctx.landing_referer()?;
    let response = ctx
        .fetch(PortalRequest::get(url).with_referer(referer))
        .await?
        .error_for_status()?;
    Ok(response.body)
}

/// Builds the stored payload of a single-page dataset
pub fn build_page_payload(key: DatasetKey, html: &str, snapshot_limit: usize) -> PagePayload {
    let tables = extract_tables(html);
    let weekly_schedule = if key == DatasetKey::ClassSchedule {
        build_weekly_schedule(&tables).map(|mut schedule| {
            schedule.generated_at = Some(Utc::now());
            schedule
        })
    } else {
        None
    };

    PagePayload {
        html: truncate_snapshot(html, snapshot_limit),
        text: strip_html(html),
        tables,
        weekly_schedule,
        captured_at: Utc::now(),
    }
}

/// Scrapes one report page into a table-centric payload
pub async fn scrape_page(ctx: &mut ScrapeContext<'_>, key: DatasetKey) -> Result<StepOutcome> {
    let html = fetch_page(ctx, key).await?;
    let payload = build_page_payload(key, &html, ctx.config.extraction.snapshot_limit);

    let table_count = payload.tables.len();
    let events = payload
        .weekly_schedule
        .as_ref()
        .map(|schedule| schedule.events.len());
    let payload = DatasetPayload::Page(payload);
    let rows = payload.item_count();

    ctx.hub.update(|s| {
        s.store_payload(key, payload);
        s.update_dataset_progress(key, |p| {
            p.completed = 1;
            p.total = 1;
            p.items = rows;
            p.detail = Some(format!("{} tables", table_count));
            p.active = false;
        });
    });

    let message = match events {
        Some(count) => format!(
            "{} scraped: {} tables, {} weekly events",
            key.label(),
            table_count,
            count
        ),
        None => format!("{} scraped: {} tables", key.label(), table_count),
    };
    ctx.log_with(LogLevel::Success, message, [("step", key.as_str())]);

    pause_for(ctx.pacer.page_delay()).await;
    Ok(StepOutcome::Completed)
}

//! Dataset scrapers
//!
//! Each dataset of the portal is scraped by one of three strategies picked by
//! its [`DatasetKind`]:
//! - **Catalog**: an index drop-down whose options are queried one by one
//!   ([`catalog`]), resumable through a checkpoint
//! - **Records**: one page parsed into typed records ([`grades`])
//! - **Page**: one page captured as tables ([`simple`])

pub mod catalog;
pub mod curriculum;
pub mod grades;
pub mod offerings;
pub mod records;
pub mod registry;
pub mod simple;

pub use catalog::{scrape_catalog, CatalogIndex, CatalogSource};
pub use curriculum::CurriculumSource;
pub use grades::{parse_grades, scrape_grades, term_rank, GradeSummary};
pub use offerings::ClassOfferingsSource;
pub use records::{
    CatalogRecord, ClassOffering, CurriculumEntry, DatasetPayload, GradeRecord, PagePayload,
};
pub use registry::{DatasetKey, DatasetKind, DatasetSelection};
pub use simple::{build_page_payload, scrape_page};

use crate::harvest::ScrapeContext;
use crate::Result;

/// How a dataset step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The dataset was fully attempted
    Completed,
    /// A stop was requested mid-dataset; its checkpoint is saved
    Paused,
}

/// Scrapes one dataset with the strategy its key calls for
pub async fn scrape_dataset(ctx: &mut ScrapeContext<'_>, key: DatasetKey) -> Result<StepOutcome> {
    match key.kind() {
        DatasetKind::Catalog if key == DatasetKey::OfficialCurriculum => {
            scrape_catalog(ctx, &CurriculumSource).await
        }
        DatasetKind::Catalog => scrape_catalog(ctx, &ClassOfferingsSource).await,
        DatasetKind::Records => scrape_grades(ctx).await,
        DatasetKind::Page => scrape_page(ctx, key).await,
    }
}

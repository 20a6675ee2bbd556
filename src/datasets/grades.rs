//! Grade records and the term summary shown by `--stats`

use crate::datasets::records::{DatasetPayload, GradeRecord};
use crate::datasets::simple::fetch_page;
use crate::datasets::{DatasetKey, StepOutcome};
use crate::harvest::{pause_for, ScrapeContext};
use crate::state::LogLevel;
use crate::Result;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

/// Grade rows carry their values in `td.text02` cells
const GRADE_CELL: &str = "td.text02";
const MIN_CELLS: usize = 6;

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses the grades page
pub fn parse_grades(html: &str) -> Vec<GradeRecord> {
    let (Ok(rows), Ok(cells)) = (Selector::parse("table tr"), Selector::parse(GRADE_CELL)) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    document
        .select(&rows)
        .filter_map(|row| {
            let values: Vec<String> = row.select(&cells).map(|c| cell_text(&c)).collect();
            if values.len() < MIN_CELLS {
                return None;
            }
            let get = |i: usize| values.get(i).cloned().unwrap_or_default();
            Some(GradeRecord {
                school_year: get(0),
                semester: get(1),
                program: get(2),
                course_code: get(3),
                course_title: get(4),
                units: get(5),
                grade: get(6),
            })
        })
        .collect()
}

/// Sort key of a term: school-year start times ten plus the semester rank
///
/// Semesters rank `1` = 1, `2` = 2, intersession = 3, anything else 0.
pub fn term_rank(school_year: &str, semester: &str) -> Option<u32> {
    let year_start: u32 = school_year.split('-').next()?.trim().parse().ok()?;
    let semester = semester.trim().to_lowercase();
    let semester_rank = match semester.as_str() {
        "1" => 1,
        "2" => 2,
        s if s.contains("inter") => 3,
        _ => 0,
    };
    year_start.checked_mul(10)?.checked_add(semester_rank)
}

fn numeric(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Unit-weighted mean of the numeric grades
pub fn weighted_average<'a>(records: impl IntoIterator<Item = &'a GradeRecord>) -> Option<f64> {
    let (units, points) = records
        .into_iter()
        .filter_map(|r| {
            let units = numeric(&r.units).filter(|u| *u > 0.0)?;
            let grade = numeric(&r.grade)?;
            Some((units, units * grade))
        })
        .fold((0.0, 0.0), |(u, p), (units, points)| (u + units, p + points));
    (units > 0.0).then(|| points / units)
}

/// Overview of the scraped grades
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeSummary {
    pub latest_school_year: Option<String>,
    pub latest_semester: Option<String>,
    pub current_courses: usize,
    pub units_completed: f64,
    pub current_average: Option<f64>,
    pub cumulative_average: Option<f64>,
}

impl GradeSummary {
    pub fn from_records(records: &[GradeRecord]) -> Self {
        let latest = records
            .iter()
            .filter_map(|r| term_rank(&r.school_year, &r.semester).map(|rank| (rank, r)))
            .max_by_key(|(rank, _)| *rank)
            .map(|(_, r)| (r.school_year.clone(), r.semester.clone()));

        let current: Vec<&GradeRecord> = match &latest {
            Some((year, semester)) => records
                .iter()
                .filter(|r| &r.school_year == year && &r.semester == semester)
                .collect(),
            None => Vec::new(),
        };

        let graded = || records.iter().filter(|r| numeric(&r.grade).is_some());
        let units_completed = graded().filter_map(|r| numeric(&r.units)).sum();

        Self {
            current_courses: current.len(),
            current_average: weighted_average(
                current.iter().copied().filter(|r| numeric(&r.grade).is_some()),
            ),
            cumulative_average: weighted_average(graded()),
            units_completed,
            latest_school_year: latest.as_ref().map(|(y, _)| y.clone()),
            latest_semester: latest.map(|(_, s)| s),
        }
    }
}

/// Scrapes the grades page into typed records
pub async fn scrape_grades(ctx: &mut ScrapeContext<'_>) -> Result<StepOutcome> {
    let key = DatasetKey::Grades;
    let html = fetch_page(ctx, key).await?;
    let records = parse_grades(&html);
    let count = records.len();

    if count == 0 {
        ctx.log_with(
            LogLevel::Warning,
            "No grade rows found on the grades page",
            [("step", key.as_str())],
        );
    }

    ctx.hub.update(|s| {
        s.store_payload(key, DatasetPayload::Grades(records));
        s.update_dataset_progress(key, |p| {
            p.completed = 1;
            p.total = 1;
            p.items = count;
            p.detail = Some(format!("{} grade entries", count));
            p.active = false;
        });
    });
    ctx.log_with(
        LogLevel::Success,
        format!("Scraped {} grade entries", count),
        [("step", key.as_str())],
    );

    pause_for(ctx.pacer.page_delay()).await;
    Ok(StepOutcome::Completed)
}

//! Class entries inside a single grid cell
//!
//! A cell may stack several classes. Each entry is a short block of lines:
//! the first names the course (with optional section and delivery mode), the
//! rest are assigned to title, instructor and room by shape.

use regex::Regex;
use std::sync::LazyLock;

static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());
static COURSE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2,6}\s?\d{1,4}[A-Z]?\b").unwrap());
static COURSE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([A-Z]{2,}\s?\d+[A-Z]?)\b").unwrap());
static INLINE_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsec(?:tion)?\b\.?\s*[:\-]?\s*([A-Z0-9][A-Z0-9-]*)").unwrap());
static SECTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^sec(?:tion)?\b\.?\s*[:\-]?\s*(\S+)$").unwrap());
static MODE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([^()]+)\)\s*$").unwrap());
static ROOM_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:room|rm|hall|lab|bldg|building|online|hybrid|campus|virtual|tba)\b")
        .unwrap()
});
static HAS_LETTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// The fields recovered from one entry block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedEntry {
    pub course_code: String,
    pub section: Option<String>,
    pub course_title: Option<String>,
    pub mode: Option<String>,
    pub room: Option<String>,
    pub instructor: Option<String>,
    pub details: Vec<String>,
    pub raw: String,
}

fn is_course_header(line: &str) -> bool {
    COURSE_HEADER.is_match(line) && !ROOM_KEYWORD.is_match(line)
}

/// Splits a cell into entry blocks
///
/// Blank-line paragraphs win. A cell without paragraphs is split before every
/// line that starts a new course code, once a block has been accumulated.
pub fn split_cell_entries(text: &str) -> Vec<String> {
    let paragraphs: Vec<String> = PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if paragraphs.len() > 1 {
        return paragraphs;
    }

    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !current.is_empty() && is_course_header(line) {
            blocks.push(current.join("\n"));
            current.clear();
        }
        current.push(line);
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks
}

/// Parses one entry block
///
/// # Example
///
/// ```
/// use campus_harvest::schedule::parse_entry;
///
/// let entry = parse_entry("CSCI 30\nSec A\nIntro to Computing\nDr. Jane Doe, PhD\nRoom 301");
/// assert_eq!(entry.course_code, "CSCI 30");
/// assert_eq!(entry.section.as_deref(), Some("A"));
/// assert_eq!(entry.course_title.as_deref(), Some("Intro to Computing"));
/// assert_eq!(entry.instructor.as_deref(), Some("Dr. Jane Doe, PhD"));
/// assert_eq!(entry.room.as_deref(), Some("Room 301"));
/// ```
pub fn parse_entry(block: &str) -> ParsedEntry {
    let mut lines = block.lines().map(str::trim).filter(|l| !l.is_empty());
    let mut entry = ParsedEntry {
        raw: block.trim().to_string(),
        ..ParsedEntry::default()
    };

    let Some(first) = lines.next() else {
        return entry;
    };
    let mut rest: Vec<String> = lines.map(str::to_string).collect();

    // Header line: code, then section, then a parenthesized mode
    let mut head = first.to_string();
    if let Some(caps) = MODE_SUFFIX.captures(&head) {
        entry.mode = Some(caps[1].trim().to_string());
        let cut = caps.get(0).map(|m| m.start()).unwrap_or(head.len());
        head.truncate(cut);
    }
    if let Some(caps) = INLINE_SECTION.captures(&head) {
        entry.section = Some(caps[1].to_string());
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        head.replace_range(whole, " ");
    }
    let head = head.trim().to_string();
    match COURSE_CODE.captures(&head) {
        Some(caps) => {
            let code = &caps[1];
            entry.course_code = WHITESPACE.replace_all(code, " ").to_uppercase();
            let tail = head[code.len()..].trim();
            if !tail.is_empty() {
                rest.insert(0, tail.to_string());
            }
        }
        None if !head.is_empty() => rest.insert(0, head.clone()),
        None => {}
    }

    if entry.section.is_none() {
        if let Some(pos) = rest.iter().position(|l| SECTION_LINE.is_match(l)) {
            let line = rest.remove(pos);
            entry.section = SECTION_LINE
                .captures(&line)
                .map(|caps| caps[1].to_string());
        }
    }

    for line in rest {
        if entry.instructor.is_none() && line.contains(',') && HAS_LETTER.is_match(&line) {
            entry.instructor = Some(line);
        } else if entry.room.is_none() && ROOM_KEYWORD.is_match(&line) {
            entry.room = Some(line);
        } else if entry.course_title.is_none() {
            entry.course_title = Some(line);
        } else {
            entry.details.push(line);
        }
    }

    if entry.room.is_none() {
        if let Some(pos) = entry.details.iter().position(|l| !l.contains(',')) {
            entry.room = Some(entry.details.remove(pos));
        }
    }

    entry
}

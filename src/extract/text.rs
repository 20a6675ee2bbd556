//! Markup-to-text normalization
//!
//! Cell text keeps its line structure (`<br>`, paragraph and block boundaries
//! become newlines) because schedule cells stack several class entries on top
//! of each other and the entry splitter relies on those breaks.

use regex::Regex;
use std::sync::LazyLock;

static RAW_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static PARAGRAPH_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<p\b[^>]*>").unwrap());
static PARAGRAPH_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</p\s*>").unwrap());
static BLOCK_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(?:div|li|tr)\s*>").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(?:x([0-9a-fA-F]+)|([0-9]+));").unwrap());
static INLINE_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").unwrap());

/// Decodes the handful of entities the portal actually emits
///
/// `&amp;` is decoded last so that `&amp;nbsp;` stays a literal `&nbsp;`.
pub fn decode_entities(text: &str) -> String {
    let decoded = NUMERIC_ENTITY.replace_all(text, |caps: &regex::Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(|c| c.to_string())
            .unwrap_or_default()
    });

    decoded
        .replace("&nbsp;", " ")
        .replace("&NBSP;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Normalizes the inner markup of a table cell into multi-line text
///
/// # Steps
///
/// 1. Source whitespace (including raw newlines) collapses to single spaces
/// 2. `<br>` and `<p>` become a newline, `</p>` a blank line, other block ends a newline
/// 3. Remaining tags are stripped and entities decoded
/// 4. Each line is trimmed with inner runs of spaces collapsed
/// 5. Runs of blank lines shrink to a single blank line; the result is trimmed
///
/// # Example
///
/// ```
/// use campus_harvest::extract::normalize_cell_text;
///
/// let text = normalize_cell_text("CSCI 30<br/>Sec&nbsp;A<p>Lab</p>");
/// assert_eq!(text, "CSCI 30\nSec A\nLab");
/// ```
pub fn normalize_cell_text(markup: &str) -> String {
    let flat = RAW_WHITESPACE.replace_all(markup, " ");
    let with_breaks = LINE_BREAK.replace_all(&flat, "\n");
    let opened = PARAGRAPH_START.replace_all(&with_breaks, "\n");
    let with_paragraphs = PARAGRAPH_END.replace_all(&opened, "\n\n");
    let with_blocks = BLOCK_END.replace_all(&with_paragraphs, "\n");
    let stripped = TAG.replace_all(&with_blocks, "");
    let decoded = decode_entities(&stripped);

    let mut lines: Vec<String> = Vec::new();
    for line in decoded.lines() {
        let line = INLINE_SPACE.replace_all(line, " ").trim().to_string();
        // At most one blank line in a row
        if line.is_empty() && lines.last().is_some_and(|l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }

    lines.join("\n").trim().to_string()
}

/// Flattens a whole page into a single line of text
pub fn strip_html(html: &str) -> String {
    let with_breaks = LINE_BREAK.replace_all(html, "\n");
    let stripped = TAG.replace_all(&with_breaks, "");
    let decoded = decode_entities(&stripped);
    RAW_WHITESPACE.replace_all(&decoded, " ").trim().to_string()
}

/// Joins the lines of a normalized cell with single spaces
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_breaks_preserved() {
        let text = normalize_cell_text("CSCI 30<br>Sec A<BR />Intro to Computing");
        assert_eq!(text, "CSCI 30\nSec A\nIntro to Computing");
    }

    #[test]
    fn test_source_newlines_are_not_breaks() {
        let text = normalize_cell_text("Intro\n   to\tComputing");
        assert_eq!(text, "Intro to Computing");
    }

    #[test]
    fn test_blank_lines_collapse() {
        let text = normalize_cell_text("A<br><br><br><br>B");
        assert_eq!(text, "A\n\nB");
    }

    #[test]
    fn test_paragraphs_leave_blank_line() {
        let text = normalize_cell_text("<p>CSCI 30</p><p>MATH 21</p>");
        assert_eq!(text, "CSCI 30\n\nMATH 21");
    }

    #[test]
    fn test_entities() {
        assert_eq!(normalize_cell_text("A&nbsp;&amp;&nbsp;B"), "A & B");
        assert_eq!(decode_entities("&#65;&#x42;&lt;&gt;&quot;"), "AB<>\"");
        assert_eq!(decode_entities("&amp;nbsp;"), "&nbsp;");
    }

    #[test]
    fn test_nested_tags_stripped() {
        let text = normalize_cell_text("<font color=red><b>CSCI</b> 30</font>");
        assert_eq!(text, "CSCI 30");
    }

    #[test]
    fn test_strip_html() {
        let html = "<html><body><h1>Hold&nbsp;Orders</h1>\n<p>None<br/>found</p></body></html>";
        assert_eq!(strip_html(html), "Hold Orders None found");
    }

    #[test]
    fn test_single_line() {
        assert_eq!(single_line("M-TH\n0800-0930\n"), "M-TH 0800-0930");
    }
}

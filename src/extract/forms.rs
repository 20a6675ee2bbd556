//! Form field lookups (drop-down options, hidden inputs)

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

/// One `<option>` of a named `<select>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    #[serde(default)]
    pub selected: bool,
}

/// Builds an attribute selector, refusing names that would need escaping
fn named_selector(tag: &str, name: &str) -> Option<Selector> {
    if name.is_empty() || name.contains(&['"', '\\', ']'][..]) {
        return None;
    }
    Selector::parse(&format!("{}[name=\"{}\"]", tag, name)).ok()
}

/// Collects the options of the first `<select>` with the given name
///
/// An option without a `value` attribute takes its label as value, the same
/// way a browser would submit it.
///
/// # Arguments
///
/// * `html` - The page markup
/// * `name` - The `name` attribute of the select element
///
/// # Returns
///
/// The options in document order, or an empty list if the select is missing
pub fn find_named_select_options(html: &str, name: &str) -> Vec<SelectOption> {
    let Some(select) = named_selector("select", name) else {
        return Vec::new();
    };
    let Ok(option) = Selector::parse("option") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let Some(element) = document.select(&select).next() else {
        return Vec::new();
    };

    element
        .select(&option)
        .map(|opt| {
            let label = opt
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            let value = opt
                .value()
                .attr("value")
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|| label.clone());
            SelectOption {
                value,
                label,
                selected: opt.value().attr("selected").is_some(),
            }
        })
        .collect()
}

/// Returns the value of the pre-selected option of a named select
pub fn selected_option_value(html: &str, name: &str) -> Option<String> {
    find_named_select_options(html, name)
        .into_iter()
        .find(|opt| opt.selected)
        .map(|opt| opt.value)
}

/// Returns the `value` of the first `<input>` with the given name
pub fn find_input_value(html: &str, name: &str) -> Option<String> {
    let selector = named_selector("input", name)?;
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string)
}

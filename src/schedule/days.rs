//! Weekday names as they appear in grid headers

use serde::{Deserialize, Serialize};
use std::fmt;

/// A day column of the weekly grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayKey {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

/// Accepted spellings, lower-cased and without trailing dots
const DAY_NAMES: &[(&str, DayKey)] = &[
    ("mon", DayKey::Mon),
    ("monday", DayKey::Mon),
    ("tue", DayKey::Tue),
    ("tues", DayKey::Tue),
    ("tuesday", DayKey::Tue),
    ("wed", DayKey::Wed),
    ("weds", DayKey::Wed),
    ("wednesday", DayKey::Wed),
    ("thu", DayKey::Thu),
    ("thur", DayKey::Thu),
    ("thurs", DayKey::Thu),
    ("thursday", DayKey::Thu),
    ("fri", DayKey::Fri),
    ("friday", DayKey::Fri),
    ("sat", DayKey::Sat),
    ("saturday", DayKey::Sat),
    ("sun", DayKey::Sun),
    ("sunday", DayKey::Sun),
];

impl DayKey {
    /// Resolves a header label such as `"Mon"`, `"TUES."` or `"Thursday"`
    ///
    /// Single letters are ambiguous (T, S) and are not accepted.
    pub fn resolve(label: &str) -> Option<Self> {
        let normalized = label.trim().trim_end_matches('.').to_lowercase();
        DAY_NAMES
            .iter()
            .find(|(name, _)| *name == normalized)
            .map(|(_, day)| *day)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Mon => "Monday",
            Self::Tue => "Tuesday",
            Self::Wed => "Wednesday",
            Self::Thu => "Thursday",
            Self::Fri => "Friday",
            Self::Sat => "Saturday",
            Self::Sun => "Sunday",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mon => "mon",
            Self::Tue => "tue",
            Self::Wed => "wed",
            Self::Thu => "thu",
            Self::Fri => "fri",
            Self::Sat => "sat",
            Self::Sun => "sun",
        }
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! Dataset keys, labels, portal pages and run selections

use crate::config::PortalConfig;
use crate::HarvestError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A named category of scraped records
///
/// Variants are declared in the fixed page order; `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DatasetKey {
    ScheduleOfClasses,
    OfficialCurriculum,
    Grades,
    AdvisoryGrades,
    EnrolledClasses,
    ClassSchedule,
    TuitionReceipt,
    StudentInfo,
    ProgramOfStudy,
    HoldOrders,
    FacultyAttendance,
}

/// How a dataset is scraped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    /// Index page plus one query per drop-down option
    Catalog,
    /// Single page parsed into typed records
    Records,
    /// Single page kept as tables (and a weekly grid for the class schedule)
    Page,
}

impl DatasetKey {
    /// Every dataset in page order
    pub const ALL: [DatasetKey; 11] = [
        Self::ScheduleOfClasses,
        Self::OfficialCurriculum,
        Self::Grades,
        Self::AdvisoryGrades,
        Self::EnrolledClasses,
        Self::ClassSchedule,
        Self::TuitionReceipt,
        Self::StudentInfo,
        Self::ProgramOfStudy,
        Self::HoldOrders,
        Self::FacultyAttendance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScheduleOfClasses => "scheduleOfClasses",
            Self::OfficialCurriculum => "officialCurriculum",
            Self::Grades => "grades",
            Self::AdvisoryGrades => "advisoryGrades",
            Self::EnrolledClasses => "enrolledClasses",
            Self::ClassSchedule => "classSchedule",
            Self::TuitionReceipt => "tuitionReceipt",
            Self::StudentInfo => "studentInfo",
            Self::ProgramOfStudy => "programOfStudy",
            Self::HoldOrders => "holdOrders",
            Self::FacultyAttendance => "facultyAttendance",
        }
    }

    /// Short alternative name accepted in selections
    fn alias(&self) -> &'static str {
        match self {
            Self::ScheduleOfClasses => "schedule",
            Self::OfficialCurriculum => "curriculum",
            Self::Grades => "viewGrades",
            Self::AdvisoryGrades => "advisory",
            Self::EnrolledClasses => "currentlyEnrolled",
            Self::ClassSchedule => "myClassSchedule",
            Self::TuitionReceipt => "receipts",
            Self::StudentInfo => "profile",
            Self::ProgramOfStudy => "program",
            Self::HoldOrders => "holds",
            Self::FacultyAttendance => "faculty",
        }
    }

    /// Human-readable label used in progress and logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::ScheduleOfClasses => "Schedule of Classes",
            Self::OfficialCurriculum => "Curriculum",
            Self::Grades => "View Grades",
            Self::AdvisoryGrades => "Advisory Grades",
            Self::EnrolledClasses => "Currently Enrolled",
            Self::ClassSchedule => "My Class Schedule",
            Self::TuitionReceipt => "Tuition Receipt",
            Self::StudentInfo => "Student Information",
            Self::ProgramOfStudy => "Program of Study",
            Self::HoldOrders => "Hold Orders",
            Self::FacultyAttendance => "Faculty Attendance",
        }
    }

    /// Portal page serving the dataset
    pub fn default_path(&self) -> &'static str {
        match self {
            Self::ScheduleOfClasses => "J_VCSC.do",
            Self::OfficialCurriculum => "J_VOFC.do",
            Self::Grades => "J_VG.do",
            Self::AdvisoryGrades => "J_VADGR.do",
            Self::EnrolledClasses => "J_VCEC.do",
            Self::ClassSchedule => "J_VMCS.do",
            Self::TuitionReceipt => "J_PTR.do",
            Self::StudentInfo => "J_STUD_INFO.do",
            Self::ProgramOfStudy => "J_VIPS.do",
            Self::HoldOrders => "J_VHOR.do",
            Self::FacultyAttendance => "J_IFAT.do",
        }
    }

    /// The configured page for this dataset, honoring `[portal.paths]`
    ///
    /// Overrides may be keyed by the canonical key or by its alias.
    pub fn path<'a>(&self, portal: &'a PortalConfig) -> &'a str {
        portal
            .paths
            .get(self.as_str())
            .or_else(|| portal.paths.get(self.alias()))
            .map(String::as_str)
            .unwrap_or(self.default_path())
    }

    pub fn kind(&self) -> DatasetKind {
        match self {
            Self::ScheduleOfClasses | Self::OfficialCurriculum => DatasetKind::Catalog,
            Self::Grades => DatasetKind::Records,
            _ => DatasetKind::Page,
        }
    }

    /// Parses a canonical key or alias (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|key| {
            key.as_str().eq_ignore_ascii_case(name) || key.alias().eq_ignore_ascii_case(name)
        })
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The set of datasets a run should scrape
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetSelection(BTreeSet<DatasetKey>);

impl DatasetSelection {
    pub fn all() -> Self {
        Self(DatasetKey::ALL.into_iter().collect())
    }

    /// Builds a selection from a `key -> enabled` map
    ///
    /// Keys may be canonical names or aliases; an unknown key is an error so a
    /// typo does not silently skip a dataset.
    pub fn from_flags(flags: &BTreeMap<String, bool>) -> Result<Self, HarvestError> {
        let mut set = BTreeSet::new();
        for (name, enabled) in flags {
            let key =
                DatasetKey::parse(name).ok_or_else(|| HarvestError::UnknownDataset(name.clone()))?;
            if *enabled {
                set.insert(key);
            }
        }
        Ok(Self(set))
    }

    /// Builds a selection from a list of names
    pub fn from_names<I, S>(names: I) -> Result<Self, HarvestError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for name in names {
            let name = name.as_ref();
            let key = DatasetKey::parse(name)
                .ok_or_else(|| HarvestError::UnknownDataset(name.to_string()))?;
            set.insert(key);
        }
        Ok(Self(set))
    }

    /// Selected datasets in page order
    pub fn ordered(&self) -> Vec<DatasetKey> {
        self.0.iter().copied().collect()
    }

    pub fn keys(&self) -> &BTreeSet<DatasetKey> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<DatasetKey> for DatasetSelection {
    fn from_iter<T: IntoIterator<Item = DatasetKey>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};

use crate::models::GradeRecord;

/// Academic term used to window a student's grades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Semester {
    #[default]
    Hk1,
    Hk2,
    All,
}

/// Calendar months belonging to each term. HK1 wraps the year boundary.
/// July and August fall in neither term.
const TERM_MONTHS: [(Semester, &[u32]); 2] = [
    (Semester::Hk1, &[9, 10, 11, 12, 1]),
    (Semester::Hk2, &[2, 3, 4, 5, 6]),
];

impl Semester {
    /// Month set for the term, or `None` for [`Semester::All`].
    pub fn months(self) -> Option<&'static [u32]> {
        TERM_MONTHS
            .iter()
            .find(|(term, _)| *term == self)
            .map(|(_, months)| *months)
    }

    pub fn contains_month(self, month: u32) -> bool {
        match self.months() {
            Some(months) => months.contains(&month),
            None => true,
        }
    }

    pub fn contains(self, date: DateTime<Utc>) -> bool {
        self.contains_month(date.month())
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Semester::Hk1 => f.write_str("HK1"),
            Semester::Hk2 => f.write_str("HK2"),
            Semester::All => f.write_str("All"),
        }
    }
}

impl FromStr for Semester {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HK1" => Ok(Semester::Hk1),
            "HK2" => Ok(Semester::Hk2),
            "ALL" => Ok(Semester::All),
            other => anyhow::bail!("unknown semester `{other}` (expected HK1, HK2 or all)"),
        }
    }
}

/// Grades dated inside `semester`, in their original order.
pub fn filter_grades(grades: &[GradeRecord], semester: Semester) -> Vec<GradeRecord> {
    grades
        .iter()
        .filter(|g| semester.contains(g.date()))
        .cloned()
        .collect()
}

//! Chart views derived from an already-filtered grade list.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::averages::subject_average;
use crate::models::{GradeRecord, Subject};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonBar {
    pub name: &'static str,
    pub subject: Subject,
    pub score: f64,
    pub fill: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub idx: usize,
    pub date: DateTime<Utc>,
    pub subject: Subject,
    pub score: f64,
    /// Short `dd/mm` label for the x axis.
    pub label: String,
}

pub fn comparison_series(grades: &[GradeRecord]) -> Vec<ComparisonBar> {
    Subject::ALL
        .iter()
        .map(|&subject| ComparisonBar {
            name: subject.display_name(),
            subject,
            score: subject_average(grades, subject),
            fill: subject.chart_color(),
        })
        .collect()
}

pub fn trend_series(grades: &[GradeRecord]) -> Vec<TrendPoint> {
    let mut ordered: Vec<&GradeRecord> = grades.iter().collect();
    // stable: same-timestamp grades keep entry order
    ordered.sort_by_key(|g| g.date());

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, g)| TrendPoint {
            idx: i + 1,
            date: g.date(),
            subject: g.subject(),
            score: g.score(),
            label: g.date().format("%d/%m").to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentOverview {
    pub student_name: String,
    pub semester: String,
    pub comparison: Vec<ComparisonBar>,
    pub trend: Vec<TrendPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExamType;
    use chrono::TimeZone;

    fn at(subject: Subject, score: f64, month: u32, day: u32) -> GradeRecord {
        let date = Utc.with_ymd_and_hms(2025, month, day, 8, 0, 0).unwrap();
        GradeRecord::new(subject, ExamType::Regular, score, 1, date).unwrap()
    }

    #[test]
    fn comparison_has_a_bar_per_subject() {
        let grades = vec![at(Subject::Algebra, 6.0, 10, 1), at(Subject::Algebra, 7.0, 10, 2)];
        let bars = comparison_series(&grades);

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].name, "Đại số");
        assert_eq!(bars[0].score, 6.5);
        assert_eq!(bars[0].fill, "#4F46E5");
        assert_eq!(bars[1].subject, Subject::Geometry);
        assert_eq!(bars[1].score, 0.0);
    }

    #[test]
    fn trend_is_sorted_by_date() {
        let grades = vec![
            at(Subject::Geometry, 9.0, 11, 20),
            at(Subject::Algebra, 5.0, 9, 5),
            at(Subject::Algebra, 7.0, 10, 12),
        ];
        let trend = trend_series(&grades);

        let labels: Vec<&str> = trend.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["05/09", "12/10", "20/11"]);
        assert_eq!(trend.iter().map(|p| p.idx).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(trend[2].subject, Subject::Geometry);
    }

    #[test]
    fn identical_timestamps_keep_entry_order() {
        let first = at(Subject::Algebra, 4.0, 10, 1);
        let second = at(Subject::Geometry, 8.0, 10, 1);
        let trend = trend_series(&[first, second]);
        assert_eq!(trend[0].score, 4.0);
        assert_eq!(trend[1].score, 8.0);
    }

    #[test]
    fn empty_grades_give_empty_trend() {
        assert!(trend_series(&[]).is_empty());
    }
}

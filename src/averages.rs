use std::cmp::Ordering;

use serde::Serialize;
use uuid::Uuid;

use crate::models::{Gradebook, GradeRecord, Student, Subject};
use crate::semester::{filter_grades, Semester};

pub const NOT_AVAILABLE: &str = "N/A";

/// Round half up to one decimal: `floor(10x + 0.5) / 10`.
pub fn round_one_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// Coefficient-weighted mean, `None` when nothing carries weight.
pub fn weighted_average(grades: &[GradeRecord]) -> Option<f64> {
    let total_weight: u64 = grades.iter().map(|g| u64::from(g.coefficient())).sum();
    if total_weight == 0 {
        return None;
    }

    let weighted_sum: f64 = grades
        .iter()
        .map(|g| g.score() * f64::from(g.coefficient()))
        .sum();
    Some(round_one_decimal(weighted_sum / total_weight as f64))
}

/// Plain mean of one subject's scores. Zero when the subject has no grades,
/// so a comparison bar still renders at the baseline.
pub fn subject_average(grades: &[GradeRecord], subject: Subject) -> f64 {
    let scores: Vec<f64> = grades
        .iter()
        .filter(|g| g.subject() == subject)
        .map(GradeRecord::score)
        .collect();
    mean_or_zero(&scores)
}

/// Plain mean over every grade, as shown on a student's list card.
pub fn overall_mean(grades: &[GradeRecord]) -> f64 {
    let scores: Vec<f64> = grades.iter().map(GradeRecord::score).collect();
    mean_or_zero(&scores)
}

fn mean_or_zero(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    round_one_decimal(scores.iter().sum::<f64>() / scores.len() as f64)
}

pub fn format_average(average: Option<f64>) -> String {
    match average {
        Some(value) => format!("{value:.1}"),
        None => NOT_AVAILABLE.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub subject: Subject,
    pub weighted: Option<f64>,
    pub grade_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub student_id: Uuid,
    pub student_name: String,
    pub class_name: Option<String>,
    pub weighted_average: Option<f64>,
    pub subjects: Vec<SubjectAverage>,
    pub grade_count: usize,
    /// Unweighted mean over every grade regardless of semester.
    pub card_mean: f64,
}

pub fn summarize_student(
    student: &Student,
    class_name: Option<&str>,
    semester: Semester,
) -> StudentSummary {
    let grades = filter_grades(&student.grades, semester);
    let subjects = Subject::ALL
        .iter()
        .map(|&subject| {
            let in_subject: Vec<GradeRecord> = grades
                .iter()
                .filter(|g| g.subject() == subject)
                .cloned()
                .collect();
            SubjectAverage {
                subject,
                weighted: weighted_average(&in_subject),
                grade_count: in_subject.len(),
            }
        })
        .collect();

    StudentSummary {
        student_id: student.id,
        student_name: student.name.clone(),
        class_name: class_name.map(str::to_string),
        weighted_average: weighted_average(&grades),
        subjects,
        grade_count: grades.len(),
        card_mean: overall_mean(&student.grades),
    }
}

/// Summaries ranked by weighted average, highest first. Students without an
/// average sink to the bottom; ties fall back to name.
pub fn summarize_students<'a, I>(book: &Gradebook, students: I, semester: Semester) -> Vec<StudentSummary>
where
    I: IntoIterator<Item = &'a Student>,
{
    let mut summaries: Vec<StudentSummary> = students
        .into_iter()
        .map(|student| {
            let class_name = book.class_of(student).map(|c| c.name.as_str());
            summarize_student(student, class_name, semester)
        })
        .collect();

    summaries.sort_by(|a, b| {
        compare_averages(a.weighted_average, b.weighted_average)
            .then_with(|| a.student_name.cmp(&b.student_name))
    });
    summaries
}

fn compare_averages(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

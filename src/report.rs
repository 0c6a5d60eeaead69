use std::fmt::Write;

use crate::averages::{format_average, weighted_average};
use crate::export::safe_file_stem;
use crate::models::Student;
use crate::semester::{filter_grades, Semester};
use crate::transliterate::strip_diacritics;

pub const REPORT_HEADER: [&str; 4] = ["No.", "Name", "Average", "Count"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub number: usize,
    pub name: String,
    pub average: String,
    pub count: usize,
}

impl ReportRow {
    pub fn cells(&self) -> [String; 4] {
        [
            self.number.to_string(),
            self.name.clone(),
            self.average.clone(),
            self.count.to_string(),
        ]
    }
}

/// Printable per-class summary. Title and names are already reduced to
/// ASCII because the PDF sink only carries the standard Latin fonts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassReport {
    pub title: String,
    pub subtitle: String,
    pub rows: Vec<ReportRow>,
}

pub fn build_class_report<'a, I>(class_name: &str, students: I, semester: Semester) -> ClassReport
where
    I: IntoIterator<Item = &'a Student>,
{
    let rows = students
        .into_iter()
        .enumerate()
        .map(|(index, student)| {
            let grades = filter_grades(&student.grades, semester);
            ReportRow {
                number: index + 1,
                name: strip_diacritics(&student.name),
                average: format_average(weighted_average(&grades)),
                count: grades.len(),
            }
        })
        .collect();

    ClassReport {
        title: format!("Class Report - {}", strip_diacritics(class_name)),
        subtitle: format!("Semester: {semester}"),
        rows,
    }
}

/// `Class_Report_<className>.pdf`, with the class name kept as entered.
pub fn report_file_name(class_name: &str) -> String {
    format!("Class_Report_{}.pdf", safe_file_stem(class_name))
}

impl ClassReport {
    /// Fixed-column plain text rendering for terminal previews.
    pub fn to_text(&self) -> String {
        let mut widths = REPORT_HEADER.map(str::len);
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row.cells()) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut output = String::new();
        let _ = writeln!(output, "{}", self.title);
        let _ = writeln!(output, "{}", self.subtitle);
        let _ = writeln!(output);

        let header = REPORT_HEADER.map(str::to_string);
        push_line(&mut output, &header, &widths);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        let _ = writeln!(output, "{}", rule.join("-+-"));

        if self.rows.is_empty() {
            let _ = writeln!(output, "No students in this class.");
        } else {
            for row in &self.rows {
                push_line(&mut output, &row.cells(), &widths);
            }
        }

        output
    }
}

fn push_line(output: &mut String, cells: &[String; 4], widths: &[usize; 4]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    let _ = writeln!(output, "{}", padded.join(" | ").trim_end());
}

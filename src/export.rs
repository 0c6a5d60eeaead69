//! Tabular CSV export.
//!
//! Output is UTF-8 with a leading byte-order mark so spreadsheet tools pick
//! the right encoding for non-ASCII names. Fields are always quoted and
//! embedded quotes are doubled. Text is written exactly as stored; nothing on
//! this path is transliterated.

use std::path::{Path, PathBuf};

use anyhow::Context;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::Serialize;
use tracing::{debug, info};

use crate::averages::{format_average, weighted_average};
use crate::models::{Gradebook, Student};
use crate::semester::{filter_grades, Semester};

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentExportRow {
    pub id: String,
    pub name: String,
    pub class: String,
    pub grade_count: usize,
    pub average: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeExportRow {
    pub student: String,
    pub subject: String,
    pub exam_type: String,
    pub score: f64,
    pub coefficient: u32,
    pub date: String,
}

pub fn student_rows<'a, I>(book: &Gradebook, students: I, semester: Semester) -> Vec<StudentExportRow>
where
    I: IntoIterator<Item = &'a Student>,
{
    students
        .into_iter()
        .map(|student| {
            let grades = filter_grades(&student.grades, semester);
            StudentExportRow {
                id: student.id.to_string(),
                name: student.name.clone(),
                class: book
                    .class_of(student)
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                grade_count: grades.len(),
                average: format_average(weighted_average(&grades)),
            }
        })
        .collect()
}

pub fn grade_rows<'a, I>(students: I, semester: Semester) -> Vec<GradeExportRow>
where
    I: IntoIterator<Item = &'a Student>,
{
    students
        .into_iter()
        .flat_map(|student| {
            filter_grades(&student.grades, semester)
                .into_iter()
                .map(move |g| GradeExportRow {
                    student: student.name.clone(),
                    subject: g.subject().to_string(),
                    exam_type: g.exam_type().to_string(),
                    score: g.score(),
                    coefficient: g.coefficient(),
                    date: g.date().to_rfc3339(),
                })
        })
        .collect()
}

/// Encodes `rows` as CSV. An empty slice yields `None`: there is nothing to
/// export, so no file should be produced.
pub fn export_csv<T: Serialize>(rows: &[T]) -> anyhow::Result<Option<Vec<u8>>> {
    if rows.is_empty() {
        return Ok(None);
    }

    let mut buffer = Vec::from(UTF8_BOM);
    {
        let mut writer = WriterBuilder::new()
            .has_headers(true)
            .quote_style(QuoteStyle::Always)
            .double_quote(true)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(&mut buffer);

        for row in rows {
            writer.serialize(row).context("failed to encode CSV row")?;
        }
        writer.flush().context("failed to flush CSV rows")?;
    }

    debug!(rows = rows.len(), bytes = buffer.len(), "Encoded CSV export");
    Ok(Some(buffer))
}

/// `name` with path separators replaced, so a file built from it stays in
/// the directory it is joined onto.
pub fn safe_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect()
}

pub fn csv_file_name(name: &str) -> String {
    format!("{}.csv", safe_file_stem(name))
}

/// Writes `<dir>/<name>.csv`. Returns `None` without touching the filesystem
/// when there are no rows.
pub fn write_csv_export<T: Serialize>(
    dir: &Path,
    name: &str,
    rows: &[T],
) -> anyhow::Result<Option<PathBuf>> {
    let Some(bytes) = export_csv(rows)? else {
        info!(name, "Nothing to export");
        return Ok(None);
    };

    let path = dir.join(csv_file_name(name));
    std::fs::write(&path, bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), rows = rows.len(), "CSV export written");
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Class, ExamType, GradeRecord, Subject};
    use chrono::{TimeZone, Utc};
    use std::env;
    use std::fs;

    #[derive(Serialize)]
    struct Note {
        title: String,
        body: String,
    }

    fn sample_book() -> Gradebook {
        let class = Class::new("6A1", "6", "2025");
        let mut student = Student::new("Nguyễn An", Some(class.id));
        let date = Utc.with_ymd_and_hms(2025, 11, 4, 8, 0, 0).unwrap();
        student
            .grades
            .push(GradeRecord::new(Subject::Algebra, ExamType::Midterm, 8.0, 2, date).unwrap());
        Gradebook::new(vec![class], vec![student])
    }

    #[test]
    fn empty_export_produces_nothing() {
        let rows: Vec<StudentExportRow> = Vec::new();
        assert!(export_csv(&rows).unwrap().is_none());

        let dir = env::temp_dir();
        assert!(write_csv_export(&dir, "gradebook_empty_export", &rows)
            .unwrap()
            .is_none());
        assert!(!dir.join("gradebook_empty_export.csv").exists());
    }

    #[test]
    fn starts_with_bom_and_header() {
        let book = sample_book();
        let rows = student_rows(&book, book.students(), Semester::Hk1);
        let bytes = export_csv(&rows).unwrap().unwrap();

        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some(r#""id","name","class","gradeCount","average""#)
        );
        let row = lines.next().unwrap();
        assert!(row.contains(r#""Nguyễn An","6A1","1","8.0""#));
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        let rows = vec![Note {
            title: "say \"hi\"".to_string(),
            body: "a,b".to_string(),
        }];
        let bytes = export_csv(&rows).unwrap().unwrap();
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        assert_eq!(text, "\"title\",\"body\"\n\"say \"\"hi\"\"\",\"a,b\"\n");
    }

    #[test]
    fn grade_rows_follow_semester() {
        let book = sample_book();
        assert_eq!(grade_rows(book.students(), Semester::Hk1).len(), 1);
        assert!(grade_rows(book.students(), Semester::Hk2).is_empty());
    }

    #[test]
    fn file_names_cannot_escape_the_directory() {
        assert_eq!(csv_file_name("../secret"), ".._secret.csv");
        assert_eq!(csv_file_name("a\\b/c"), "a_b_c.csv");
        assert_eq!(csv_file_name("Lớp 6A1"), "Lớp 6A1.csv");

        let book = sample_book();
        let rows = grade_rows(book.students(), Semester::All);
        let dir = env::temp_dir().join("gradebook_export_nested");
        fs::create_dir_all(&dir).unwrap();
        let path = write_csv_export(&dir, "../gradebook_escape", &rows)
            .unwrap()
            .unwrap();

        assert_eq!(path.parent(), Some(dir.as_path()));
        assert!(path.ends_with(".._gradebook_escape.csv"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn writes_named_file() {
        let book = sample_book();
        let rows = grade_rows(book.students(), Semester::All);
        let dir = env::temp_dir();
        let path = write_csv_export(&dir, "gradebook_export_test", &rows)
            .unwrap()
            .unwrap();

        assert!(path.ends_with("gradebook_export_test.csv"));
        let content = fs::read(&path).unwrap();
        assert!(content.starts_with(UTF8_BOM));
        fs::remove_file(&path).unwrap();
    }
}

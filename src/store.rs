use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Class, ExamType, GradeRecord, Gradebook, Student, Subject};

pub fn load_gradebook(path: &Path) -> anyhow::Result<Gradebook> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read gradebook {}", path.display()))?;
    let book: Gradebook = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse gradebook {}", path.display()))?;
    debug!(
        path = %path.display(),
        classes = book.classes().len(),
        students = book.students().len(),
        "Gradebook loaded"
    );
    Ok(book)
}

pub fn save_gradebook(path: &Path, book: &Gradebook) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(book)?;
    std::fs::write(path, content)
        .with_context(|| format!("failed to write gradebook {}", path.display()))?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    student_name: String,
    class_name: Option<String>,
    subject: String,
    exam_type: String,
    score: f64,
    coefficient: u32,
    date: NaiveDate,
}

/// Appends grades from a CSV file to `book`.
///
/// Students are matched by exact name. A missing student is created in the
/// class the row names, and that class is created on first use. For a known
/// student the class column must be blank or name the class they are already
/// in. Returns the new book and the number of grades added.
pub fn import_grades_csv(book: &Gradebook, csv_path: &Path) -> anyhow::Result<(Gradebook, usize)> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut book = book.clone();
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV row {}", line + 1))?;
        let class_name = row.class_name.as_deref().map(str::trim).filter(|n| !n.is_empty());

        let existing = book.students().iter().find(|s| s.name == row.student_name);
        let student_id = match existing {
            Some(student) => {
                let current = book.class_of(student).map(|c| c.name.as_str());
                if let Some(name) = class_name {
                    if current != Some(name) {
                        anyhow::bail!(
                            "CSV row {}: student `{}` is in class `{}`, not `{name}`",
                            line + 1,
                            student.name,
                            current.unwrap_or("unassigned")
                        );
                    }
                }
                student.id
            }
            None => {
                let (updated, class_id) = ensure_class(&book, class_name)?;
                let student = Student::new(row.student_name.clone(), class_id);
                let id = student.id;
                book = updated.add_student(student)?;
                id
            }
        };

        let grade = GradeRecord::new(
            row.subject.parse::<Subject>()?,
            row.exam_type.parse::<ExamType>()?,
            row.score,
            row.coefficient,
            at_morning(row.date),
        )
        .with_context(|| format!("invalid grade on CSV row {}", line + 1))?;

        book = book.record_grade(student_id, grade)?;
        inserted += 1;
    }

    info!(path = %csv_path.display(), inserted, "Grades imported");
    Ok((book, inserted))
}

/// Looks a class up by name, creating it when missing.
fn ensure_class(book: &Gradebook, name: Option<&str>) -> anyhow::Result<(Gradebook, Option<Uuid>)> {
    let Some(name) = name else {
        return Ok((book.clone(), None));
    };
    if let Some(class) = book.class_by_name(name) {
        return Ok((book.clone(), Some(class.id)));
    }
    let class = Class::new(name, "", "");
    let id = class.id;
    debug!(class = name, "Creating class from import");
    Ok((book.add_class(class)?, Some(id)))
}

fn at_morning(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(8, 0, 0).unwrap_or_default())
}

/// A small class list with grades spread over both terms.
pub fn seed() -> anyhow::Result<Gradebook> {
    let classes = vec![Class::new("6A1", "6", "2025"), Class::new("7A2", "7", "2025")];
    let roster = [
        ("Nguyễn Văn An", 0usize, "Đạt 8.0 môn Toán"),
        ("Trần Thị Bình", 0, ""),
        ("Lê Hoàng Châu", 1, "Cải thiện Hình học"),
    ];
    let grades: [(usize, Subject, ExamType, f64, u32, (i32, u32, u32)); 9] = [
        (0, Subject::Algebra, ExamType::Regular, 7.5, 1, (2025, 9, 15)),
        (0, Subject::Geometry, ExamType::Regular, 6.0, 1, (2025, 10, 2)),
        (0, Subject::Algebra, ExamType::Midterm, 8.0, 2, (2025, 11, 10)),
        (0, Subject::Geometry, ExamType::Final, 7.0, 3, (2026, 1, 8)),
        (1, Subject::Algebra, ExamType::Regular, 9.0, 1, (2025, 9, 20)),
        (1, Subject::Geometry, ExamType::Midterm, 8.5, 2, (2025, 11, 12)),
        (1, Subject::Algebra, ExamType::Regular, 9.5, 1, (2026, 2, 24)),
        (2, Subject::Geometry, ExamType::Regular, 5.0, 1, (2025, 12, 1)),
        (2, Subject::Algebra, ExamType::Midterm, 6.5, 2, (2026, 3, 18)),
    ];

    let mut students: Vec<Student> = roster
        .iter()
        .map(|(name, class_index, goal)| {
            let mut student = Student::new(*name, Some(classes[*class_index].id));
            if !goal.is_empty() {
                student.target_goal = Some(goal.to_string());
            }
            student
        })
        .collect();

    for (student_index, subject, exam_type, score, coefficient, (y, m, d)) in grades {
        let date = NaiveDate::from_ymd_opt(y, m, d).context("invalid seed date")?;
        let grade = GradeRecord::new(subject, exam_type, score, coefficient, at_morning(date))?;
        students[student_index].grades.push(grade);
    }

    Ok(Gradebook::new(classes, students))
}

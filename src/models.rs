use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GradeError, GradebookError};

pub const MAX_SCORE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subject {
    Algebra,
    Geometry,
}

impl Subject {
    pub const ALL: [Subject; 2] = [Subject::Algebra, Subject::Geometry];

    /// Label shown on the comparison chart.
    pub fn display_name(self) -> &'static str {
        match self {
            Subject::Algebra => "Đại số",
            Subject::Geometry => "Hình học",
        }
    }

    pub fn chart_color(self) -> &'static str {
        match self {
            Subject::Algebra => "#4F46E5",
            Subject::Geometry => "#10B981",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Algebra => f.write_str("Algebra"),
            Subject::Geometry => f.write_str("Geometry"),
        }
    }
}

impl FromStr for Subject {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "algebra" => Ok(Subject::Algebra),
            "geometry" => Ok(Subject::Geometry),
            other => anyhow::bail!("unknown subject `{other}`"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExamType {
    Regular,
    Midterm,
    Final,
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExamType::Regular => f.write_str("Regular"),
            ExamType::Midterm => f.write_str("Midterm"),
            ExamType::Final => f.write_str("Final"),
        }
    }
}

impl FromStr for ExamType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regular" => Ok(ExamType::Regular),
            "midterm" => Ok(ExamType::Midterm),
            "final" => Ok(ExamType::Final),
            other => anyhow::bail!("unknown exam type `{other}`"),
        }
    }
}

/// One graded assessment. Immutable once built; corrections are new records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGradeRecord", rename_all = "camelCase")]
pub struct GradeRecord {
    id: Uuid,
    subject: Subject,
    exam_type: ExamType,
    score: f64,
    coefficient: u32,
    date: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGradeRecord {
    id: Option<Uuid>,
    subject: Subject,
    exam_type: ExamType,
    score: f64,
    coefficient: u32,
    date: DateTime<Utc>,
}

impl TryFrom<RawGradeRecord> for GradeRecord {
    type Error = GradeError;

    fn try_from(raw: RawGradeRecord) -> Result<Self, Self::Error> {
        let mut record =
            GradeRecord::new(raw.subject, raw.exam_type, raw.score, raw.coefficient, raw.date)?;
        if let Some(id) = raw.id {
            record.id = id;
        }
        Ok(record)
    }
}

impl GradeRecord {
    pub fn new(
        subject: Subject,
        exam_type: ExamType,
        score: f64,
        coefficient: u32,
        date: DateTime<Utc>,
    ) -> Result<Self, GradeError> {
        if !(0.0..=MAX_SCORE).contains(&score) {
            return Err(GradeError::ScoreOutOfRange(score));
        }
        if coefficient == 0 {
            return Err(GradeError::ZeroCoefficient);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            subject,
            exam_type,
            score,
            coefficient,
            date,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subject(&self) -> Subject {
        self.subject
    }

    pub fn exam_type(&self) -> ExamType {
        self.exam_type
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn coefficient(&self) -> u32 {
        self.coefficient
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub class_id: Option<Uuid>,
    #[serde(default)]
    pub grades: Vec<GradeRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Student {
    /// A fresh student always starts with an empty grade list.
    pub fn new(name: impl Into<String>, class_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            class_id,
            grades: Vec::new(),
            target_goal: None,
            notes: None,
        }
    }

    /// Copy of this student with `grade` appended.
    pub fn with_grade(&self, grade: GradeRecord) -> Self {
        let mut grades = self.grades.clone();
        grades.push(grade);
        Self {
            grades,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: Uuid,
    pub name: String,
    pub grade_level: String,
    pub year: String,
}

impl Class {
    pub fn new(
        name: impl Into<String>,
        grade_level: impl Into<String>,
        year: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            grade_level: grade_level.into(),
            year: year.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassFilter {
    All,
    Unassigned,
    Class(Uuid),
}

impl ClassFilter {
    pub fn matches(&self, student: &Student) -> bool {
        match self {
            ClassFilter::All => true,
            ClassFilter::Unassigned => student.class_id.is_none(),
            ClassFilter::Class(id) => student.class_id == Some(*id),
        }
    }
}

/// Classes and students as immutable value sequences.
///
/// Every mutation returns a new book; the receiver is left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gradebook {
    #[serde(default)]
    classes: Vec<Class>,
    #[serde(default)]
    students: Vec<Student>,
}

impl Gradebook {
    pub fn new(classes: Vec<Class>, students: Vec<Student>) -> Self {
        Self { classes, students }
    }

    pub fn classes(&self) -> &[Class] {
        &self.classes
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn student(&self, id: Uuid) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn class(&self, id: Uuid) -> Option<&Class> {
        self.classes.iter().find(|c| c.id == id)
    }

    pub fn class_by_name(&self, name: &str) -> Option<&Class> {
        self.classes.iter().find(|c| c.name == name)
    }

    /// Resolves a student by id or, failing that, by exact name.
    pub fn lookup_student(&self, key: &str) -> Option<&Student> {
        if let Ok(id) = Uuid::parse_str(key) {
            if let Some(student) = self.student(id) {
                return Some(student);
            }
        }
        self.students.iter().find(|s| s.name == key)
    }

    pub fn class_of(&self, student: &Student) -> Option<&Class> {
        student.class_id.and_then(|id| self.class(id))
    }

    pub fn members(&self, filter: ClassFilter) -> Vec<&Student> {
        self.students.iter().filter(|s| filter.matches(s)).collect()
    }

    /// Students matching `filter` whose name contains `search`, ignoring case.
    pub fn find_students(&self, filter: ClassFilter, search: &str) -> Vec<&Student> {
        let needle = search.to_lowercase();
        self.students
            .iter()
            .filter(|s| filter.matches(s) && s.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Adds a newly created student. Ids must be unique and the grade list
    /// starts empty; grades arrive through [`Gradebook::record_grade`].
    pub fn add_student(&self, student: Student) -> Result<Self, GradebookError> {
        if self.student(student.id).is_some() {
            return Err(GradebookError::DuplicateStudent(student.id));
        }
        if !student.grades.is_empty() {
            return Err(GradebookError::GradesOnCreate(student.id));
        }
        let mut students = self.students.clone();
        students.push(student);
        Ok(Self {
            classes: self.classes.clone(),
            students,
        })
    }

    /// Replaces the stored student carrying `student.id`, grade list included.
    pub fn update_student(&self, student: Student) -> Result<Self, GradebookError> {
        if self.student(student.id).is_none() {
            return Err(GradebookError::UnknownStudent(student.id));
        }
        let students = self
            .students
            .iter()
            .map(|old| {
                if old.id == student.id {
                    student.clone()
                } else {
                    old.clone()
                }
            })
            .collect();
        Ok(Self {
            classes: self.classes.clone(),
            students,
        })
    }

    pub fn record_grade(&self, student_id: Uuid, grade: GradeRecord) -> Result<Self, GradebookError> {
        let student = self
            .student(student_id)
            .ok_or(GradebookError::UnknownStudent(student_id))?;
        self.update_student(student.with_grade(grade))
    }

    pub fn delete_student(&self, id: Uuid) -> Result<Self, GradebookError> {
        if self.student(id).is_none() {
            return Err(GradebookError::UnknownStudent(id));
        }
        Ok(Self {
            classes: self.classes.clone(),
            students: self.students.iter().filter(|s| s.id != id).cloned().collect(),
        })
    }

    pub fn add_class(&self, class: Class) -> Result<Self, GradebookError> {
        if self.class(class.id).is_some() {
            return Err(GradebookError::DuplicateClass(class.id));
        }
        let mut classes = self.classes.clone();
        classes.push(class);
        Ok(Self {
            classes,
            students: self.students.clone(),
        })
    }

    pub fn update_class(&self, class: Class) -> Result<Self, GradebookError> {
        if self.class(class.id).is_none() {
            return Err(GradebookError::UnknownClass(class.id));
        }
        let classes = self
            .classes
            .iter()
            .map(|old| if old.id == class.id { class.clone() } else { old.clone() })
            .collect();
        Ok(Self {
            classes,
            students: self.students.clone(),
        })
    }

    /// Removes the class; its students stay in the book as unassigned.
    pub fn delete_class(&self, id: Uuid) -> Result<Self, GradebookError> {
        if self.class(id).is_none() {
            return Err(GradebookError::UnknownClass(id));
        }
        let students = self
            .students
            .iter()
            .map(|s| {
                if s.class_id == Some(id) {
                    Student {
                        class_id: None,
                        ..s.clone()
                    }
                } else {
                    s.clone()
                }
            })
            .collect();
        Ok(Self {
            classes: self.classes.iter().filter(|c| c.id != id).cloned().collect(),
            students,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn grade(score: f64) -> GradeRecord {
        let date = Utc.with_ymd_and_hms(2025, 10, 3, 8, 0, 0).unwrap();
        GradeRecord::new(Subject::Algebra, ExamType::Regular, score, 1, date).unwrap()
    }

    fn sample_book() -> (Gradebook, Uuid, Uuid) {
        let class = Class::new("6A1", "6", "2025");
        let class_id = class.id;
        let student = Student::new("Nguyễn An", Some(class_id));
        let student_id = student.id;
        let book = Gradebook::default()
            .add_class(class)
            .and_then(|b| b.add_student(student))
            .unwrap();
        (book, class_id, student_id)
    }

    #[test]
    fn rejects_invalid_grades() {
        let date = Utc::now();
        assert_eq!(
            GradeRecord::new(Subject::Algebra, ExamType::Final, 10.5, 1, date),
            Err(GradeError::ScoreOutOfRange(10.5))
        );
        assert_eq!(
            GradeRecord::new(Subject::Algebra, ExamType::Final, 8.0, 0, date),
            Err(GradeError::ZeroCoefficient)
        );
        assert!(GradeRecord::new(Subject::Algebra, ExamType::Final, f64::NAN, 1, date).is_err());
    }

    #[test]
    fn deserializing_validates_records() {
        let bad = r#"{"subject":"Algebra","examType":"Regular","score":7,"coefficient":0,"date":"2025-10-03T08:00:00Z"}"#;
        assert!(serde_json::from_str::<GradeRecord>(bad).is_err());

        let good = r#"{"subject":"Geometry","examType":"Midterm","score":7.5,"coefficient":2,"date":"2025-10-03T08:00:00Z"}"#;
        let record: GradeRecord = serde_json::from_str(good).unwrap();
        assert_eq!(record.subject(), Subject::Geometry);
        assert_eq!(record.coefficient(), 2);
    }

    #[test]
    fn record_grade_leaves_previous_book_untouched() {
        let (book, _, student_id) = sample_book();
        let updated = book.record_grade(student_id, grade(9.0)).unwrap();

        assert!(book.student(student_id).unwrap().grades.is_empty());
        assert_eq!(updated.student(student_id).unwrap().grades.len(), 1);
    }

    #[test]
    fn grades_keep_insertion_order() {
        let (book, _, student_id) = sample_book();
        let first = grade(4.0);
        let second = grade(6.0);
        let book = book
            .record_grade(student_id, first.clone())
            .and_then(|b| b.record_grade(student_id, second.clone()))
            .unwrap();

        let grades = &book.student(student_id).unwrap().grades;
        assert_eq!(grades, &vec![first, second]);
    }

    #[test]
    fn deleting_class_unassigns_students() {
        let (book, class_id, student_id) = sample_book();
        let updated = book.delete_class(class_id).unwrap();

        assert!(updated.classes().is_empty());
        assert_eq!(updated.student(student_id).unwrap().class_id, None);
        assert_eq!(updated.members(ClassFilter::Unassigned).len(), 1);
    }

    #[test]
    fn deleting_student_drops_its_grades() {
        let (book, _, student_id) = sample_book();
        let book = book.record_grade(student_id, grade(5.0)).unwrap();
        let updated = book.delete_student(student_id).unwrap();
        assert!(updated.students().is_empty());
    }

    #[test]
    fn unknown_ids_are_reported() {
        let (book, _, _) = sample_book();
        let missing = Uuid::new_v4();
        assert_eq!(
            book.delete_student(missing),
            Err(GradebookError::UnknownStudent(missing))
        );
        assert_eq!(
            book.delete_class(missing),
            Err(GradebookError::UnknownClass(missing))
        );
    }

    #[test]
    fn adding_an_existing_id_is_rejected() {
        let (book, class_id, student_id) = sample_book();
        let twin = book.student(student_id).unwrap().clone();
        assert_eq!(
            book.add_student(twin),
            Err(GradebookError::DuplicateStudent(student_id))
        );

        let class = book.class(class_id).unwrap().clone();
        assert_eq!(book.add_class(class), Err(GradebookError::DuplicateClass(class_id)));

        // renaming still touches exactly one student
        let renamed = Student {
            name: "Bình".to_string(),
            ..book.student(student_id).unwrap().clone()
        };
        let updated = book.update_student(renamed).unwrap();
        assert_eq!(updated.students().len(), 1);
        assert_eq!(updated.student(student_id).unwrap().name, "Bình");
    }

    #[test]
    fn new_students_start_without_grades() {
        let (book, _, _) = sample_book();
        let student = Student::new("Lê Chi", None).with_grade(grade(7.0));
        let id = student.id;
        assert_eq!(book.add_student(student), Err(GradebookError::GradesOnCreate(id)));
    }

    #[test]
    fn search_ignores_case_and_respects_filter() {
        let (book, class_id, _) = sample_book();
        let book = book.add_student(Student::new("Trần Bình", None)).unwrap();

        assert_eq!(book.find_students(ClassFilter::All, "bÌnh").len(), 1);
        assert_eq!(book.find_students(ClassFilter::Class(class_id), "bình").len(), 0);
        assert_eq!(book.find_students(ClassFilter::Class(class_id), "").len(), 1);
    }

    #[test]
    fn lookup_accepts_name_or_id() {
        let (book, _, student_id) = sample_book();
        assert_eq!(book.lookup_student("Nguyễn An").map(|s| s.id), Some(student_id));
        assert_eq!(
            book.lookup_student(&student_id.to_string()).map(|s| s.id),
            Some(student_id)
        );
        assert!(book.lookup_student("nobody").is_none());
    }
}

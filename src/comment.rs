//! AI-written report comments.
//!
//! The text model is an external collaborator behind [`CommentGenerator`].
//! [`CommentService`] never lets a failure escape: a missing credential or a
//! provider error becomes one of two fixed messages, with the detail logged.
//! [`CommentSlot`] holds at most one request in flight.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::averages::{format_average, weighted_average};
use crate::config::Settings;
use crate::error::CommentError;
use crate::models::{Gradebook, GradeRecord, Student, Subject};
use crate::semester::{filter_grades, Semester};

pub const MISSING_API_KEY_MESSAGE: &str =
    "Error: no AI API key is configured. Set GEMINI_API_KEY in the environment or in a .env file.";
pub const SERVICE_ERROR_MESSAGE: &str =
    "Could not reach the AI service. Check the API key and your internet connection.";
pub const DEFAULT_TARGET_GOAL: &str = "Chưa thiết lập";
pub const DEFAULT_GRADE_LEVEL: &str = "6";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRequest {
    pub student_name: String,
    pub grades_summary: String,
    pub teacher_notes: String,
    pub grade_level: String,
    pub semester: String,
    pub target_goal: Option<String>,
    pub daily_log_summary: Option<String>,
}

impl CommentRequest {
    /// Request for `student`, summarising only the grades inside `semester`.
    pub fn for_student(
        book: &Gradebook,
        student: &Student,
        semester: Semester,
        teacher_notes: impl Into<String>,
    ) -> Self {
        let grades = filter_grades(&student.grades, semester);
        let grade_level = book
            .class_of(student)
            .map(|c| c.grade_level.clone())
            .unwrap_or_else(|| DEFAULT_GRADE_LEVEL.to_string());

        Self {
            student_name: student.name.clone(),
            grades_summary: grades_summary_for(&grades),
            teacher_notes: teacher_notes.into(),
            grade_level,
            semester: semester.to_string(),
            target_goal: student.target_goal.clone(),
            daily_log_summary: None,
        }
    }
}

/// One clause per subject: weighted average and how many grades it rests on.
pub fn grades_summary_for(grades: &[GradeRecord]) -> String {
    Subject::ALL
        .iter()
        .map(|&subject| {
            let in_subject: Vec<GradeRecord> = grades
                .iter()
                .filter(|g| g.subject() == subject)
                .cloned()
                .collect();
            format!(
                "{}: {} ({} đầu điểm)",
                subject.display_name(),
                format_average(weighted_average(&in_subject)),
                in_subject.len()
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn build_prompt(request: &CommentRequest) -> String {
    let target_goal = request
        .target_goal
        .as_deref()
        .filter(|goal| !goal.trim().is_empty())
        .unwrap_or(DEFAULT_TARGET_GOAL);
    let daily_log = request.daily_log_summary.as_deref().unwrap_or("");

    format!(
        "Bạn là giáo viên chủ nhiệm tận tâm. Viết nhận xét cho học sinh \"{name}\" \
         (lớp {grade_level}), học kì {semester}.\n\
         Thông tin:\n\
         - Mục tiêu: \"{target_goal}\"\n\
         - Điểm số: {grades}\n\
         - Nhật ký: {daily_log}\n\
         - Ghi chú của giáo viên: \"{notes}\"\n\
         Yêu cầu: đánh giá kiến thức, kỹ năng và thái độ; đưa ra 2-3 lời khuyên cụ thể; \
         giọng văn ân cần; dưới 200 chữ.",
        name = request.student_name,
        grade_level = request.grade_level,
        semester = request.semester,
        grades = request.grades_summary,
        notes = request.teacher_notes,
    )
}

/// Text-generation backend for comments.
#[async_trait]
pub trait CommentGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, CommentError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

fn extract_text(response: GenerateResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Google Gemini `generateContent` over HTTPS.
pub struct GeminiGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(settings: &Settings, api_key: impl Into<String>) -> Result<Self, CommentError> {
        let client = reqwest::Client::builder()
            .timeout(settings.http_timeout)
            .build()?;
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            settings.gemini_api_base, settings.gemini_model
        );

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl CommentGenerator for GeminiGenerator {
    #[tracing::instrument(level = "debug", skip(self, prompt))]
    async fn generate(&self, prompt: &str) -> Result<String, CommentError> {
        debug!(endpoint = %self.endpoint, prompt_chars = prompt.chars().count(), "Requesting comment");
        let body = GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CommentError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        debug!(candidates = parsed.candidates.len(), "Comment service responded");
        extract_text(parsed).ok_or(CommentError::EmptyResponse)
    }
}

/// Stands in for a client that could not be built; every call fails.
struct Unavailable {
    reason: String,
}

#[async_trait]
impl CommentGenerator for Unavailable {
    async fn generate(&self, _prompt: &str) -> Result<String, CommentError> {
        Err(CommentError::Unavailable(self.reason.clone()))
    }
}

/// What ends up in place of the comment placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentOutcome {
    Generated(String),
    Failed(&'static str),
}

impl CommentOutcome {
    pub fn text(&self) -> &str {
        match self {
            CommentOutcome::Generated(text) => text,
            CommentOutcome::Failed(message) => message,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, CommentOutcome::Generated(_))
    }
}

impl fmt::Display for CommentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

pub struct CommentService {
    generator: Option<Box<dyn CommentGenerator>>,
}

impl CommentService {
    /// `None` means no credential: requests fail fast without any call.
    pub fn new(generator: Option<Box<dyn CommentGenerator>>) -> Self {
        Self { generator }
    }

    /// A configured key whose client cannot be built still yields a service;
    /// its requests fail with the generic service message.
    pub fn from_settings(settings: &Settings) -> Self {
        let generator = settings
            .gemini_api_key
            .as_ref()
            .map(|key| usable_generator(GeminiGenerator::new(settings, key.clone())));
        Self::new(generator)
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    pub async fn generate(&self, request: &CommentRequest) -> CommentOutcome {
        let Some(generator) = &self.generator else {
            warn!(student = %request.student_name, "Comment requested without an API key");
            return CommentOutcome::Failed(MISSING_API_KEY_MESSAGE);
        };

        match generator.generate(&build_prompt(request)).await {
            Ok(text) => {
                info!(student = %request.student_name, chars = text.chars().count(), "Comment generated");
                CommentOutcome::Generated(text)
            }
            Err(CommentError::MissingApiKey) => CommentOutcome::Failed(MISSING_API_KEY_MESSAGE),
            Err(err) => {
                error!(student = %request.student_name, error = %err, "Comment service failed");
                CommentOutcome::Failed(SERVICE_ERROR_MESSAGE)
            }
        }
    }
}

fn usable_generator(built: Result<GeminiGenerator, CommentError>) -> Box<dyn CommentGenerator> {
    match built {
        Ok(gemini) => Box::new(gemini),
        Err(err) => {
            error!(error = %err, "Could not build the comment service client");
            Box::new(Unavailable {
                reason: err.to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    InFlight,
    Done(String),
    Failed(String),
}

/// Single-slot request holder. A second request while one is in flight is
/// rejected with [`CommentError::Busy`]; nothing is queued.
#[derive(Debug, Default)]
pub struct CommentSlot {
    state: Mutex<RequestState>,
}

/// Marks the slot busy until finished. Dropping it unfinished frees the slot.
#[must_use]
pub struct InFlight<'a> {
    slot: &'a CommentSlot,
    finished: bool,
}

impl CommentSlot {
    fn lock(&self) -> MutexGuard<'_, RequestState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> RequestState {
        self.lock().clone()
    }

    pub fn begin(&self) -> Result<InFlight<'_>, CommentError> {
        let mut state = self.lock();
        if *state == RequestState::InFlight {
            return Err(CommentError::Busy);
        }
        *state = RequestState::InFlight;
        Ok(InFlight {
            slot: self,
            finished: false,
        })
    }

    pub async fn run(
        &self,
        service: &CommentService,
        request: &CommentRequest,
    ) -> Result<CommentOutcome, CommentError> {
        let ticket = self.begin()?;
        let outcome = service.generate(request).await;
        ticket.finish(&outcome);
        Ok(outcome)
    }
}

impl InFlight<'_> {
    pub fn finish(mut self, outcome: &CommentOutcome) {
        *self.slot.lock() = match outcome {
            CommentOutcome::Generated(text) => RequestState::Done(text.clone()),
            CommentOutcome::Failed(message) => RequestState::Failed((*message).to_string()),
        };
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            *self.slot.lock() = RequestState::Idle;
        }
    }
}

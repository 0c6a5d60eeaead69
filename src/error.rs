use uuid::Uuid;

/// Rejected while constructing a [`crate::models::GradeRecord`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GradeError {
    #[error("score {0} is outside the 0-10 scale")]
    ScoreOutOfRange(f64),
    #[error("coefficient must be a positive integer")]
    ZeroCoefficient,
}

/// Rejected changes to a [`crate::models::Gradebook`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GradebookError {
    #[error("no student with id {0}")]
    UnknownStudent(Uuid),
    #[error("no class with id {0}")]
    UnknownClass(Uuid),
    #[error("a student with id {0} already exists")]
    DuplicateStudent(Uuid),
    #[error("a class with id {0} already exists")]
    DuplicateClass(Uuid),
    #[error("new student {0} must start without grades")]
    GradesOnCreate(Uuid),
}

/// Failures at the AI comment boundary.
///
/// None of these reach the user verbatim; [`crate::comment::CommentService`]
/// logs them and shows one of the fixed messages instead.
#[derive(thiserror::Error, Debug)]
pub enum CommentError {
    #[error("no API key configured for the comment service")]
    MissingApiKey,
    #[error("a comment request is already in flight")]
    Busy,
    #[error("request to the comment service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("comment service answered with status {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("comment service response had no text")]
    EmptyResponse,
    #[error("comment service client is unavailable: {0}")]
    Unavailable(String),
}

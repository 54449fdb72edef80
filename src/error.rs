use thiserror::Error;

/// Reasons a user action against the quiz engine is rejected.
///
/// None of these are fatal: state is left untouched and the user simply
/// has to try again with a fresh action.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuizError {
    #[error("upload limit reached")]
    RateLimitExceeded,
    #[error("extracted text is too short to build a quiz")]
    ExtractionInsufficient,
    #[error("invalid question count: {0:?}")]
    InvalidInput(String),
    #[error("no active session for user")]
    NoActiveSession,
}

/// Errors raised while pulling plain text out of an uploaded document.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported document format: {0:?}")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Archive(#[from] zip::result::ZipError),
    #[error("failed to read PDF: {0}")]
    Pdf(String),
    #[error("presentation has no slides")]
    NoSlides,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),
    #[error("environment variable {var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

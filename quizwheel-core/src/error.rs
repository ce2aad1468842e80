//! Error types shared by the wheel and quiz subsystems.
use chrono::{DateTime, FixedOffset};
use thiserror::Error;

/// Failures raised by a ledger or quiz store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("corrupt row for {key}: {detail}")]
    CorruptRow { key: String, detail: String },
}

/// Reasons an identifier fails boundary validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdentifierIssue {
    #[error("identifier exceeds {max} characters")]
    TooLong { max: usize },
    #[error("identifier contains control characters")]
    ControlCharacters,
    #[error("identifier has leading or trailing whitespace")]
    SurroundingWhitespace,
}

/// Errors surfaced by the daily wheel.
#[derive(Debug, Error)]
pub enum WheelError {
    #[error("userIdentifier is required")]
    MissingIdentifier,
    #[error("invalid userIdentifier: {0}")]
    InvalidIdentifier(#[from] IdentifierIssue),
    #[error("already played today; next spin available at {next_eligible_at}")]
    AlreadySpunToday {
        next_eligible_at: DateTime<FixedOffset>,
    },
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),
}

impl WheelError {
    /// Only storage failures are worth retrying; everything else is final for the day.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

/// Errors raised while validating or persisting a quiz result.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("quizId is required")]
    MissingQuizId,
    #[error("quizId exceeds {max} characters")]
    QuizIdTooLong { max: usize },
    #[error("maxScore must be greater than zero")]
    ZeroMaxScore,
    #[error("score {score} exceeds maxScore {max_score}")]
    ScoreExceedsMax { score: u32, max_score: u32 },
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),
}

/// Errors raised when wheel configuration invariants are violated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("win_odds must be at least 1 (got {0})")]
    ZeroOdds(u32),
    #[error("utc_offset_minutes must be within ±1080 (got {0})")]
    OffsetOutOfRange(i32),
    #[error("max_identifier_len must be at least 1")]
    ZeroIdentifierLen,
}

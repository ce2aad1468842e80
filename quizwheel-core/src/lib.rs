//! Quiz Wheel Core
//!
//! Platform-agnostic logic for the quiz backend: quiz result storage and
//! statistics, plus the once-per-day wheel of fortune with its per-identifier
//! spin ledger. This crate has no HTTP or process concerns.

pub mod calendar;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod identifier;
pub mod ledger;
pub mod quiz;
pub mod sqlite;
pub mod wheel;

// Re-export commonly used types
pub use calendar::{Clock, FixedClock, SystemClock, next_eligible_at, start_of_day, utc_offset};
pub use config::{LoadConfigError, WIN_ODDS, WheelConfig, load_config};
pub use eligibility::{Eligibility, can_spin};
pub use error::{ConfigError, IdentifierIssue, QuizError, StorageError, WheelError};
pub use identifier::{DEFAULT_MAX_IDENTIFIER_LEN, Identifier};
pub use ledger::{LedgerStore, MemoryLedger, SpinCommit, SpinLedgerEntry};
pub use quiz::{MemoryQuizStore, QuizResult, QuizStats, QuizStore, QuizSubmission};
pub use sqlite::SqliteStore;
pub use wheel::{SpinOutcome, Wheel, draw_outcome};

/// Records quiz results against a [`QuizStore`].
pub struct QuizBook<Q>
where
    Q: QuizStore,
{
    store: Q,
}

impl<Q> QuizBook<Q>
where
    Q: QuizStore,
{
    pub const fn new(store: Q) -> Self {
        Self { store }
    }

    /// Validate and persist a submission.
    ///
    /// # Errors
    ///
    /// Returns a `QuizError` for invalid submissions (nothing is stored) or
    /// when the store fails.
    pub fn record(&self, submission: QuizSubmission) -> Result<QuizResult, QuizError> {
        let result = submission.validate(chrono::Utc::now())?;
        self.store.insert(&result)?;
        log::info!(
            "recorded quiz result for {}: {}/{}",
            result.quiz_id,
            result.score,
            result.max_score
        );
        Ok(result)
    }

    /// Aggregate statistics per quiz.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` when the store cannot be read.
    pub fn stats(&self) -> Result<Vec<QuizStats>, QuizError> {
        Ok(self.store.stats()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_book_stores_only_valid_submissions() {
        let book = QuizBook::new(MemoryQuizStore::new());
        let bad = QuizSubmission {
            quiz_id: "capitals".to_string(),
            score: 11,
            max_score: 10,
            duration_secs: None,
        };
        assert!(matches!(
            book.record(bad),
            Err(QuizError::ScoreExceedsMax { .. })
        ));
        assert!(book.stats().unwrap().is_empty());

        let good = QuizSubmission {
            quiz_id: " capitals ".to_string(),
            score: 10,
            max_score: 10,
            duration_secs: Some(12),
        };
        let stored = book.record(good).unwrap();
        assert_eq!(stored.quiz_id, "capitals");
        let stats = book.stats().unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].perfect_scores, 1);
    }
}

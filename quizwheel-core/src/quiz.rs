//! Quiz result recording and aggregate statistics.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::{QuizError, StorageError};

/// Upper bound on `quiz_id` length, in characters.
pub const MAX_QUIZ_ID_LEN: usize = 64;

/// Result as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmission {
    #[serde(default)]
    pub quiz_id: String,
    pub score: u32,
    pub max_score: u32,
    #[serde(default)]
    pub duration_secs: Option<u32>,
}

impl QuizSubmission {
    /// Check the submission and stamp it with `recorded_at`.
    ///
    /// # Errors
    ///
    /// Returns a `QuizError` describing the first rule the submission breaks.
    pub fn validate(self, recorded_at: DateTime<Utc>) -> Result<QuizResult, QuizError> {
        let quiz_id = self.quiz_id.trim().to_string();
        if quiz_id.is_empty() {
            return Err(QuizError::MissingQuizId);
        }
        if quiz_id.chars().count() > MAX_QUIZ_ID_LEN {
            return Err(QuizError::QuizIdTooLong {
                max: MAX_QUIZ_ID_LEN,
            });
        }
        if self.max_score == 0 {
            return Err(QuizError::ZeroMaxScore);
        }
        if self.score > self.max_score {
            return Err(QuizError::ScoreExceedsMax {
                score: self.score,
                max_score: self.max_score,
            });
        }
        Ok(QuizResult {
            quiz_id,
            score: self.score,
            max_score: self.max_score,
            duration_secs: self.duration_secs,
            recorded_at,
        })
    }
}

/// A validated, timestamped quiz result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub quiz_id: String,
    pub score: u32,
    pub max_score: u32,
    pub duration_secs: Option<u32>,
    pub recorded_at: DateTime<Utc>,
}

impl QuizResult {
    #[must_use]
    pub fn percent(&self) -> f64 {
        f64::from(self.score) * 100.0 / f64::from(self.max_score)
    }

    #[must_use]
    pub const fn is_perfect(&self) -> bool {
        self.score == self.max_score
    }
}

/// Aggregate view of every result recorded for one quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizStats {
    pub quiz_id: String,
    pub attempts: u64,
    /// Mean of per-attempt percentages, rounded to two decimals.
    pub average_pct: f64,
    pub best_score: u32,
    pub perfect_scores: u64,
}

/// Storage for quiz results.
pub trait QuizStore: Send + Sync {
    /// # Errors
    ///
    /// Returns a `StorageError` when the result cannot be persisted.
    fn insert(&self, result: &QuizResult) -> Result<(), StorageError>;

    /// Statistics grouped by quiz, ordered by `quiz_id`.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` when the results cannot be read.
    fn stats(&self) -> Result<Vec<QuizStats>, StorageError>;
}

impl<T: QuizStore + ?Sized> QuizStore for std::sync::Arc<T> {
    fn insert(&self, result: &QuizResult) -> Result<(), StorageError> {
        (**self).insert(result)
    }

    fn stats(&self) -> Result<Vec<QuizStats>, StorageError> {
        (**self).stats()
    }
}

/// Round to two decimals for stable JSON output.
#[must_use]
pub fn round_pct(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// In-process quiz store.
#[derive(Debug, Default)]
pub struct MemoryQuizStore {
    results: Mutex<Vec<QuizResult>>,
}

impl MemoryQuizStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct Accumulator {
    attempts: u64,
    pct_sum: f64,
    best_score: u32,
    perfect_scores: u64,
}

impl QuizStore for MemoryQuizStore {
    fn insert(&self, result: &QuizResult) -> Result<(), StorageError> {
        self.results
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .push(result.clone());
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn stats(&self) -> Result<Vec<QuizStats>, StorageError> {
        let results = self.results.lock().map_err(|_| StorageError::Poisoned)?;
        let mut grouped: BTreeMap<&str, Accumulator> = BTreeMap::new();
        for result in results.iter() {
            let acc = grouped.entry(result.quiz_id.as_str()).or_default();
            acc.attempts += 1;
            acc.pct_sum += result.percent();
            acc.best_score = acc.best_score.max(result.score);
            acc.perfect_scores += u64::from(result.is_perfect());
        }
        Ok(grouped
            .into_iter()
            .map(|(quiz_id, acc)| QuizStats {
                quiz_id: quiz_id.to_string(),
                attempts: acc.attempts,
                average_pct: round_pct(acc.pct_sum / acc.attempts as f64),
                best_score: acc.best_score,
                perfect_scores: acc.perfect_scores,
            })
            .collect())
    }
}

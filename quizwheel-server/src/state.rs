use std::sync::Arc;

use hyper::header::HeaderValue;
use quizwheel_core::{
    Clock, ConfigError, LedgerStore, MemoryLedger, MemoryQuizStore, QuizBook, QuizStore,
    SqliteStore, StorageError, SystemClock, Wheel, WheelConfig,
};
use thiserror::Error;

use crate::rate_limit::RateLimiter;

pub type SharedWheel = Wheel<Arc<dyn LedgerStore>, Arc<dyn Clock>>;
pub type SharedQuizBook = QuizBook<Arc<dyn QuizStore>>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Everything a request handler needs, shared across connections.
pub struct AppState {
    pub wheel: SharedWheel,
    pub quizzes: SharedQuizBook,
    pub limiter: Option<RateLimiter>,
    pub max_identifier_len: usize,
    /// Value of `Access-Control-Allow-Origin` on every response.
    pub cors_origin: HeaderValue,
}

impl AppState {
    /// # Errors
    ///
    /// Returns the `ConfigError` if `cfg` does not validate.
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        quizzes: Arc<dyn QuizStore>,
        clock: Arc<dyn Clock>,
        cfg: &WheelConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            wheel: Wheel::with_config(ledger, clock, cfg)?,
            quizzes: QuizBook::new(quizzes),
            limiter: None,
            max_identifier_len: cfg.max_identifier_len,
            cors_origin: HeaderValue::from_static("*"),
        })
    }

    #[must_use]
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    #[must_use]
    pub fn with_cors_origin(mut self, origin: HeaderValue) -> Self {
        self.cors_origin = origin;
        self
    }

    /// State backed by a `SQLite` database; `:memory:` keeps everything in process.
    ///
    /// # Errors
    ///
    /// Returns a `StateError` if `cfg` is invalid or the database cannot be opened.
    pub fn sqlite(database: &str, cfg: &WheelConfig) -> Result<Self, StateError> {
        let offset = cfg.offset()?;
        let store = if database == ":memory:" {
            SqliteStore::open_in_memory()?
        } else {
            SqliteStore::open(database)?
        };
        Ok(Self::new(
            Arc::new(store.clone()),
            Arc::new(store),
            Arc::new(SystemClock::new(offset)),
            cfg,
        )?)
    }

    /// Purely in-memory state.
    ///
    /// # Errors
    ///
    /// Returns the `ConfigError` if `cfg` does not validate.
    pub fn in_memory(clock: Arc<dyn Clock>, cfg: &WheelConfig) -> Result<Self, ConfigError> {
        Self::new(
            Arc::new(MemoryLedger::new()),
            Arc::new(MemoryQuizStore::new()),
            clock,
            cfg,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizwheel_core::FixedClock;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::new(
            chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        ))
    }

    #[test]
    fn invalid_odds_fail_construction() {
        let cfg = WheelConfig {
            win_odds: 0,
            ..WheelConfig::default()
        };
        assert!(matches!(
            AppState::in_memory(clock(), &cfg),
            Err(ConfigError::ZeroOdds(0))
        ));
    }

    #[test]
    fn out_of_range_offset_is_not_replaced_with_utc() {
        let cfg = WheelConfig {
            utc_offset_minutes: 24 * 60,
            ..WheelConfig::default()
        };
        assert!(matches!(
            AppState::sqlite(":memory:", &cfg),
            Err(StateError::Config(ConfigError::OffsetOutOfRange(1440)))
        ));
    }

    #[test]
    fn cors_origin_defaults_to_any() {
        let state = AppState::in_memory(clock(), &WheelConfig::default()).unwrap();
        assert_eq!(state.cors_origin, "*");
        let state = state.with_cors_origin(HeaderValue::from_static("https://quiz.example"));
        assert_eq!(state.cors_origin, "https://quiz.example");
    }
}

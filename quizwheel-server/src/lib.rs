//! Quiz Wheel Server
//!
//! HTTP front end over `quizwheel-core`: request schema validation, routing,
//! JSON responses, CORS and per-client throttling.

pub mod http;
pub mod rate_limit;
pub mod state;

pub use http::{ApiError, MAX_BODY_BYTES, handle, serve};
pub use rate_limit::RateLimiter;
pub use state::{AppState, SharedQuizBook, SharedWheel, StateError};

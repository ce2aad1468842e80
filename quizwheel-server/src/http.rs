//! JSON-over-HTTP surface for the wheel and quiz endpoints.
//!
//! | Method | Path            | Purpose                              |
//! |--------|-----------------|--------------------------------------|
//! | POST   | `/wheel/check`  | eligibility query, never mutates     |
//! | POST   | `/wheel/spin`   | spin transaction                     |
//! | POST   | `/quiz/results` | record a quiz result                 |
//! | GET    | `/quiz/stats`   | per-quiz aggregates                  |
//! | GET    | `/health`       | liveness, exempt from rate limiting  |
//!
//! `OPTIONS` on any of these paths answers a CORS preflight with 204. Every
//! response carries the configured allow-origin and the security headers.
use chrono::{DateTime, FixedOffset};
use hyper::body::HttpBody;
use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE, ALLOW, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue,
    REFERRER_POLICY, VARY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
};
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use log::{debug, error, info};
use quizwheel_core::{Identifier, QuizError, QuizSubmission, WheelError};
use serde::Serialize;
use serde_json::{Value, json};
use std::convert::Infallible;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::state::AppState;

/// Request bodies larger than this are refused with 413.
pub const MAX_BODY_BYTES: usize = 16 * 1024;

/// Known paths and the methods each accepts.
const ROUTES: [(&str, &str); 5] = [
    ("/health", "GET, OPTIONS"),
    ("/wheel/check", "POST, OPTIONS"),
    ("/wheel/spin", "POST, OPTIONS"),
    ("/quiz/results", "POST, OPTIONS"),
    ("/quiz/stats", "GET, OPTIONS"),
];

/// How long browsers may cache a preflight answer, in seconds.
const PREFLIGHT_MAX_AGE: &str = "600";

fn allowed_methods(path: &str) -> Option<&'static str> {
    ROUTES
        .iter()
        .find(|(known, _)| *known == path)
        .map(|(_, methods)| *methods)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request body exceeds {max} bytes")]
    PayloadTooLarge { max: usize },
    #[error("request body must be a JSON object")]
    InvalidJson,
    #[error("failed to read request body: {0}")]
    Body(#[from] hyper::Error),
    #[error(transparent)]
    Wheel(#[from] WheelError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error("too many requests")]
    RateLimited,
    #[error("not found")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed { allow: &'static str },
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidJson
            | Self::Body(_)
            | Self::Wheel(WheelError::MissingIdentifier | WheelError::InvalidIdentifier(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Wheel(WheelError::AlreadySpunToday { .. }) => StatusCode::CONFLICT,
            Self::Wheel(WheelError::StorageUnavailable(_))
            | Self::Quiz(QuizError::StorageUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Quiz(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::InvalidJson => "invalid_json",
            Self::Body(_) => "invalid_body",
            Self::Wheel(WheelError::MissingIdentifier) => "missing_identifier",
            Self::Wheel(WheelError::InvalidIdentifier(_)) => "invalid_identifier",
            Self::Wheel(WheelError::AlreadySpunToday { .. }) => "already_spun_today",
            Self::Wheel(WheelError::StorageUnavailable(_))
            | Self::Quiz(QuizError::StorageUnavailable(_)) => "storage_unavailable",
            Self::Quiz(_) => "invalid_quiz_result",
            Self::RateLimited => "rate_limited",
            Self::NotFound => "not_found",
            Self::MethodNotAllowed { .. } => "method_not_allowed",
            Self::Join(_) => "internal",
        }
    }

    #[must_use]
    pub fn into_response(self) -> Response<Body> {
        if let Self::Join(err) = &self {
            error!("request worker failed: {err}");
        }
        let next_spin_date = match &self {
            Self::Wheel(WheelError::AlreadySpunToday { next_eligible_at }) => {
                Some(*next_eligible_at)
            }
            _ => None,
        };
        let allow = match &self {
            Self::MethodNotAllowed { allow } => Some(*allow),
            _ => None,
        };
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
            next_spin_date,
        };
        let mut response = json_response(self.status(), &body);
        if let Some(allow) = allow {
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static(allow));
        }
        response
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_spin_date: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckResponse {
    can_spin: bool,
    next_spin_date: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpinResponse {
    has_won: bool,
    can_spin: bool,
    total_spins: u64,
    total_wins: u64,
    next_spin_date: DateTime<FixedOffset>,
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let payload = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    let mut response = Response::new(Body::from(payload));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Read the body as a JSON object, refusing anything over [`MAX_BODY_BYTES`].
async fn read_json(req: Request<Body>) -> Result<Value, ApiError> {
    let too_large = ApiError::PayloadTooLarge {
        max: MAX_BODY_BYTES,
    };
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > MAX_BODY_BYTES) {
        return Err(too_large);
    }

    let mut body = req.into_body();
    let mut buf = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk?;
        if buf.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(too_large);
        }
        buf.extend_from_slice(&chunk);
    }

    match serde_json::from_slice::<Value>(&buf) {
        Ok(value) if value.is_object() => Ok(value),
        _ => Err(ApiError::InvalidJson),
    }
}

async fn wheel_check(
    state: Arc<AppState>,
    req: Request<Body>,
) -> Result<Response<Body>, ApiError> {
    let body = read_json(req).await?;
    let identifier =
        Identifier::from_json(body.get("userIdentifier"), state.max_identifier_len)?;
    let verdict = tokio::task::spawn_blocking(move || state.wheel.check(&identifier)).await??;
    Ok(json_response(
        StatusCode::OK,
        &CheckResponse {
            can_spin: verdict.eligible,
            next_spin_date: verdict.next_eligible_at,
        },
    ))
}

async fn wheel_spin(
    state: Arc<AppState>,
    req: Request<Body>,
) -> Result<Response<Body>, ApiError> {
    let body = read_json(req).await?;
    let identifier =
        Identifier::from_json(body.get("userIdentifier"), state.max_identifier_len)?;
    let outcome = tokio::task::spawn_blocking(move || state.wheel.spin(&identifier)).await??;
    Ok(json_response(
        StatusCode::OK,
        &SpinResponse {
            has_won: outcome.won,
            can_spin: false,
            total_spins: outcome.total_spins,
            total_wins: outcome.total_wins,
            next_spin_date: outcome.next_eligible_at,
        },
    ))
}

async fn record_quiz(
    state: Arc<AppState>,
    req: Request<Body>,
) -> Result<Response<Body>, ApiError> {
    let body = read_json(req).await?;
    let submission: QuizSubmission =
        serde_json::from_value(body).map_err(|_| ApiError::InvalidJson)?;
    let result = tokio::task::spawn_blocking(move || state.quizzes.record(submission)).await??;
    Ok(json_response(
        StatusCode::CREATED,
        &json!({ "recorded": true, "result": result }),
    ))
}

async fn quiz_stats(state: Arc<AppState>) -> Result<Response<Body>, ApiError> {
    let stats = tokio::task::spawn_blocking(move || state.quizzes.stats()).await??;
    Ok(json_response(StatusCode::OK, &stats))
}

fn preflight(methods: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(methods));
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("content-type"),
    );
    headers.insert(
        ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(PREFLIGHT_MAX_AGE),
    );
    response
}

/// Stamp CORS and security headers onto an outgoing response.
fn apply_common_headers(headers: &mut HeaderMap, origin: HeaderValue) {
    if origin != "*" {
        headers.insert(VARY, HeaderValue::from_static("Origin"));
    }
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
}

async fn route(
    state: Arc<AppState>,
    client: IpAddr,
    req: Request<Body>,
) -> Result<Response<Body>, ApiError> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let allow = allowed_methods(&path);

    if method == Method::OPTIONS
        && let Some(methods) = allow
    {
        return Ok(preflight(methods));
    }

    if path != "/health"
        && let Some(limiter) = &state.limiter
        && !limiter.allow(client, Instant::now())
    {
        return Err(ApiError::RateLimited);
    }

    match (method, path.as_str()) {
        (Method::GET, "/health") => Ok(json_response(StatusCode::OK, &json!({ "status": "ok" }))),
        (Method::POST, "/wheel/check") => wheel_check(state, req).await,
        (Method::POST, "/wheel/spin") => wheel_spin(state, req).await,
        (Method::POST, "/quiz/results") => record_quiz(state, req).await,
        (Method::GET, "/quiz/stats") => quiz_stats(state).await,
        _ => match allow {
            Some(allow) => Err(ApiError::MethodNotAllowed { allow }),
            None => Err(ApiError::NotFound),
        },
    }
}

/// Serve one request. Errors are rendered as JSON bodies, never propagated.
pub async fn handle(
    state: Arc<AppState>,
    client: IpAddr,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let label = format!("{} {}", req.method(), req.uri().path());
    let origin = state.cors_origin.clone();
    let mut response = route(state, client, req)
        .await
        .unwrap_or_else(ApiError::into_response);
    apply_common_headers(response.headers_mut(), origin);
    debug!("{label} -> {}", response.status());
    Ok(response)
}

/// Bind `addr` and serve until `shutdown` resolves.
///
/// # Errors
///
/// Returns the hyper error if the address cannot be bound or the server fails.
pub async fn serve<F>(
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), hyper::Error>
where
    F: Future<Output = ()>,
{
    let make_svc = make_service_fn(move |conn: &AddrStream| {
        let state = Arc::clone(&state);
        let client = conn.remote_addr().ip();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                handle(Arc::clone(&state), client, req)
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    info!("listening on http://{}", server.local_addr());
    server.with_graceful_shutdown(shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizwheel_core::{FixedClock, StorageError, WheelConfig};
    use std::net::Ipv4Addr;

    const CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn state() -> Arc<AppState> {
        let clock = Arc::new(FixedClock::new(
            chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        ));
        Arc::new(AppState::in_memory(clock, &WheelConfig::default()).unwrap())
    }

    fn request(method: Method, path: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn error_codes_map_to_statuses() {
        let cases = [
            (ApiError::from(WheelError::MissingIdentifier), StatusCode::BAD_REQUEST),
            (
                ApiError::from(WheelError::StorageUnavailable(StorageError::Poisoned)),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (ApiError::from(QuizError::ZeroMaxScore), StatusCode::BAD_REQUEST),
            (ApiError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (
                ApiError::PayloadTooLarge { max: 1 },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{}", err.code());
        }
    }

    #[test]
    fn unknown_path_and_wrong_method() {
        tokio_test::block_on(async {
            let missing = handle(state(), CLIENT, request(Method::GET, "/nope", ""))
                .await
                .unwrap();
            assert_eq!(missing.status(), StatusCode::NOT_FOUND);

            let wrong = handle(state(), CLIENT, request(Method::GET, "/wheel/spin", ""))
                .await
                .unwrap();
            assert_eq!(wrong.status(), StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(wrong.headers()[ALLOW], "POST, OPTIONS");
        });
    }

    #[test]
    fn options_on_unknown_path_is_not_found() {
        tokio_test::block_on(async {
            let response = handle(state(), CLIENT, request(Method::OPTIONS, "/nope", ""))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(response.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
        });
    }

    #[test]
    fn oversized_body_is_refused() {
        tokio_test::block_on(async {
            let big = format!(r#"{{"userIdentifier":"{}"}}"#, "x".repeat(MAX_BODY_BYTES));
            let response = handle(state(), CLIENT, request(Method::POST, "/wheel/check", &big))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        });
    }

    #[test]
    fn non_object_json_is_invalid() {
        tokio_test::block_on(async {
            let response = handle(state(), CLIENT, request(Method::POST, "/wheel/check", "[1,2]"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
            let value: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(value["error"], "invalid_json");
        });
    }
}

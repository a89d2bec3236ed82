/*
 * src/error.rs
 *
 * Three-layer error taxonomy for the HTTP boundary, plus the pipeline's
 * own internal taxonomy (spec §7). `PublicError` is safe to describe to
 * a client; `PrivateError` never is. `AppError` is what handlers return
 * and implements `IntoResponse` so a failure can never leak a raw
 * message, stack trace, or credential across the boundary.
 */

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum PublicError {
	#[error("validation error: {0}")]
	Validation(String),
	#[error("bad request: {0}")]
	BadRequest(String),
	#[error("unauthorized")]
	Unauthorized,
	#[error("not found")]
	NotFound,
	#[error("conflict: {0}")]
	Conflict(String),
	#[error("caller location is required for this query")]
	LocationRequired,
	#[error("rate limit exceeded")]
	RateLimited,
}

#[derive(Debug, Error)]
pub enum PrivateError {
	#[error("cache error: {0}")]
	Cache(String),
	#[error("provider error: {0}")]
	Provider(String),
	#[error("geocoding error: {0}")]
	Geocoding(String),
	#[error("model error: {0}")]
	Model(String),
	#[error("schema error: {0}")]
	Schema(String),
	#[error("redis error: {0}")]
	Redis(#[from] redis::RedisError),
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("internal error: {0}")]
	Internal(String),
}

#[derive(Debug, Error)]
pub enum AppError {
	#[error(transparent)]
	Public(#[from] PublicError),
	#[error(transparent)]
	Private(#[from] PrivateError),
}

impl AppError {
	pub fn internal(msg: impl Into<String>) -> Self {
		AppError::Private(PrivateError::Internal(msg.into()))
	}
}

#[derive(Serialize)]
struct ErrorBody {
	error: String,
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response {
		let (status, message) = match &self {
			AppError::Public(PublicError::Validation(msg)) => {
				(StatusCode::UNPROCESSABLE_ENTITY, msg.clone())
			}
			AppError::Public(PublicError::BadRequest(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
			AppError::Public(PublicError::Unauthorized) => {
				(StatusCode::UNAUTHORIZED, "unauthorized".to_string())
			}
			AppError::Public(PublicError::NotFound) => {
				(StatusCode::NOT_FOUND, "not found".to_string())
			}
			AppError::Public(PublicError::Conflict(msg)) => (StatusCode::CONFLICT, msg.clone()),
			AppError::Public(PublicError::LocationRequired) => (
				StatusCode::BAD_REQUEST,
				"caller location is required for this query".to_string(),
			),
			AppError::Public(PublicError::RateLimited) => (
				StatusCode::TOO_MANY_REQUESTS,
				"rate limit exceeded".to_string(),
			),
			// Private errors never expose their internal message to the client.
			AppError::Private(_) => {
				tracing::error!(error = %self, "internal error surfaced to HTTP boundary");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					"internal server error".to_string(),
				)
			}
		};
		(status, axum::Json(ErrorBody { error: message })).into_response()
	}
}

/// Internal pipeline error taxonomy (spec §7). Never crosses the
/// orchestrator boundary directly — `run()` always converts these into
/// a `FailureReason` on the response envelope instead of propagating.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
	#[error("full intent extraction failed")]
	IntentFailed,
	#[error("caller location is required")]
	LocationRequired,
	#[error("geocoding failed to resolve a landmark")]
	GeocodingFailed,
	#[error("all top results have unknown live-data")]
	LiveDataUnavailable,
	#[error("place provider error: {0}")]
	ProviderError(String),
}

/// Maps a [`PipelineError`] onto the response envelope's `failure_reason` (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
	None,
	NoResults,
	LocationRequired,
	LowConfidence,
	GeocodingFailed,
	LiveDataUnavailable,
	ProviderError,
}

impl From<&PipelineError> for FailureReason {
	fn from(err: &PipelineError) -> Self {
		match err {
			PipelineError::IntentFailed => FailureReason::LowConfidence,
			PipelineError::LocationRequired => FailureReason::LocationRequired,
			PipelineError::GeocodingFailed => FailureReason::GeocodingFailed,
			PipelineError::LiveDataUnavailable => FailureReason::LiveDataUnavailable,
			PipelineError::ProviderError(_) => FailureReason::ProviderError,
		}
	}
}

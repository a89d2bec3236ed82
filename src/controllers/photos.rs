/*
 * src/controllers/photos.rs
 *
 * HANDLER ->> /api/v1/photos
 *
 * Photo-proxy endpoint (spec §6). The core never makes a credentialed
 * request to the upstream photo media endpoint on this path — it only
 * validates the opaque reference shape and rate-limits per source IP,
 * so the router, OpenAPI doc, and auth/CORS plumbing stay complete
 * even though the actual fetch is out of scope (spec §10.5/§11).
 */

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Extension, Path};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::error::{AppError, PublicError};
use crate::state::AppState;

fn reference_shape() -> &'static Regex {
	static RE: OnceCell<Regex> = OnceCell::new();
	RE.get_or_init(|| Regex::new(r"^[^/]+/photos/[^/]+$").expect("photo reference regex is valid"))
}

/// # Method
/// GET
///
/// # Auth
/// None required.
///
/// # Responses
/// - `501` once the reference shape and rate limit both pass (fetch is out of scope).
/// - `400` if the reference doesn't match `provider-id/photos/photo-id`.
/// - `429` once the caller's source IP exceeds its rate limit.
///
/// # Examples
/// ```bash
/// curl $API_BASE_URL/api/v1/photos/ChIJ.../photos/abc123
/// ```
pub async fn api_get_photo(
	Extension(state): Extension<Arc<AppState>>,
	ConnectInfo(addr): ConnectInfo<SocketAddr>,
	Path(reference): Path<String>,
) -> Result<Response, AppError> {
	if !state.photo_rate_limiter.check(addr.ip()) {
		tracing::error!(ip = %addr.ip(), "ERROR ->> /api/v1/photos 'api_get_photo' REASON: rate limited");
		return Err(PublicError::RateLimited.into());
	}
	if !reference_shape().is_match(&reference) {
		tracing::error!(reference, "ERROR ->> /api/v1/photos 'api_get_photo' REASON: malformed reference");
		return Err(PublicError::BadRequest(
			"photo reference must match provider-id/photos/photo-id".to_string(),
		)
		.into());
	}

	Ok(StatusCode::NOT_IMPLEMENTED.into_response())
}

pub fn photo_routes() -> Router {
	Router::new().route("/{*reference}", get(api_get_photo))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepts_well_formed_reference() {
		assert!(reference_shape().is_match("ChIJabc123/photos/photo-ref-1"));
	}

	#[test]
	fn rejects_reference_missing_photos_segment() {
		assert!(!reference_shape().is_match("ChIJabc123/photo-ref-1"));
	}

	#[test]
	fn rejects_reference_with_extra_slash() {
		assert!(!reference_shape().is_match("ChIJabc123/photos/nested/photo-ref-1"));
	}
}

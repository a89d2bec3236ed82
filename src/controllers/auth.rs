/*
 * src/controllers/auth.rs
 *
 * HANDLER ->> /api/v1/auth
 *
 * Ephemeral session issuance (spec §6). There is no accounts table —
 * user accounts are out of scope — the bearer token supplied by the
 * caller is only used to derive a stable per-caller session id; the
 * signed cookie this endpoint sets is what authorizes later requests.
 */

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{HeaderMap, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tower_cookies::Cookies;
use tower_cookies::cookie::{Cookie, Key, SameSite, time::Duration as CookieDuration};

use crate::error::{ApiResult, AppError, PublicError};
use crate::middleware::{AuthUser, build_session_token, issue_subscription_ticket, middleware_auth};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SessionRequest {
	#[serde(rename = "requestId")]
	pub request_id: Option<String>,
}

#[derive(Serialize)]
pub struct SessionResponse {
	#[serde(rename = "sessionId")]
	session_id: String,
	#[serde(rename = "subscriptionTicket")]
	subscription_ticket: Option<String>,
}

fn session_id_from_bearer(headers: &HeaderMap) -> Result<i64, AppError> {
	let auth = headers
		.get(header::AUTHORIZATION)
		.and_then(|v| v.to_str().ok())
		.ok_or(PublicError::Unauthorized)?;
	let token = auth.strip_prefix("Bearer ").ok_or(PublicError::Unauthorized)?;
	if token.trim().is_empty() {
		return Err(PublicError::Unauthorized.into());
	}

	// Derives the session id deterministically from the bearer token so
	// the same caller gets the same session across calls, with no row
	// persisted anywhere.
	let digest = Sha256::digest(token.as_bytes());
	let mut bytes = [0u8; 8];
	bytes.copy_from_slice(&digest[..8]);
	Ok(i64::from_be_bytes(bytes) & i64::MAX)
}

/// # Method
/// POST
///
/// # Request Body
/// [`SessionRequest`]
///
/// # Auth
/// `Authorization: Bearer <token>` header required.
///
/// # Responses
/// - `200` setting the `auth-token` private cookie and returning the session id.
/// - `401` if the bearer token is missing or empty.
///
/// # Examples
/// ```bash
/// curl -X POST $API_BASE_URL/api/v1/auth/session -H 'Authorization: Bearer abc123'
/// ```
pub async fn api_issue_session(
	Extension(state): Extension<Arc<AppState>>,
	Extension(key): Extension<Key>,
	headers: HeaderMap,
	cookies: Cookies,
	Json(payload): Json<SessionRequest>,
) -> ApiResult<Json<SessionResponse>> {
	let session_id = session_id_from_bearer(&headers)?;
	let ttl = state.config.session_cookie_ttl_seconds;
	let token = build_session_token(session_id, ttl);

	let on_production = !cfg!(debug_assertions);
	let mut cookie = Cookie::build("auth-token", token)
		.path("/")
		.http_only(true)
		.secure(on_production)
		.same_site(if on_production { SameSite::None } else { SameSite::Lax })
		.max_age(CookieDuration::seconds(ttl))
		.finish();
	if let Some(domain) = &state.config.cookie_domain {
		cookie.set_domain(domain.clone());
	}
	cookies.private(&key).add(cookie);

	tracing::info!(session_id, "HANDLER ->> /api/v1/auth/session 'api_issue_session' - issued");

	let subscription_ticket = payload
		.request_id
		.as_deref()
		.map(|request_id| issue_subscription_ticket(&key, session_id, request_id));

	Ok(Json(SessionResponse {
		session_id: session_id.to_string(),
		subscription_ticket,
	}))
}

/// # Method
/// GET
///
/// # Auth
/// `auth-token` private cookie required.
///
/// # Responses
/// - `200` with the caller's session id.
/// - `401` if the cookie is missing, unparsable, or expired.
pub async fn api_whoami(Extension(user): Extension<AuthUser>) -> Json<serde_json::Value> {
	Json(serde_json::json!({ "sessionId": user.session_id.to_string() }))
}

pub fn auth_routes() -> Router {
	Router::new()
		.route("/whoami", get(api_whoami))
		.route_layer(axum::middleware::from_fn(middleware_auth))
		.route("/session", post(api_issue_session))
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::HeaderValue;

	fn headers_with_bearer(token: &str) -> HeaderMap {
		let mut headers = HeaderMap::new();
		headers.insert(
			header::AUTHORIZATION,
			HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
		);
		headers
	}

	#[test]
	fn bearer_token_yields_stable_nonnegative_session_id() {
		let a = session_id_from_bearer(&headers_with_bearer("abc123")).unwrap();
		let b = session_id_from_bearer(&headers_with_bearer("abc123")).unwrap();
		assert_eq!(a, b);
		assert!(a >= 0);
	}

	#[test]
	fn distinct_tokens_yield_distinct_session_ids() {
		let a = session_id_from_bearer(&headers_with_bearer("token-one")).unwrap();
		let b = session_id_from_bearer(&headers_with_bearer("token-two")).unwrap();
		assert_ne!(a, b);
	}

	#[test]
	fn missing_auth_header_is_rejected() {
		assert!(session_id_from_bearer(&HeaderMap::new()).is_err());
	}

	#[test]
	fn empty_bearer_token_is_rejected() {
		assert!(session_id_from_bearer(&headers_with_bearer("")).is_err());
	}

	#[test]
	fn non_bearer_scheme_is_rejected() {
		let mut headers = HeaderMap::new();
		headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
		assert!(session_id_from_bearer(&headers).is_err());
	}
}

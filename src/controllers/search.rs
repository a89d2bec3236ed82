/*
 * src/controllers/search.rs
 *
 * HANDLER ->> /api/v1/search
 *
 * The search surface (spec §6): submit a query, poll an async job's
 * result, and read process-wide request counters.
 */

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use crate::error::{ApiResult, FailureReason, PublicError};
use crate::model::job::Job;
use crate::model::request::{SearchMode, SearchRequest, SearchRequestBody};
use crate::state::AppState;

#[derive(Serialize)]
struct AsyncAccepted {
	#[serde(rename = "requestId")]
	request_id: String,
}

/// # Method
/// POST
///
/// # Request Body
/// [`SearchRequestBody`]
///
/// # Auth
/// None required; `sessionId` is read from the body or the `session-id` cookie.
///
/// # Responses
/// - `200` with a [`SearchResponse`](crate::model::response::SearchResponse) in sync mode.
/// - `202` with `{ "requestId": ... }` in async mode.
/// - `422` if `query` is empty.
///
/// # Examples
/// ```bash
/// curl -X POST $API_BASE_URL/api/v1/search \
///   -H 'Content-Type: application/json' \
///   -d '{"query": "cheap pizza near me", "mode": "sync"}'
/// ```
pub async fn api_search(
	Extension(state): Extension<Arc<AppState>>,
	cookies: Cookies,
	Json(body): Json<SearchRequestBody>,
) -> ApiResult<Response> {
	if body.query.trim().is_empty() {
		tracing::error!("ERROR ->> /api/v1/search 'api_search' REASON: empty query");
		return Err(PublicError::Validation("query must not be empty".to_string()).into());
	}

	let request_id = uuid::Uuid::new_v4().to_string();
	let session_id = body
		.session_id
		.clone()
		.or_else(|| cookies.get("session-id").map(|c| c.value().to_string()));

	let request = SearchRequest {
		request_id: request_id.clone(),
		query: body.query,
		user_location: body.user_location,
		region_hint: body.region_hint,
		session_id,
		mode: body.mode,
		category_hint: body.category_hint,
	};

	state.stats.total_requests.fetch_add(1, Ordering::Relaxed);
	tracing::info!(request_id = %request_id, "HANDLER ->> /api/v1/search 'api_search' - dispatching");

	match request.mode {
		SearchMode::Sync => {
			let response = state.orchestrator.run_sync(&request).await;
			if response.meta.failure_reason != FailureReason::None {
				state.stats.failed_requests.fetch_add(1, Ordering::Relaxed);
			}
			Ok((StatusCode::OK, Json(response)).into_response())
		}
		SearchMode::Async => {
			state.job_store.create(&request_id).await?;
			state.orchestrator.clone().spawn_async(request);
			Ok((StatusCode::ACCEPTED, Json(AsyncAccepted { request_id })).into_response())
		}
	}
}

/// # Method
/// GET
///
/// # Auth
/// None required.
///
/// # Responses
/// - `200` with the [`Job`] (check `status` for completion).
/// - `404` if the job id is unknown or has expired.
///
/// # Examples
/// ```bash
/// curl $API_BASE_URL/api/v1/search/$REQUEST_ID/result
/// ```
pub async fn api_search_result(
	Extension(state): Extension<Arc<AppState>>,
	Path(request_id): Path<String>,
) -> ApiResult<Json<Job>> {
	let job = state
		.job_store
		.get(&request_id)
		.await?
		.ok_or(PublicError::NotFound)?;
	Ok(Json(job))
}

#[derive(Serialize)]
struct StatsBody {
	#[serde(rename = "totalRequests")]
	total_requests: u64,
	#[serde(rename = "failedRequests")]
	failed_requests: u64,
}

/// # Method
/// GET
///
/// # Auth
/// None required.
///
/// # Responses
/// - `200` with process-wide request counters.
pub async fn api_search_stats(Extension(state): Extension<Arc<AppState>>) -> Json<StatsBody> {
	let snapshot = state.stats.snapshot();
	Json(StatsBody {
		total_requests: snapshot.total_requests,
		failed_requests: snapshot.failed_requests,
	})
}

pub fn search_routes() -> Router {
	Router::new()
		.route("/", post(api_search))
		.route("/stats", get(api_search_stats))
		.route("/{request_id}/result", get(api_search_result))
}

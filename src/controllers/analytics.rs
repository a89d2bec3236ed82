/*
 * src/controllers/analytics.rs
 *
 * HANDLER ->> /api/v1/analytics
 *
 * Client-side analytics ingestion (spec §10.5/§11). Interface-only:
 * events are buffered in a bounded ring and never processed or
 * forwarded anywhere.
 */

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;

use crate::state::AppState;

#[derive(Serialize)]
struct IngestAck {
	accepted: usize,
}

/// # Method
/// POST
///
/// # Request Body
/// A single event object, or an array of event objects.
///
/// # Auth
/// None required.
///
/// # Responses
/// - `202` with the number of events accepted into the ring.
///
/// # Examples
/// ```bash
/// curl -X POST $API_BASE_URL/api/v1/analytics/events \
///   -H 'Content-Type: application/json' \
///   -d '{"name": "search_submitted"}'
/// ```
pub async fn api_ingest_events(
	Extension(state): Extension<Arc<AppState>>,
	Json(body): Json<Value>,
) -> (StatusCode, Json<IngestAck>) {
	let events: Vec<Value> = match body {
		Value::Array(items) => items,
		other => vec![other],
	};
	let accepted = events.len();
	for event in events {
		state.analytics.push(event);
	}
	(StatusCode::ACCEPTED, Json(IngestAck { accepted }))
}

pub fn analytics_routes() -> Router {
	Router::new().route("/events", post(api_ingest_events))
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LatLng {
	pub lat: f64,
	pub lng: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
	Sync,
	Async,
}

/// Input to the pipeline (spec §3). Immutable once the pipeline starts;
/// the orchestrator only ever reads from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
	pub request_id: String,
	pub query: String,
	pub user_location: Option<LatLng>,
	/// Two-letter device region hint, e.g. "IL", "US".
	pub region_hint: Option<String>,
	pub session_id: Option<String>,
	pub mode: SearchMode,
	/// Bypasses the intent gate (C2) when present.
	pub category_hint: Option<String>,
}

/// Wire body for `POST /api/v1/search` (spec §6). `request_id` is
/// assigned by the edge/handler, not supplied by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequestBody {
	pub query: String,
	#[serde(rename = "sessionId")]
	pub session_id: Option<String>,
	#[serde(rename = "userLocation")]
	pub user_location: Option<LatLng>,
	pub mode: SearchMode,
	#[serde(rename = "categoryHint")]
	pub category_hint: Option<String>,
	#[serde(rename = "regionHint")]
	pub region_hint: Option<String>,
}

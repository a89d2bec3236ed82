use serde::{Deserialize, Serialize};

use crate::error::FailureReason;
use crate::model::candidate::PlaceCandidate;
use crate::model::filters::FinalFilters;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssistType {
	Clarify,
	Confirm,
	Suggest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistMessage {
	#[serde(rename = "type")]
	pub assist_type: AssistType,
	pub message: String,
	pub suggested_actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMeta {
	pub duration_ms: u64,
	pub applied_filters: FinalFilters,
	pub failure_reason: FailureReason,
	pub source: String,
}

/// A single client-facing result row. `photo_url` is always an opaque
/// reference, never a credentialed URL (spec §3 invariant, tested in
/// spec §8 property 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultItem {
	pub provider_id: String,
	pub name: String,
	pub address: String,
	pub lat: f64,
	pub lng: f64,
	pub rating: Option<f32>,
	pub review_count: Option<u32>,
	pub price_level: Option<u8>,
	pub open_now: Option<bool>,
	pub primary_type: Option<String>,
	pub photo_url: Option<String>,
}

impl From<&PlaceCandidate> for ResultItem {
	fn from(c: &PlaceCandidate) -> Self {
		let photo_url = c
			.photo_refs
			.first()
			.map(|photo_id| format!("/api/v1/photos/{}", c.photo_reference(photo_id)));

		ResultItem {
			provider_id: c.provider_id.clone(),
			name: c.display_name.clone(),
			address: c.formatted_address.clone(),
			lat: c.location.lat,
			lng: c.location.lng,
			rating: c.rating,
			review_count: c.review_count,
			price_level: c.price_level,
			open_now: match c.open_now {
				crate::model::candidate::OpenNow::Known(v) => Some(v),
				crate::model::candidate::OpenNow::Unknown => None,
			},
			primary_type: c.primary_type.clone(),
			photo_url,
		}
	}
}

/// Output of the pipeline (spec §3 `SearchResponse`).
///
/// Invariant (spec §3, tested in spec §8 property 2): `assist` is
/// always `Some` when `meta.failure_reason != None` or the gate
/// returned CLARIFY.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
	pub request_id: String,
	pub session_id: Option<String>,
	pub results: Vec<ResultItem>,
	pub chips: Vec<String>,
	pub meta: ResponseMeta,
	pub assist: Option<AssistMessage>,
}

impl SearchResponse {
	pub fn empty_with_failure(
		request_id: String,
		session_id: Option<String>,
		failure_reason: FailureReason,
		assist: AssistMessage,
		duration_ms: u64,
	) -> Self {
		SearchResponse {
			request_id,
			session_id,
			results: vec![],
			chips: vec![],
			meta: ResponseMeta {
				duration_ms,
				applied_filters: FinalFilters::default(),
				failure_reason,
				source: "pipeline".to_string(),
			},
			assist: Some(assist),
		}
	}

	/// Spec §8 property 2.
	pub fn satisfies_assist_invariant(&self) -> bool {
		if self.meta.failure_reason != FailureReason::None {
			self.assist.is_some()
		} else {
			true
		}
	}

	/// Spec §8 property 3 / spec §9 credential isolation.
	pub fn no_photo_url_carries_a_key_param(&self) -> bool {
		self.results
			.iter()
			.all(|r| match &r.photo_url {
				Some(url) => !url.contains("key=") && !url.contains("?key") && !url.contains("&key"),
				None => true,
			})
	}
}

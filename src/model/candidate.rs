use serde::{Deserialize, Serialize};

use crate::model::request::LatLng;

/// Tristate opening-hours: KNOWN/true, KNOWN/false, or UNKNOWN. See
/// spec §3/§4.6 — UNKNOWN is kept by default during post-filtering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OpenNow {
	Known(bool),
	Unknown,
}

impl OpenNow {
	pub fn is_unknown(&self) -> bool {
		matches!(self, OpenNow::Unknown)
	}

	pub fn satisfies_open_now(&self) -> bool {
		matches!(self, OpenNow::Known(true) | OpenNow::Unknown)
	}
}

/// A single day/period of regular opening hours, used by the post-filter
/// engine's OPEN_AT/OPEN_BETWEEN logic (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpeningPeriod {
	pub day: u8,
	pub open_time: String,
	pub close_time: String,
}

/// A raw place record returned by the provider prior to post-filtering
/// (spec §3 `PlaceCandidate`, GLOSSARY "Candidate"). Photo references
/// are opaque strings — raw credentialed URLs never reach this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceCandidate {
	pub provider_id: String,
	pub display_name: String,
	pub formatted_address: String,
	pub location: LatLng,
	pub rating: Option<f32>,
	pub review_count: Option<u32>,
	pub price_level: Option<u8>,
	pub open_now: OpenNow,
	pub regular_hours: Vec<OpeningPeriod>,
	pub types: Vec<String>,
	pub primary_type: Option<String>,
	pub photo_refs: Vec<String>,
	pub is_kosher: Option<bool>,
	pub is_accessible: Option<bool>,
	pub has_parking: Option<bool>,
}

impl PlaceCandidate {
	/// The opaque, client-safe photo reference shape spec §6 requires:
	/// `provider-id/photos/photo-id`.
	pub fn photo_reference(&self, photo_id: &str) -> String {
		format!("{}/photos/{}", self.provider_id, photo_id)
	}
}

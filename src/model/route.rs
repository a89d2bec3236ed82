use serde::{Deserialize, Serialize};

use crate::model::request::LatLng;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Route {
	Nearby,
	Textsearch,
	Landmark,
}

/// Decision from the route selector (C3), spec §3.
///
/// Invariant: `route = Nearby` requires caller coordinates — the
/// orchestrator enforces this before the route stage ever runs (the
/// near-me override in spec §4.1 either forces NEARBY only when
/// coordinates are present, or short-circuits to LOCATION_REQUIRED).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
	pub route: Route,
	pub language_hint: String,
	pub region_hint: Option<String>,
	pub confidence: f64,
	pub reason_tag: String,
}

impl RouteDecision {
	pub fn requires_coordinates(&self) -> bool {
		matches!(self.route, Route::Nearby)
	}
}

/// Tagged variant carrying exactly the provider parameters one route
/// shape needs. Never carries both a fixed center and unfocused text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ProviderParameters {
	#[serde(rename = "TEXTSEARCH")]
	TextSearch {
		text_query: String,
		region: Option<String>,
		language: String,
		bias: Option<GeoBias>,
	},
	#[serde(rename = "NEARBY")]
	Nearby {
		center: LatLng,
		radius_meters: f64,
		keyword: String,
		region: Option<String>,
		language: String,
	},
	#[serde(rename = "LANDMARK")]
	Landmark {
		geocode_query: String,
		radius_meters: f64,
		keyword: String,
	},
}

/// Bias fields always travel together — either all three are present
/// or none are (spec §4.3's "no partial bias" rule).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoBias {
	pub bias_lat: f64,
	pub bias_lng: f64,
	pub bias_radius_meters: f64,
}

impl ProviderParameters {
	/// Strips any geographic bias, used by the provider client's
	/// bias-retry rule (spec §4.5).
	pub fn without_bias(&self) -> Self {
		match self {
			ProviderParameters::TextSearch {
				text_query,
				region,
				language,
				..
			} => ProviderParameters::TextSearch {
				text_query: text_query.clone(),
				region: region.clone(),
				language: language.clone(),
				bias: None,
			},
			other => other.clone(),
		}
	}

	pub fn has_bias(&self) -> bool {
		matches!(self, ProviderParameters::TextSearch { bias: Some(_), .. })
	}
}

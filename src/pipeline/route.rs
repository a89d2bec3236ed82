/*
 * src/pipeline/route.rs
 *
 * Route Selector & Mapper (C3). A single model call decides the route
 * and produces route-specific provider parameters (spec §4.3).
 */

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::PipelineError;
use crate::llm::{CallOpts, ModelAdapter, schema};
use crate::model::request::LatLng;
use crate::model::route::{GeoBias, ProviderParameters, Route, RouteDecision};

const ROUTE_PROMPT_VERSION: &str = "route-prompt.v1";
const ROUTE_SYSTEM_PROMPT: &str = "You choose a place-search route (NEARBY, TEXTSEARCH, or \
LANDMARK) for a restaurant query and map it onto search parameters. Category text must be a \
canonical English category unless the query's language matches a known local region, in which \
case keep the original language for locality. Location text must preserve the original \
language. Never invent coordinates. Respond only with JSON matching the provided schema.";

#[derive(Debug, Deserialize)]
struct RawRoute {
	route: String,
	language_hint: String,
	region_hint: Option<String>,
	confidence: f64,
	category_text: String,
	location_text: String,
	geocode_query: Option<String>,
}

pub struct RouteSelector<A: ModelAdapter> {
	adapter: Arc<A>,
}

impl<A: ModelAdapter> RouteSelector<A> {
	pub fn new(adapter: Arc<A>) -> Self {
		Self { adapter }
	}

	pub async fn run(
		&self,
		query: &str,
		user_coordinates: Option<LatLng>,
		opts: &CallOpts,
		timeout: Duration,
	) -> Result<(RouteDecision, ProviderParameters), PipelineError> {
		let call = self.adapter.complete_json(
			ROUTE_SYSTEM_PROMPT,
			query,
			schema::ROUTE_SCHEMA,
			schema::ROUTE_SCHEMA_VERSION,
			opts,
		);

		let value = tokio::time::timeout(timeout, call)
			.await
			.map_err(|_| PipelineError::IntentFailed)?
			.map_err(|_| PipelineError::IntentFailed)?;

		let raw: RawRoute = serde_json::from_value(value).map_err(|_| PipelineError::IntentFailed)?;

		let mut route = match raw.route.as_str() {
			"NEARBY" => Route::Nearby,
			"LANDMARK" => Route::Landmark,
			_ => Route::Textsearch,
		};

		// Spec §3 invariant: NEARBY requires caller coordinates. If the
		// model proposed NEARBY without them, fall back to TEXTSEARCH —
		// the orchestrator's deterministic near-me check handles the
		// "no coordinates at all" LOCATION_REQUIRED case earlier.
		let mut reason_tag = "model_decision".to_string();
		if route == Route::Nearby && user_coordinates.is_none() {
			route = Route::Textsearch;
			reason_tag = "nearby_without_coordinates_fallback".to_string();
		}

		let decision = RouteDecision {
			route,
			language_hint: raw.language_hint.clone(),
			region_hint: raw.region_hint.clone(),
			confidence: raw.confidence,
			reason_tag,
		};

		let params = map_parameters(&decision, &raw, user_coordinates);

		Ok((decision, params))
	}

	pub fn prompt_version() -> &'static str {
		ROUTE_PROMPT_VERSION
	}

	pub fn prompt_hash() -> String {
		crate::llm::prompt_hash(ROUTE_SYSTEM_PROMPT)
	}
}

/// Known separators the simple-pattern regex (`pipeline::gate::matches_simple_pattern`)
/// recognizes, reused here so the smart-skip heuristic splits on the same tokens.
const LEGACY_SEPARATORS: &[&str] = &["in", "at", "near", "en", "ב", "ליד", "في"];

/// Legacy heuristic route decision used by the orchestrator's smart-skip
/// (spec §4.2): splits a `"<cat> in <loc>"`-shaped query on its known
/// separator and builds a plain TEXTSEARCH without a model call.
pub fn legacy_route_decision(query: &str) -> (RouteDecision, ProviderParameters) {
	let trimmed = query.trim();
	let lower = trimmed.to_lowercase();

	let split = LEGACY_SEPARATORS.iter().find_map(|sep| {
		let needle = format!(" {sep} ");
		lower
			.find(&needle)
			.map(|idx| (idx, idx + needle.len()))
	});

	let text_query = match split {
		Some((start, end)) => {
			let category = trimmed[..start].trim();
			let location = trimmed[end..].trim();
			format!("{category} {location}")
		}
		None => trimmed.to_string(),
	};

	let decision = RouteDecision {
		route: Route::Textsearch,
		language_hint: "und".to_string(),
		region_hint: None,
		confidence: 0.5,
		reason_tag: "legacy_heuristic".to_string(),
	};
	let params = ProviderParameters::TextSearch {
		text_query,
		region: None,
		language: "und".to_string(),
		bias: None,
	};
	(decision, params)
}

fn map_parameters(
	decision: &RouteDecision,
	raw: &RawRoute,
	user_coordinates: Option<LatLng>,
) -> ProviderParameters {
	match decision.route {
		Route::Nearby => ProviderParameters::Nearby {
			center: user_coordinates.expect("NEARBY route always has coordinates"),
			radius_meters: 5_000.0,
			keyword: raw.category_text.clone(),
			region: decision.region_hint.clone(),
			language: decision.language_hint.clone(),
		},
		Route::Landmark => ProviderParameters::Landmark {
			geocode_query: raw
				.geocode_query
				.clone()
				.unwrap_or_else(|| raw.location_text.clone()),
			radius_meters: 2_000.0,
			keyword: raw.category_text.clone(),
		},
		Route::Textsearch => {
			let bias = user_coordinates.map(|c| GeoBias {
				bias_lat: c.lat,
				bias_lng: c.lng,
				bias_radius_meters: 10_000.0,
			});
			ProviderParameters::TextSearch {
				text_query: format!("{} {}", raw.category_text, raw.location_text)
					.trim()
					.to_string(),
				region: decision.region_hint.clone(),
				language: decision.language_hint.clone(),
				bias,
			}
		}
	}
}

/// Forces `RouteDecision`/`ProviderParameters` to NEARBY regardless of
/// what the route selector proposed — the deterministic override in
/// spec §4.1, idempotent per spec §8 property 8.
pub fn force_nearby(
	decision: RouteDecision,
	params: ProviderParameters,
	user_coordinates: LatLng,
) -> (RouteDecision, ProviderParameters) {
	if decision.route == Route::Nearby {
		return (decision, params);
	}

	let keyword = match &params {
		ProviderParameters::TextSearch { text_query, .. } => text_query.clone(),
		ProviderParameters::Nearby { keyword, .. } => keyword.clone(),
		ProviderParameters::Landmark { keyword, .. } => keyword.clone(),
	};

	let new_decision = RouteDecision {
		route: Route::Nearby,
		reason_tag: "near_me_override".to_string(),
		..decision
	};
	let new_params = ProviderParameters::Nearby {
		center: user_coordinates,
		radius_meters: 5_000.0,
		keyword,
		region: new_decision.region_hint.clone(),
		language: new_decision.language_hint.clone(),
	};
	(new_decision, new_params)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn force_nearby_is_idempotent() {
		let decision = RouteDecision {
			route: Route::Nearby,
			language_hint: "en".into(),
			region_hint: None,
			confidence: 0.9,
			reason_tag: "model_decision".into(),
		};
		let params = ProviderParameters::Nearby {
			center: LatLng { lat: 1.0, lng: 2.0 },
			radius_meters: 5000.0,
			keyword: "pizza".into(),
			region: None,
			language: "en".into(),
		};
		let (d2, _) = force_nearby(decision, params, LatLng { lat: 1.0, lng: 2.0 });
		assert_eq!(d2.route, Route::Nearby);
	}

	#[test]
	fn force_nearby_overrides_textsearch() {
		let decision = RouteDecision {
			route: Route::Textsearch,
			language_hint: "en".into(),
			region_hint: None,
			confidence: 0.9,
			reason_tag: "model_decision".into(),
		};
		let params = ProviderParameters::TextSearch {
			text_query: "pizza".into(),
			region: None,
			language: "en".into(),
			bias: None,
		};
		let (d2, p2) = force_nearby(decision, params, LatLng { lat: 1.0, lng: 2.0 });
		assert_eq!(d2.route, Route::Nearby);
		assert!(matches!(p2, ProviderParameters::Nearby { .. }));
	}
}

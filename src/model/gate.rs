use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FoodSignal {
	No,
	Uncertain,
	Yes,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateRoute {
	Core,
	Full,
	Clarify,
	Stop,
}

/// Output of the intent gate (C2), spec §3/§4.2.
///
/// Invariant enforced by [`GateDecision::new`]: `route = Clarify` only
/// when the query has neither a food signal nor a location anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateDecision {
	pub food_signal: FoodSignal,
	pub confidence: f64,
	pub route: GateRoute,
	pub has_food: bool,
	pub has_location: bool,
	pub has_modifiers: bool,
	pub language: String,
	/// Present when the gate fell back to a synthesized decision
	/// (timeout or invalid schema) instead of a model call.
	pub reason: Option<String>,
}

impl GateDecision {
	/// Derives `route` from the model's raw classification per spec §4.2's
	/// routing rules, then constructs the decision.
	pub fn from_classification(
		food_signal: FoodSignal,
		confidence: f64,
		has_food: bool,
		has_location: bool,
		has_modifiers: bool,
		language: String,
	) -> Self {
		let route = if food_signal == FoodSignal::No {
			GateRoute::Stop
		} else if !has_food && !has_location {
			GateRoute::Clarify
		} else if food_signal == FoodSignal::Yes
			&& has_food
			&& has_location
			&& confidence >= crate::global::GATE_CORE_CONFIDENCE_THRESHOLD
			&& !has_modifiers
		{
			GateRoute::Core
		} else {
			GateRoute::Full
		};

		Self {
			food_signal,
			confidence,
			route,
			has_food,
			has_location,
			has_modifiers,
			language,
			reason: None,
		}
	}

	/// The synthesized decision the orchestrator substitutes on gate
	/// timeout or schema-invalid output (spec §4.2).
	pub fn fallback(reason: &str) -> Self {
		Self {
			food_signal: FoodSignal::Uncertain,
			confidence: 0.0,
			route: GateRoute::Full,
			has_food: false,
			has_location: false,
			has_modifiers: false,
			language: "und".to_string(),
			reason: Some(reason.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn clarify_requires_no_food_and_no_location() {
		let d = GateDecision::from_classification(
			FoodSignal::Uncertain,
			0.2,
			false,
			false,
			false,
			"en".into(),
		);
		assert_eq!(d.route, GateRoute::Clarify);
	}

	#[test]
	fn stop_when_signal_is_no() {
		let d = GateDecision::from_classification(
			FoodSignal::No,
			0.9,
			true,
			true,
			false,
			"en".into(),
		);
		assert_eq!(d.route, GateRoute::Stop);
	}

	#[test]
	fn core_requires_high_confidence_and_no_modifiers() {
		let d = GateDecision::from_classification(
			FoodSignal::Yes,
			0.9,
			true,
			true,
			false,
			"en".into(),
		);
		assert_eq!(d.route, GateRoute::Core);

		let with_modifiers = GateDecision::from_classification(
			FoodSignal::Yes,
			0.9,
			true,
			true,
			true,
			"en".into(),
		);
		assert_eq!(with_modifiers.route, GateRoute::Full);

		let low_confidence = GateDecision::from_classification(
			FoodSignal::Yes,
			0.5,
			true,
			true,
			false,
			"en".into(),
		);
		assert_eq!(low_confidence.route, GateRoute::Full);
	}
}

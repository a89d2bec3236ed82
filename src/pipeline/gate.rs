/*
 * src/pipeline/gate.rs
 *
 * Intent Gate (C2). Single model call bounded by a timeout; on timeout
 * or schema-invalid output, synthesizes a fallback decision instead of
 * failing the request (spec §4.2).
 */

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::llm::{CallOpts, ModelAdapter, schema};
use crate::model::gate::{FoodSignal, GateDecision};
use crate::obs;

const GATE_PROMPT_VERSION: &str = "gate-prompt.v1";
const GATE_SYSTEM_PROMPT: &str = "You classify whether a restaurant-search query names food and a \
location. Respond only with JSON matching the provided schema.";

#[derive(Debug, Deserialize)]
struct RawGate {
	food_signal: String,
	confidence: f64,
	has_food: bool,
	has_location: bool,
	has_modifiers: bool,
	language: String,
}

pub struct IntentGate<A: ModelAdapter> {
	adapter: Arc<A>,
}

impl<A: ModelAdapter> IntentGate<A> {
	pub fn new(adapter: Arc<A>) -> Self {
		Self { adapter }
	}

	/// Runs the gate with a timeout. Never returns `Err` — on timeout or
	/// schema failure it returns [`GateDecision::fallback`] instead, per
	/// spec §4.2.
	pub async fn run(&self, query: &str, opts: &CallOpts, timeout: Duration) -> GateDecision {
		let call = self.adapter.complete_json(
			GATE_SYSTEM_PROMPT,
			query,
			schema::GATE_SCHEMA,
			schema::GATE_SCHEMA_VERSION,
			opts,
		);

		match tokio::time::timeout(timeout, call).await {
			Err(_elapsed) => {
				obs::gate_fallback_used(&opts.request_id, "gate_timeout");
				GateDecision::fallback("gate_timeout")
			}
			Ok(Err(_model_err)) => {
				obs::gate_fallback_used(&opts.request_id, "invalid_schema");
				GateDecision::fallback("invalid_schema")
			}
			Ok(Ok(value)) => match serde_json::from_value::<RawGate>(value) {
				Ok(raw) => {
					let signal = match raw.food_signal.as_str() {
						"YES" => FoodSignal::Yes,
						"NO" => FoodSignal::No,
						_ => FoodSignal::Uncertain,
					};
					GateDecision::from_classification(
						signal,
						raw.confidence,
						raw.has_food,
						raw.has_location,
						raw.has_modifiers,
						raw.language,
					)
				}
				Err(_) => {
					obs::gate_fallback_used(&opts.request_id, "invalid_schema");
					GateDecision::fallback("invalid_schema")
				}
			},
		}
	}

	pub fn prompt_version() -> &'static str {
		GATE_PROMPT_VERSION
	}

	pub fn prompt_hash() -> String {
		crate::llm::prompt_hash(GATE_SYSTEM_PROMPT)
	}
}

/// Spec §4.2's "smart skip": a gate timeout paired with a simple,
/// unambiguous `"<cat> in <loc>"` pattern (latin or a known non-latin
/// script) lets the orchestrator skip full extraction and fall back to
/// legacy heuristic parsing instead.
pub fn matches_simple_pattern(query: &str) -> bool {
	simple_pattern_regex().is_match(query.trim())
}

fn simple_pattern_regex() -> &'static Regex {
	static RE: once_cell::sync::OnceCell<Regex> = once_cell::sync::OnceCell::new();
	RE.get_or_init(|| {
		Regex::new(
			r"(?xi)
			^
			[\p{L}\p{N}\s]{2,40}
			\s+(in|at|near|ב|ליד|في|en)\s+
			[\p{L}\p{N}\s]{2,40}
			$
			",
		)
		.expect("simple pattern regex is valid")
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn recognizes_simple_latin_pattern() {
		assert!(matches_simple_pattern("pizza in Ashdod"));
		assert!(matches_simple_pattern("sushi near Tel Aviv"));
	}

	#[test]
	fn recognizes_simple_hebrew_pattern() {
		assert!(matches_simple_pattern("פיצה ב תל אביב"));
	}

	#[test]
	fn rejects_complex_query() {
		assert!(!matches_simple_pattern(
			"cheap vegan pizza open now near me with parking"
		));
	}
}

/*
 * src/pipeline/filters.rs
 *
 * Base and post-constraint filter extractors (C4). Run as an
 * independent group alongside the route stage (spec §4.4/§5); each has
 * its own timeout and falls back to an all-null default rather than
 * failing the request.
 */

use std::sync::Arc;
use std::time::Duration;

use crate::llm::{CallOpts, ModelAdapter, schema};
use crate::model::filters::{BaseFilters, PostConstraints};
use crate::obs;

const BASE_PROMPT_VERSION: &str = "base-filters-prompt.v1";
const BASE_SYSTEM_PROMPT: &str = "Extract base search filters (language, opening-hours state) \
from a restaurant-search query. Respond only with JSON matching the provided schema. Omit fields \
that are not mentioned.";

const POST_PROMPT_VERSION: &str = "post-constraints-prompt.v1";
const POST_SYSTEM_PROMPT: &str = "Extract post-filter constraints (opening hours, price level, \
kosher, accessibility, parking) mentioned in a restaurant-search query. Respond only with JSON \
matching the provided schema. Omit fields that are not mentioned.";

pub fn base_prompt_version() -> &'static str {
	BASE_PROMPT_VERSION
}

pub fn base_prompt_hash() -> String {
	crate::llm::prompt_hash(BASE_SYSTEM_PROMPT)
}

pub fn post_prompt_version() -> &'static str {
	POST_PROMPT_VERSION
}

pub fn post_prompt_hash() -> String {
	crate::llm::prompt_hash(POST_SYSTEM_PROMPT)
}

pub struct BaseFilterExtractor<A: ModelAdapter> {
	adapter: Arc<A>,
}

impl<A: ModelAdapter> BaseFilterExtractor<A> {
	pub fn new(adapter: Arc<A>) -> Self {
		Self { adapter }
	}

	/// Never fails the request: a timeout or invalid-schema response
	/// yields [`BaseFilters::default`] (spec §4.4).
	pub async fn run(&self, query: &str, opts: &CallOpts, timeout: Duration) -> BaseFilters {
		let call = self.adapter.complete_json(
			BASE_SYSTEM_PROMPT,
			query,
			schema::BASE_FILTERS_SCHEMA,
			schema::BASE_FILTERS_SCHEMA_VERSION,
			opts,
		);

		match tokio::time::timeout(timeout, call).await {
			Err(_) => {
				obs::gate_fallback_used(&opts.request_id, "base_filters_timeout");
				BaseFilters::default()
			}
			Ok(Err(_)) => {
				obs::gate_fallback_used(&opts.request_id, "base_filters_invalid_schema");
				BaseFilters::default()
			}
			Ok(Ok(value)) => serde_json::from_value(value).unwrap_or_else(|_| {
				obs::gate_fallback_used(&opts.request_id, "base_filters_invalid_schema");
				BaseFilters::default()
			}),
		}
	}
}

pub struct PostConstraintExtractor<A: ModelAdapter> {
	adapter: Arc<A>,
}

impl<A: ModelAdapter> PostConstraintExtractor<A> {
	pub fn new(adapter: Arc<A>) -> Self {
		Self { adapter }
	}

	/// Never fails the request: a timeout or invalid-schema response
	/// yields [`PostConstraints::default`] (spec §4.4).
	pub async fn run(&self, query: &str, opts: &CallOpts, timeout: Duration) -> PostConstraints {
		let call = self.adapter.complete_json(
			POST_SYSTEM_PROMPT,
			query,
			schema::POST_CONSTRAINTS_SCHEMA,
			schema::POST_CONSTRAINTS_SCHEMA_VERSION,
			opts,
		);

		match tokio::time::timeout(timeout, call).await {
			Err(_) => {
				obs::gate_fallback_used(&opts.request_id, "post_constraints_timeout");
				PostConstraints::default()
			}
			Ok(Err(_)) => {
				obs::gate_fallback_used(&opts.request_id, "post_constraints_invalid_schema");
				PostConstraints::default()
			}
			Ok(Ok(value)) => serde_json::from_value(value).unwrap_or_else(|_| {
				obs::gate_fallback_used(&opts.request_id, "post_constraints_invalid_schema");
				PostConstraints::default()
			}),
		}
	}
}

/// Runs both extractors concurrently, as spec §5 requires for the
/// filter group — neither extractor waits on the other.
pub async fn run_filter_group<A: ModelAdapter>(
	base: &BaseFilterExtractor<A>,
	post: &PostConstraintExtractor<A>,
	query: &str,
	base_opts: &CallOpts,
	post_opts: &CallOpts,
	timeout: Duration,
) -> (BaseFilters, PostConstraints) {
	tokio::join!(
		base.run(query, base_opts, timeout),
		post.run(query, post_opts, timeout)
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::llm::StubModelAdapter;
	use serde_json::json;

	fn opts(stage: &'static str) -> CallOpts {
		CallOpts {
			stage,
			prompt_version: "v1",
			prompt_hash: "abc".into(),
			request_id: "req-1".into(),
			trace_id: "trace-1".into(),
			session_id: None,
		}
	}

	#[tokio::test]
	async fn base_extractor_returns_default_on_failure() {
		let adapter = Arc::new(StubModelAdapter::new().with_failure("base_filters"));
		let extractor = BaseFilterExtractor::new(adapter);
		let result = extractor
			.run("pizza", &opts("base_filters"), Duration::from_secs(1))
			.await;
		assert!(result.language.is_none());
	}

	#[tokio::test]
	async fn post_extractor_parses_stubbed_response() {
		let adapter = Arc::new(
			StubModelAdapter::new().with_response("post_constraints", json!({"price_level": 2})),
		);
		let extractor = PostConstraintExtractor::new(adapter);
		let result = extractor
			.run("cheap pizza", &opts("post_constraints"), Duration::from_secs(1))
			.await;
		assert_eq!(result.price_level, Some(2));
	}
}

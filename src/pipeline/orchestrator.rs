/*
 * src/pipeline/orchestrator.rs
 *
 * Pipeline Orchestrator (C1). Drives the staged sequence in spec §4.1:
 * gate → early exit → near-me override → route+mapping → parallel
 * filter extraction → provider call → post-filter → response build →
 * publish. Owns `PipelineContext` for the lifetime of one request and
 * never shares it across requests.
 */

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::error::{FailureReason, PipelineError};
use crate::jobs::{ChannelMessage, JobStore, PushChannel};
use crate::jobs::channel::ServerMessageType;
use crate::llm::{CallOpts, ModelAdapter};
use crate::model::context::PipelineContext;
use crate::model::filters::{FinalFilters, OpenState, resolve_filters};
use crate::model::gate::{FoodSignal, GateDecision, GateRoute};
use crate::model::job::JobStatus;
use crate::model::request::SearchRequest;
use crate::model::response::{AssistMessage, AssistType, ResponseMeta, ResultItem, SearchResponse};
use crate::obs;
use crate::pipeline::filters::{
	BaseFilterExtractor, PostConstraintExtractor, base_prompt_hash, base_prompt_version,
	post_prompt_hash, post_prompt_version, run_filter_group,
};
use crate::pipeline::gate::IntentGate;
use crate::pipeline::near_me::query_has_near_me_marker;
use crate::pipeline::postfilter;
use crate::pipeline::route::{RouteSelector, force_nearby, legacy_route_decision};
use crate::provider::backend::PlacesBackend;
use crate::provider::client::PlaceProviderClient;

pub struct Orchestrator<A: ModelAdapter, B: PlacesBackend> {
	gate: IntentGate<A>,
	route_selector: RouteSelector<A>,
	base_extractor: BaseFilterExtractor<A>,
	post_extractor: PostConstraintExtractor<A>,
	provider: PlaceProviderClient<B>,
	job_store: Arc<dyn JobStore>,
	push_channel: Arc<PushChannel>,
	gate_timeout: Duration,
	full_intent_timeout: Duration,
	filter_timeout: Duration,
	provider_timeout: Duration,
}

impl<A: ModelAdapter, B: PlacesBackend> Orchestrator<A, B> {
	pub fn new(
		adapter: Arc<A>,
		provider: PlaceProviderClient<B>,
		job_store: Arc<dyn JobStore>,
		push_channel: Arc<PushChannel>,
		config: &AppConfig,
	) -> Self {
		Self {
			gate: IntentGate::new(adapter.clone()),
			route_selector: RouteSelector::new(adapter.clone()),
			base_extractor: BaseFilterExtractor::new(adapter.clone()),
			post_extractor: PostConstraintExtractor::new(adapter),
			provider,
			job_store,
			push_channel,
			gate_timeout: config.gate_timeout,
			full_intent_timeout: config.full_intent_timeout,
			filter_timeout: config.filter_timeout,
			provider_timeout: config.provider_timeout,
		}
	}

	/// Entry point for sync mode (spec §4.1).
	pub async fn run_sync(&self, request: &SearchRequest) -> SearchResponse {
		self.run(request, None).await
	}

	/// Entry point for async mode: spawns the pipeline in the background
	/// and publishes the terminal event once it completes. The caller is
	/// responsible for having already called `job_store.create(id)` and
	/// answered the client with HTTP 202 before invoking this.
	pub fn spawn_async(self: Arc<Self>, request: SearchRequest) {
		let enqueued_at = Instant::now();
		tokio::spawn(async move {
			let id = request.request_id.clone();
			if let Err(e) = self.job_store.set_status(&id, JobStatus::Running).await {
				tracing::error!(request_id = %id, error = %e, "failed to mark job running");
			}

			let response = self.run(&request, Some(enqueued_at)).await;

			let message_type = match response.meta.failure_reason {
				FailureReason::None | FailureReason::NoResults => ServerMessageType::Results,
				_ => ServerMessageType::Error,
			};
			let data = serde_json::to_value(&response).unwrap_or(serde_json::Value::Null);

			if let Err(e) = self.job_store.set_result(&id, response).await {
				tracing::error!(request_id = %id, error = %e, "failed to persist job result");
			}

			self.push_channel.publish(
				crate::global::CHANNEL_SEARCH,
				&id,
				ChannelMessage {
					channel: crate::global::CHANNEL_SEARCH.to_string(),
					request_id: id,
					message_type,
					data,
				},
			);
		});
	}

	async fn run(&self, request: &SearchRequest, enqueued_at: Option<Instant>) -> SearchResponse {
		let mut ctx = PipelineContext::new(
			request.request_id.clone(),
			request.session_id.clone(),
			request.user_location,
		);
		if let Some(instant) = enqueued_at {
			ctx.job_enqueue_instant = Some(instant);
		}

		let query = &request.query;

		obs::stage_started(&ctx.request_id, "gate");
		let t0 = Instant::now();
		let gate_decision = match &request.category_hint {
			Some(_) => {
				ctx.flags.gate_used = false;
				GateDecision::from_classification(
					FoodSignal::Yes,
					1.0,
					true,
					request.user_location.is_some() || request.region_hint.is_some(),
					false,
					"und".to_string(),
				)
			}
			None => {
				ctx.flags.gate_used = true;
				let opts = self.call_opts("gate", IntentGate::<A>::prompt_version(), IntentGate::<A>::prompt_hash(), &ctx);
				self.gate.run(query, &opts, self.gate_timeout).await
			}
		};
		let gate_elapsed = t0.elapsed().as_millis() as u64;
		ctx.record_stage("gate", gate_elapsed);
		obs::stage_completed(
			&ctx.request_id,
			"gate",
			gate_elapsed,
			&format!("route={:?} reason={:?}", gate_decision.route, gate_decision.reason),
		);

		match gate_decision.route {
			GateRoute::Clarify => {
				return self.finish(&ctx, self.clarify_response(&ctx));
			}
			GateRoute::Stop => {
				return self.finish(&ctx, self.stop_response(&ctx));
			}
			GateRoute::Core | GateRoute::Full => {}
		}

		let has_near_me_marker = query_has_near_me_marker(query);
		if has_near_me_marker && ctx.user_coordinates.is_none() {
			obs::near_me_location_required(&ctx.request_id);
			return self.finish(&ctx, self.location_required_response(&ctx));
		}

		let gate_timed_out = gate_decision.reason.as_deref() == Some("gate_timeout");
		let use_legacy_routing = gate_timed_out && crate::pipeline::gate::matches_simple_pattern(query);

		obs::stage_started(&ctx.request_id, "route");
		let t1 = Instant::now();
		let route_result = if use_legacy_routing {
			ctx.flags.full_intent_used = false;
			obs::intent_full_skipped(&ctx.request_id, "gate_timeout_simple_query");
			Ok(legacy_route_decision(query))
		} else {
			ctx.flags.full_intent_used = true;
			let opts = self.call_opts(
				"route",
				RouteSelector::<A>::prompt_version(),
				RouteSelector::<A>::prompt_hash(),
				&ctx,
			);
			self.route_selector
				.run(query, ctx.user_coordinates, &opts, self.full_intent_timeout)
				.await
		};
		let route_elapsed = t1.elapsed().as_millis() as u64;
		ctx.record_stage("route", route_elapsed);

		let (mut route_decision, mut provider_params) = match route_result {
			Ok(pair) => {
				obs::stage_completed(
					&ctx.request_id,
					"route",
					route_elapsed,
					&format!("route={:?}", pair.0.route),
				);
				pair
			}
			Err(err) => {
				obs::stage_completed(&ctx.request_id, "route", route_elapsed, "error");
				return self.finish(&ctx, self.pipeline_error_response(&ctx, err));
			}
		};

		if has_near_me_marker {
			let proposed = route_decision.route;
			let coordinates = ctx.user_coordinates.expect("checked above");
			let (decision, params) = force_nearby(route_decision, provider_params, coordinates);
			if proposed != crate::model::route::Route::Nearby {
				obs::near_me_override(&ctx.request_id, &format!("{proposed:?}"));
			}
			route_decision = decision;
			provider_params = params;
			ctx.flags.near_me_override = true;
		}

		obs::stage_started(&ctx.request_id, "filters");
		let t2 = Instant::now();
		let base_opts = self.call_opts("base_filters", base_prompt_version(), base_prompt_hash(), &ctx);
		let post_opts = self.call_opts("post_constraints", post_prompt_version(), post_prompt_hash(), &ctx);
		let (base_filters, post_constraints) = run_filter_group(
			&self.base_extractor,
			&self.post_extractor,
			query,
			&base_opts,
			&post_opts,
			self.filter_timeout,
		)
		.await;
		let filters_elapsed = t2.elapsed().as_millis() as u64;
		ctx.record_stage("filters", filters_elapsed);
		obs::stage_completed(&ctx.request_id, "filters", filters_elapsed, "");

		let final_filters = resolve_filters(
			&base_filters,
			&post_constraints,
			Some(route_decision.language_hint.as_str()),
			route_decision
				.region_hint
				.as_deref()
				.or(request.region_hint.as_deref()),
		);

		obs::stage_started(&ctx.request_id, "provider");
		let t3 = Instant::now();
		let open_now_sensitive = final_filters.open_state == Some(OpenState::OpenNow);
		let provider_result = self
			.provider
			.search(route_decision.route, &provider_params, open_now_sensitive, self.provider_timeout)
			.await;
		let provider_elapsed = t3.elapsed().as_millis() as u64;
		ctx.record_stage("provider", provider_elapsed);

		let candidates = match provider_result {
			Ok(candidates) => {
				obs::stage_completed(
					&ctx.request_id,
					"provider",
					provider_elapsed,
					&format!("count={}", candidates.len()),
				);
				candidates
			}
			Err(err) => {
				obs::stage_completed(&ctx.request_id, "provider", provider_elapsed, "error");
				return self.finish(&ctx, self.pipeline_error_response(&ctx, err));
			}
		};

		if open_now_sensitive && !candidates.is_empty() && candidates.iter().all(|c| c.open_now.is_unknown()) {
			return self.finish(
				&ctx,
				self.pipeline_error_response(&ctx, PipelineError::LiveDataUnavailable),
			);
		}

		obs::stage_started(&ctx.request_id, "postfilter");
		let t4 = Instant::now();
		let (kept, stats) = postfilter::apply(candidates, &final_filters);
		let postfilter_elapsed = t4.elapsed().as_millis() as u64;
		ctx.record_stage("postfilter", postfilter_elapsed);
		obs::stage_completed(
			&ctx.request_id,
			"postfilter",
			postfilter_elapsed,
			&format!("kept={} input={}", stats.kept_count, stats.input_count),
		);

		let results: Vec<ResultItem> = kept.iter().map(ResultItem::from).collect();
		let chips = build_chips(&final_filters);
		let failure_reason = if results.is_empty() {
			FailureReason::NoResults
		} else {
			FailureReason::None
		};
		let assist = if failure_reason != FailureReason::None {
			Some(assist_for_reason(failure_reason))
		} else {
			None
		};

		let response = SearchResponse {
			request_id: ctx.request_id.clone(),
			session_id: ctx.session_id.clone(),
			results,
			chips,
			meta: ResponseMeta {
				duration_ms: ctx.elapsed_ms(),
				applied_filters: final_filters,
				failure_reason,
				source: "pipeline".to_string(),
			},
			assist,
		};

		self.finish(&ctx, response)
	}

	fn call_opts(&self, stage: &'static str, prompt_version: &'static str, prompt_hash: String, ctx: &PipelineContext) -> CallOpts {
		CallOpts {
			stage,
			prompt_version,
			prompt_hash,
			request_id: ctx.request_id.clone(),
			trace_id: ctx.trace_id.clone(),
			session_id: ctx.session_id.clone(),
		}
	}

	fn clarify_response(&self, ctx: &PipelineContext) -> SearchResponse {
		SearchResponse::empty_with_failure(
			ctx.request_id.clone(),
			ctx.session_id.clone(),
			FailureReason::LowConfidence,
			assist_for_reason(FailureReason::LowConfidence),
			ctx.elapsed_ms(),
		)
	}

	fn stop_response(&self, ctx: &PipelineContext) -> SearchResponse {
		SearchResponse {
			request_id: ctx.request_id.clone(),
			session_id: ctx.session_id.clone(),
			results: vec![],
			chips: vec![],
			meta: ResponseMeta {
				duration_ms: ctx.elapsed_ms(),
				applied_filters: FinalFilters::default(),
				failure_reason: FailureReason::None,
				source: "pipeline".to_string(),
			},
			assist: Some(AssistMessage {
				assist_type: AssistType::Confirm,
				message: "I can only help with restaurant and food search.".to_string(),
				suggested_actions: vec![],
			}),
		}
	}

	fn location_required_response(&self, ctx: &PipelineContext) -> SearchResponse {
		SearchResponse::empty_with_failure(
			ctx.request_id.clone(),
			ctx.session_id.clone(),
			FailureReason::LocationRequired,
			assist_for_reason(FailureReason::LocationRequired),
			ctx.elapsed_ms(),
		)
	}

	fn pipeline_error_response(&self, ctx: &PipelineContext, err: PipelineError) -> SearchResponse {
		let reason = FailureReason::from(&err);
		SearchResponse::empty_with_failure(
			ctx.request_id.clone(),
			ctx.session_id.clone(),
			reason,
			assist_for_reason(reason),
			ctx.elapsed_ms(),
		)
	}

	/// Single place that emits `pipeline_completed` (spec §4.1): every
	/// exit point from `run` passes through here exactly once.
	fn finish(&self, ctx: &PipelineContext, response: SearchResponse) -> SearchResponse {
		let wall_clock_ms = ctx.elapsed_ms();
		let sum_timings_ms = ctx.sum_timings_ms();
		let unaccounted_ms = wall_clock_ms as i64 - sum_timings_ms as i64;
		obs::pipeline_completed(
			&ctx.request_id,
			wall_clock_ms,
			sum_timings_ms,
			unaccounted_ms,
			ctx.queue_delay_ms(),
			ctx.flags.near_me_override,
		);
		response
	}
}

fn build_chips(filters: &FinalFilters) -> Vec<String> {
	let mut chips = Vec::new();
	if filters.open_state == Some(OpenState::OpenNow) {
		chips.push("Open now".to_string());
	}
	if let Some(level) = filters.price_level {
		chips.push(format!("Price ≤ {level}"));
	}
	if filters.is_kosher == Some(true) {
		chips.push("Kosher".to_string());
	}
	if filters.requires_accessible == Some(true) {
		chips.push("Accessible".to_string());
	}
	if filters.requires_parking == Some(true) {
		chips.push("Parking".to_string());
	}
	chips
}

fn assist_for_reason(reason: FailureReason) -> AssistMessage {
	match reason {
		FailureReason::LocationRequired => AssistMessage {
			assist_type: AssistType::Clarify,
			message: "I need your location to search nearby — please share it or name an area.".to_string(),
			suggested_actions: vec!["share_location".to_string(), "name_a_city".to_string()],
		},
		FailureReason::LowConfidence => AssistMessage {
			assist_type: AssistType::Clarify,
			message: "Could you say what kind of food and where you'd like to eat?".to_string(),
			suggested_actions: vec!["add_cuisine".to_string(), "add_location".to_string()],
		},
		FailureReason::GeocodingFailed => AssistMessage {
			assist_type: AssistType::Suggest,
			message: "I couldn't find that place — try a more specific address or a nearby landmark.".to_string(),
			suggested_actions: vec!["retry_with_address".to_string()],
		},
		FailureReason::LiveDataUnavailable => AssistMessage {
			assist_type: AssistType::Suggest,
			message: "I can't confirm which of these are open right now.".to_string(),
			suggested_actions: vec!["drop_open_now_filter".to_string()],
		},
		FailureReason::ProviderError => AssistMessage {
			assist_type: AssistType::Suggest,
			message: "The place search is temporarily unavailable — please try again shortly.".to_string(),
			suggested_actions: vec!["retry".to_string()],
		},
		FailureReason::NoResults => AssistMessage {
			assist_type: AssistType::Suggest,
			message: "No restaurants matched — try relaxing a filter like price or opening hours.".to_string(),
			suggested_actions: vec!["relax_filters".to_string()],
		},
		FailureReason::None => AssistMessage {
			assist_type: AssistType::Confirm,
			message: "Here are the results.".to_string(),
			suggested_actions: vec![],
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::jobs::{InMemoryJobStore, PushChannel};
	use crate::llm::StubModelAdapter;
	use crate::model::candidate::PlaceCandidate;
	use crate::model::request::{LatLng, SearchMode};
	use crate::provider::cache::PlaceCache;
	use async_trait::async_trait;
	use serde_json::json;

	struct NullBackend;

	#[async_trait]
	impl PlacesBackend for NullBackend {
		async fn text_search(
			&self,
			_text_query: &str,
			_region: Option<&str>,
			_language: &str,
			_bias: Option<(f64, f64, f64)>,
		) -> Result<Vec<PlaceCandidate>, crate::error::PrivateError> {
			Ok(vec![])
		}

		async fn nearby_search(
			&self,
			_center: LatLng,
			_radius_meters: f64,
			_keyword: &str,
			_language: &str,
		) -> Result<Vec<PlaceCandidate>, crate::error::PrivateError> {
			Ok(vec![])
		}

		async fn geocode(&self, _query: &str) -> Result<LatLng, crate::error::PrivateError> {
			Ok(LatLng { lat: 0.0, lng: 0.0 })
		}
	}

	fn make_orchestrator(adapter: StubModelAdapter) -> Orchestrator<StubModelAdapter, NullBackend> {
		let config = AppConfig::for_tests();
		let backend = Arc::new(NullBackend);
		let cache = Arc::new(PlaceCache::new(8, 60, None, 900, 120));
		let provider = PlaceProviderClient::new(backend, cache, 4);
		let job_store = Arc::new(InMemoryJobStore::new(60));
		let push_channel = Arc::new(PushChannel::new(10, 60));
		Orchestrator::new(Arc::new(adapter), provider, job_store, push_channel, &config)
	}

	struct NearbyOnlyBackend {
		candidates: Vec<PlaceCandidate>,
	}

	#[async_trait]
	impl PlacesBackend for NearbyOnlyBackend {
		async fn text_search(
			&self,
			_text_query: &str,
			_region: Option<&str>,
			_language: &str,
			_bias: Option<(f64, f64, f64)>,
		) -> Result<Vec<PlaceCandidate>, crate::error::PrivateError> {
			Ok(vec![])
		}

		async fn nearby_search(
			&self,
			_center: LatLng,
			_radius_meters: f64,
			_keyword: &str,
			_language: &str,
		) -> Result<Vec<PlaceCandidate>, crate::error::PrivateError> {
			Ok(self.candidates.clone())
		}

		async fn geocode(&self, _query: &str) -> Result<LatLng, crate::error::PrivateError> {
			Ok(LatLng { lat: 0.0, lng: 0.0 })
		}
	}

	fn sample_candidate(id: &str) -> PlaceCandidate {
		PlaceCandidate {
			provider_id: id.to_string(),
			display_name: "Pizza Place".to_string(),
			formatted_address: "1 Main St".to_string(),
			location: LatLng { lat: 32.08, lng: 34.78 },
			rating: Some(4.5),
			review_count: Some(120),
			price_level: Some(2),
			open_now: crate::model::candidate::OpenNow::Known(true),
			regular_hours: vec![],
			types: vec!["restaurant".to_string()],
			primary_type: Some("restaurant".to_string()),
			photo_refs: vec!["photo-1".to_string()],
			is_kosher: None,
			is_accessible: None,
			has_parking: None,
		}
	}

	fn request(query: &str, user_location: Option<LatLng>) -> SearchRequest {
		SearchRequest {
			request_id: "req-1".to_string(),
			query: query.to_string(),
			user_location,
			region_hint: None,
			session_id: None,
			mode: SearchMode::Sync,
			category_hint: None,
		}
	}

	#[tokio::test]
	async fn near_me_without_coordinates_returns_location_required() {
		let adapter = StubModelAdapter::new().with_response(
			"gate",
			json!({
				"food_signal": "YES",
				"confidence": 0.9,
				"has_food": true,
				"has_location": true,
				"has_modifiers": false,
				"language": "he"
			}),
		);
		let orchestrator = make_orchestrator(adapter);
		let req = request("מסעדות לידי", None);
		let response = orchestrator.run_sync(&req).await;
		assert_eq!(response.meta.failure_reason, FailureReason::LocationRequired);
		assert!(response.results.is_empty());
		assert!(response.assist.is_some());
	}

	#[tokio::test]
	async fn stop_route_returns_polite_refusal() {
		let adapter = StubModelAdapter::new().with_response(
			"gate",
			json!({
				"food_signal": "NO",
				"confidence": 0.95,
				"has_food": false,
				"has_location": false,
				"has_modifiers": false,
				"language": "en"
			}),
		);
		let orchestrator = make_orchestrator(adapter);
		let req = request("what's the weather today", None);
		let response = orchestrator.run_sync(&req).await;
		assert_eq!(response.meta.failure_reason, FailureReason::None);
		assert!(response.results.is_empty());
	}

	#[tokio::test]
	async fn textsearch_query_with_no_candidates_reports_no_results() {
		let adapter = StubModelAdapter::new()
			.with_response(
				"gate",
				json!({
					"food_signal": "YES",
					"confidence": 0.9,
					"has_food": true,
					"has_location": true,
					"has_modifiers": false,
					"language": "en"
				}),
			)
			.with_response(
				"route",
				json!({
					"route": "TEXTSEARCH",
					"language_hint": "en",
					"region_hint": null,
					"confidence": 0.9,
					"category_text": "pizza",
					"location_text": "Ashdod",
					"geocode_query": null
				}),
			)
			.with_response("base_filters", json!({}))
			.with_response("post_constraints", json!({}));
		let orchestrator = make_orchestrator(adapter);
		let req = request("pizza in Ashdod", None);
		let response = orchestrator.run_sync(&req).await;
		assert_eq!(response.meta.failure_reason, FailureReason::NoResults);
		assert!(response.assist.is_some());
	}

	#[tokio::test]
	async fn near_me_with_coordinates_forces_nearby_route_and_returns_results() {
		let adapter = StubModelAdapter::new()
			.with_response(
				"gate",
				json!({
					"food_signal": "YES",
					"confidence": 0.9,
					"has_food": true,
					"has_location": true,
					"has_modifiers": false,
					"language": "en"
				}),
			)
			.with_response(
				"route",
				json!({
					"route": "TEXTSEARCH",
					"language_hint": "en",
					"region_hint": null,
					"confidence": 0.9,
					"category_text": "pizza",
					"location_text": "here",
					"geocode_query": null
				}),
			)
			.with_response("base_filters", json!({}))
			.with_response("post_constraints", json!({}));

		let config = AppConfig::for_tests();
		let backend = Arc::new(NearbyOnlyBackend {
			candidates: vec![sample_candidate("place-1")],
		});
		let cache = Arc::new(PlaceCache::new(8, 60, None, 900, 120));
		let provider = PlaceProviderClient::new(backend, cache, 4);
		let job_store = Arc::new(InMemoryJobStore::new(60));
		let push_channel = Arc::new(PushChannel::new(10, 60));
		let orchestrator = Orchestrator::new(Arc::new(adapter), provider, job_store, push_channel, &config);

		let req = request("pizza near me", Some(LatLng { lat: 32.08, lng: 34.78 }));
		let response = orchestrator.run_sync(&req).await;

		assert_eq!(response.meta.failure_reason, FailureReason::None);
		assert_eq!(response.results.len(), 1);
		assert_eq!(response.results[0].provider_id, "place-1");
	}
}

/*
 * src/obs.rs
 *
 * Thin, fixed-shape wrappers around `tracing` for every event the spec
 * names explicitly (§4.1, §4.2, §4.5, §4.8, §9). Stage code calls these
 * instead of emitting its own `tracing::info!` lifecycle events, so the
 * "single log per stage" discipline (spec §9) is enforced by having
 * exactly one place that knows how to say "a stage started".
 */

use tracing::{debug, info};

pub fn stage_started(request_id: &str, stage: &str) {
	info!(target: "pipeline", request_id, stage, event = "stage_started");
}

pub fn stage_completed(request_id: &str, stage: &str, elapsed_ms: u64, extras: &str) {
	info!(
		target: "pipeline",
		request_id,
		stage,
		elapsed_ms,
		extras,
		event = "stage_completed"
	);
}

pub fn pipeline_completed(
	request_id: &str,
	wall_clock_ms: u64,
	sum_timings_ms: u64,
	unaccounted_ms: i64,
	queue_delay_ms: Option<u64>,
	near_me_override: bool,
) {
	info!(
		target: "pipeline",
		request_id,
		wall_clock_ms,
		sum_timings_ms,
		unaccounted_ms,
		queue_delay_ms,
		near_me_override,
		event = "pipeline_completed"
	);
}

pub fn gate_fallback_used(request_id: &str, reason: &str) {
	info!(target: "pipeline", request_id, reason, event = "gate_fallback_used");
}

pub fn intent_full_skipped(request_id: &str, reason: &str) {
	info!(target: "pipeline", request_id, reason, event = "intent_full_skipped");
}

pub fn near_me_override(request_id: &str, proposed_route: &str) {
	info!(
		target: "pipeline",
		request_id,
		proposed_route,
		reason = "near_me_override",
		event = "near_me_override"
	);
}

pub fn near_me_location_required(request_id: &str) {
	info!(target: "pipeline", request_id, event = "near_me_location_required");
}

/// One log entry per model call attempt (spec §4.8).
#[allow(clippy::too_many_arguments)]
pub fn llm_call(
	stage: &str,
	request_id: &str,
	trace_id: &str,
	session_id: Option<&str>,
	model_id: &str,
	schema_version: &str,
	schema_hash: &str,
	attempt: u32,
	build_prompt_ms: u64,
	network_ms: u64,
	parse_ms: u64,
	total_ms: u64,
	prompt_chars: usize,
	input_tokens: Option<u32>,
	output_tokens: Option<u32>,
	outcome: &str,
) {
	info!(
		target: "llm_adapter",
		stage,
		request_id,
		trace_id,
		session_id,
		model_id,
		schema_version,
		schema_hash,
		attempt,
		build_prompt_ms,
		network_ms,
		parse_ms,
		total_ms,
		prompt_chars,
		input_tokens,
		output_tokens,
		outcome,
		event = "llm_call"
	);
}

/// Cache lifecycle events (spec §4.5): exactly one `wrap_enter`, one
/// `hit` or `miss`, at most one `store`, and one `wrap_exit` per call.
pub fn cache_wrap_enter(key_hash_prefix: &str) {
	debug!(target: "cache", key_hash_prefix, event = "wrap_enter");
}

pub fn cache_hit(key_hash_prefix: &str, tier: &str, age_seconds: i64) {
	debug!(target: "cache", key_hash_prefix, tier, age_seconds, event = "hit");
}

pub fn cache_miss(key_hash_prefix: &str) {
	debug!(target: "cache", key_hash_prefix, event = "miss");
}

pub fn cache_store(key_hash_prefix: &str, tier: &str, ttl_remaining: u64) {
	debug!(target: "cache", key_hash_prefix, tier, ttl_remaining, event = "store");
}

pub fn cache_store_failed(key_hash_prefix: &str, tier: &str, reason: &str) {
	debug!(target: "cache", key_hash_prefix, tier, reason, event = "store_failed");
}

pub fn cache_wrap_exit(key_hash_prefix: &str) {
	debug!(target: "cache", key_hash_prefix, event = "wrap_exit");
}

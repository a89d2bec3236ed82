use std::collections::HashMap;

use crate::model::request::LatLng;

/// Flags the orchestrator threads through a single request (spec §3).
#[derive(Debug, Clone, Default)]
pub struct PipelineFlags {
	pub gate_used: bool,
	pub full_intent_used: bool,
	pub near_me_override: bool,
	pub assistant_strategy: Option<String>,
}

/// Per-request, mutable context owned exclusively by the orchestrator
/// (C1). Created on pipeline entry, destroyed on exit; never shared
/// across requests (spec §3/§5).
pub struct PipelineContext {
	pub request_id: String,
	pub trace_id: String,
	pub session_id: Option<String>,
	/// Monotonic instant the pipeline started, used only for elapsed-time math.
	pub start_instant: std::time::Instant,
	pub job_enqueue_instant: Option<std::time::Instant>,
	pub timings: HashMap<String, u64>,
	pub flags: PipelineFlags,
	pub user_coordinates: Option<LatLng>,
}

impl PipelineContext {
	pub fn new(request_id: String, session_id: Option<String>, user_coordinates: Option<LatLng>) -> Self {
		PipelineContext {
			request_id,
			trace_id: uuid::Uuid::new_v4().to_string(),
			session_id,
			start_instant: std::time::Instant::now(),
			job_enqueue_instant: None,
			timings: HashMap::new(),
			flags: PipelineFlags::default(),
			user_coordinates,
		}
	}

	pub fn elapsed_ms(&self) -> u64 {
		self.start_instant.elapsed().as_millis() as u64
	}

	pub fn record_stage(&mut self, stage: &str, elapsed_ms: u64) {
		self.timings.insert(stage.to_string(), elapsed_ms);
	}

	pub fn sum_timings_ms(&self) -> u64 {
		self.timings.values().sum()
	}

	pub fn queue_delay_ms(&self) -> Option<u64> {
		self.job_enqueue_instant
			.map(|enq| self.start_instant.saturating_duration_since(enq).as_millis() as u64)
	}
}

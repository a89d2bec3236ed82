/*
 * src/state.rs
 *
 * Shared application state threaded through handlers via `Extension`,
 * mirroring `main.rs`'s `Extension(pool)`/`Extension(cookie_key)`
 * dependency-injection convention.
 */

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::config::AppConfig;
use crate::jobs::{JobStore, PushChannel};
use crate::llm::LangchainModelAdapter;
use crate::pipeline::Orchestrator;
use crate::provider::backend::GooglePlacesBackend;

pub type CoreOrchestrator = Orchestrator<LangchainModelAdapter, GooglePlacesBackend>;

#[derive(Clone)]
pub struct AppState {
	pub orchestrator: Arc<CoreOrchestrator>,
	pub job_store: Arc<dyn JobStore>,
	pub push_channel: Arc<PushChannel>,
	pub config: Arc<AppConfig>,
	pub analytics: Arc<AnalyticsRing>,
	pub photo_rate_limiter: Arc<IpRateLimiter>,
	pub stats: Arc<PipelineStats>,
}

/// Process-wide request counters backing `GET /api/v1/search/stats`.
#[derive(Default)]
pub struct PipelineStats {
	pub total_requests: AtomicU64,
	pub failed_requests: AtomicU64,
}

#[derive(Serialize)]
pub struct StatsSnapshot {
	pub total_requests: u64,
	pub failed_requests: u64,
}

impl PipelineStats {
	pub fn snapshot(&self) -> StatsSnapshot {
		StatsSnapshot {
			total_requests: self.total_requests.load(Ordering::Relaxed),
			failed_requests: self.failed_requests.load(Ordering::Relaxed),
		}
	}
}

/// Bounded in-memory event ring for `/api/v1/analytics/events` (spec
/// §10.5/§11). Oldest events are dropped once `capacity` is exceeded;
/// the endpoint is interface-only, there is no downstream consumer.
pub struct AnalyticsRing {
	events: Mutex<VecDeque<Value>>,
	capacity: usize,
}

impl AnalyticsRing {
	pub fn new(capacity: usize) -> Self {
		Self {
			events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
			capacity,
		}
	}

	pub fn push(&self, event: Value) {
		let mut guard = self.events.lock();
		if guard.len() >= self.capacity {
			guard.pop_front();
		}
		guard.push_back(event);
	}

	pub fn len(&self) -> usize {
		self.events.lock().len()
	}
}

/// Per-source-IP sliding-window limiter for the photo-proxy endpoint
/// (spec §6: "rate-limited per source IP, default 60/minute").
pub struct IpRateLimiter {
	hits: DashMap<IpAddr, Mutex<VecDeque<Instant>>>,
	window: Duration,
	max: u32,
}

impl IpRateLimiter {
	pub fn new(window: Duration, max: u32) -> Self {
		Self {
			hits: DashMap::new(),
			window,
			max,
		}
	}

	/// Returns `true` if `ip` is still within its allowance; records the
	/// hit either way so a caller at the limit stays at the limit.
	pub fn check(&self, ip: IpAddr) -> bool {
		let entry = self.hits.entry(ip).or_insert_with(|| Mutex::new(VecDeque::new()));
		let mut hits = entry.lock();
		let now = Instant::now();
		while let Some(front) = hits.front() {
			if now.duration_since(*front) > self.window {
				hits.pop_front();
			} else {
				break;
			}
		}
		if hits.len() as u32 >= self.max {
			return false;
		}
		hits.push_back(now);
		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rate_limiter_blocks_after_max_hits() {
		let limiter = IpRateLimiter::new(Duration::from_secs(60), 2);
		let ip: IpAddr = "127.0.0.1".parse().unwrap();
		assert!(limiter.check(ip));
		assert!(limiter.check(ip));
		assert!(!limiter.check(ip));
	}

	#[test]
	fn analytics_ring_drops_oldest_past_capacity() {
		let ring = AnalyticsRing::new(2);
		ring.push(Value::from(1));
		ring.push(Value::from(2));
		ring.push(Value::from(3));
		assert_eq!(ring.len(), 2);
	}
}

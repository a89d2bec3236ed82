/*
 * src/provider/cache.rs
 *
 * Tiered place cache (C5): L0 in-flight dedupe, L1 process memory, L2
 * durable (redis), grounded on Blokmap-backend's `session.rs` use of
 * `redis::AsyncCommands` for get/set-with-expiry. Cache-key hashing
 * uses sha2, matching the adapter's schema-hash convention in
 * `llm/adapter.rs`.
 */

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Notify;

use crate::error::PrivateError;
use crate::model::candidate::PlaceCandidate;
use crate::model::route::ProviderParameters;
use crate::obs;

/// Canonicalizes provider parameters into a stable string: field order
/// is fixed by the struct's own `Serialize` derive and `serde_json`'s
/// map insertion order, so the only remaining source of instability is
/// incidental whitespace, which `to_string` (compact, no pretty-print)
/// never introduces. Spec §8 property 10.
fn canonicalize(params: &ProviderParameters) -> String {
	serde_json::to_string(params).expect("ProviderParameters always serializes")
}

fn hash_key(canonical: &str) -> String {
	let digest = Sha256::digest(canonical.as_bytes());
	hex::encode(digest)
}

fn log_prefix(full_hash: &str) -> &str {
	&full_hash[..full_hash.len().min(12)]
}

#[derive(Serialize, Deserialize)]
struct L2Envelope {
	created_at: i64,
	ttl_seconds: u64,
	payload: String,
}

struct L1Entry {
	payload: String,
	created_at: Instant,
	ttl: std::time::Duration,
}

struct L1Inner {
	map: HashMap<String, L1Entry>,
	order: VecDeque<String>,
	capacity: usize,
}

impl L1Inner {
	fn evict_if_needed(&mut self) {
		while self.order.len() > self.capacity {
			if let Some(oldest) = self.order.pop_front() {
				self.map.remove(&oldest);
			}
		}
	}
}

pub struct PlaceCache {
	l1: Mutex<L1Inner>,
	l1_ttl: std::time::Duration,
	l2: Option<ConnectionManager>,
	l2_ttl_seconds: u64,
	l2_open_now_ttl_seconds: u64,
	inflight: DashMap<String, Arc<Notify>>,
}

impl PlaceCache {
	pub fn new(
		l1_capacity: usize,
		l1_ttl_seconds: u64,
		l2: Option<ConnectionManager>,
		l2_ttl_seconds: u64,
		l2_open_now_ttl_seconds: u64,
	) -> Self {
		Self {
			l1: Mutex::new(L1Inner {
				map: HashMap::new(),
				order: VecDeque::new(),
				capacity: l1_capacity,
			}),
			l1_ttl: std::time::Duration::from_secs(l1_ttl_seconds),
			l2,
			l2_ttl_seconds,
			l2_open_now_ttl_seconds,
			inflight: DashMap::new(),
		}
	}

	fn l1_get(&self, key: &str) -> Option<String> {
		let guard = self.l1.lock();
		let entry = guard.map.get(key)?;
		if entry.created_at.elapsed() >= entry.ttl {
			return None;
		}
		Some(entry.payload.clone())
	}

	fn l1_store(&self, key: &str, payload: String) {
		let mut guard = self.l1.lock();
		if !guard.map.contains_key(key) {
			guard.order.push_back(key.to_string());
		}
		guard.map.insert(
			key.to_string(),
			L1Entry {
				payload,
				created_at: Instant::now(),
				ttl: self.l1_ttl,
			},
		);
		guard.evict_if_needed();
	}

	async fn l2_get(&self, key: &str) -> Option<(String, i64)> {
		let mut conn = self.l2.clone()?;
		let raw: Option<String> = conn.get(key).await.ok().flatten();
		let envelope: L2Envelope = serde_json::from_str(&raw?).ok()?;
		let now = Utc::now().timestamp();
		if now - envelope.created_at >= envelope.ttl_seconds as i64 {
			return None;
		}
		Some((envelope.payload, now - envelope.created_at))
	}

	async fn l2_store(&self, key: &str, payload: &str, ttl_seconds: u64) {
		let Some(mut conn) = self.l2.clone() else {
			return;
		};
		let envelope = L2Envelope {
			created_at: Utc::now().timestamp(),
			ttl_seconds,
			payload: payload.to_string(),
		};
		let serialized = match serde_json::to_string(&envelope) {
			Ok(s) => s,
			Err(_) => return,
		};
		let result: Result<(), redis::RedisError> =
			conn.set_ex(key, serialized, ttl_seconds).await;
		if let Err(e) = result {
			obs::cache_store_failed(log_prefix(key), "L2", &e.to_string());
		}
	}

	/// Looks up the tiered cache for `params`; on a full miss, runs
	/// `fetch` exactly once across all concurrently-waiting callers with
	/// the same canonicalized parameters (L0 dedupe), then populates
	/// L2 then L1 on success (spec §4.5).
	pub async fn get_or_fetch<F, Fut>(
		&self,
		params: &ProviderParameters,
		open_now_sensitive: bool,
		fetch: F,
	) -> Result<Vec<PlaceCandidate>, PrivateError>
	where
		F: FnOnce() -> Fut,
		Fut: std::future::Future<Output = Result<Vec<PlaceCandidate>, PrivateError>>,
	{
		let canonical = canonicalize(params);
		let full_hash = hash_key(&canonical);
		let prefix = log_prefix(&full_hash).to_string();
		obs::cache_wrap_enter(&prefix);

		loop {
			if let Some(payload) = self.l1_get(&full_hash) {
				obs::cache_hit(&prefix, "L1", 0);
				obs::cache_wrap_exit(&prefix);
				return deserialize(&payload);
			}

			if let Some((payload, age)) = self.l2_get(&full_hash).await {
				obs::cache_hit(&prefix, "L2", age);
				self.l1_store(&full_hash, payload.clone());
				obs::cache_wrap_exit(&prefix);
				return deserialize(&payload);
			}

			match self.inflight.entry(full_hash.clone()) {
				dashmap::mapref::entry::Entry::Occupied(existing) => {
					let notify = existing.get().clone();
					drop(existing);
					notify.notified().await;
					continue;
				}
				dashmap::mapref::entry::Entry::Vacant(slot) => {
					slot.insert(Arc::new(Notify::new()));
					break;
				}
			}
		}

		obs::cache_miss(&prefix);
		let result = fetch().await;

		if let Ok(candidates) = &result {
			if let Ok(payload) = serde_json::to_string(candidates) {
				let ttl_seconds = if open_now_sensitive {
					self.l2_open_now_ttl_seconds
				} else {
					self.l2_ttl_seconds
				};
				self.l2_store(&full_hash, &payload, ttl_seconds).await;
				self.l1_store(&full_hash, payload);
				obs::cache_store(&prefix, "L1+L2", ttl_seconds);
			}
		}

		if let Some((_, notify)) = self.inflight.remove(&full_hash) {
			notify.notify_waiters();
		}
		obs::cache_wrap_exit(&prefix);
		result
	}
}

fn deserialize(payload: &str) -> Result<Vec<PlaceCandidate>, PrivateError> {
	serde_json::from_str(payload).map_err(|e| PrivateError::Cache(e.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn canonicalization_is_stable_across_calls() {
		let params = ProviderParameters::TextSearch {
			text_query: "pizza Ashdod".into(),
			region: Some("IL".into()),
			language: "en".into(),
			bias: None,
		};
		let a = canonicalize(&params);
		let b = canonicalize(&params);
		assert_eq!(a, b);
		assert_eq!(hash_key(&a), hash_key(&b));
	}

	#[test]
	fn log_prefix_never_exceeds_full_hash() {
		let full = hash_key("x");
		assert!(log_prefix(&full).len() <= 12);
	}

	proptest::proptest! {
		/// Spec §8 property 10: hashing the same logical parameters twice,
		/// any number of times, always yields the same cache key.
		#[test]
		fn hash_key_is_stable_for_arbitrary_text_search_params(
			text_query in ".*",
			region in proptest::option::of(".*"),
			language in "[a-z]{2}",
		) {
			let params = ProviderParameters::TextSearch {
				text_query,
				region,
				language,
				bias: None,
			};
			let canonical_a = canonicalize(&params);
			let canonical_b = canonicalize(&params);
			proptest::prop_assert_eq!(&canonical_a, &canonical_b);
			proptest::prop_assert_eq!(hash_key(&canonical_a), hash_key(&canonical_b));
		}

		/// Distinct text queries must not collide onto the same cache key.
		#[test]
		fn distinct_text_queries_hash_differently(
			a in "[a-z]{3,12}",
			b in "[a-z]{3,12}",
		) {
			proptest::prop_assume!(a != b);
			let params_a = ProviderParameters::TextSearch {
				text_query: a,
				region: None,
				language: "en".into(),
				bias: None,
			};
			let params_b = ProviderParameters::TextSearch {
				text_query: b,
				region: None,
				language: "en".into(),
				bias: None,
			};
			proptest::prop_assert_ne!(
				hash_key(&canonicalize(&params_a)),
				hash_key(&canonicalize(&params_b))
			);
		}
	}
}

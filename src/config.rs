/*
 * src/config.rs
 *
 * Typed configuration loaded once at process start from environment
 * variables (see spec §6). Mirrors the teacher's convention of reading
 * required variables with `env::var(..).expect(..)` in `main.rs`, but
 * centralizes every knob the pipeline consults into one struct instead
 * of scattering `env::var` calls through stage code.
 */

use std::env;
use std::time::Duration;

use crate::global::*;

#[derive(Debug, Clone)]
pub struct AppConfig {
	pub bind_address: String,
	pub api_base_url: String,
	pub frontend_origins: Vec<String>,
	pub cookie_domain: Option<String>,

	pub gate_timeout: Duration,
	pub full_intent_timeout: Duration,
	pub filter_timeout: Duration,
	pub provider_timeout: Duration,

	pub rate_limit_window: Duration,
	pub rate_limit_max: u32,

	pub l2_cache_url: String,
	pub l2_cache_ttl_seconds: u64,
	pub l1_cache_capacity: usize,
	pub l1_cache_ttl_seconds: u64,

	pub job_ttl_seconds: u64,
	pub backlog_capacity: usize,
	pub backlog_ttl_seconds: u64,

	pub provider_api_key: String,
	pub model_api_key: String,

	pub session_cookie_ttl_seconds: i64,
	pub log_level: String,
	pub log_pretty: bool,

	/// Per-process ceiling on outbound provider calls in flight (spec §5 backpressure).
	pub provider_concurrency_limit: usize,
}

fn env_u64(name: &str, default: u64) -> u64 {
	env::var(name)
		.ok()
		.and_then(|v| v.parse().ok())
		.unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
	env::var(name)
		.ok()
		.and_then(|v| v.parse().ok())
		.unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
	env::var(name)
		.ok()
		.and_then(|v| v.parse().ok())
		.unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
	env::var(name)
		.ok()
		.map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
		.unwrap_or(default)
}

impl AppConfig {
	/// Loads configuration from the process environment.
	///
	/// Panics (fail-fast, matching spec §4.7's "shared store unreachable
	/// at boot" fail-fast policy) if a variable with no sane default is
	/// missing.
	pub fn from_env() -> Self {
		dotenvy::dotenv().ok();

		Self {
			bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3001".to_string()),
			api_base_url: env::var("API_BASE_URL")
				.unwrap_or_else(|_| "http://localhost:3001".to_string()),
			frontend_origins: env::var("FRONTEND_ORIGINS")
				.unwrap_or_default()
				.split(',')
				.map(|s| s.trim().to_string())
				.filter(|s| !s.is_empty())
				.collect(),
			cookie_domain: env::var("COOKIE_DOMAIN").ok(),

			gate_timeout: Duration::from_millis(env_u64(
				"GATE_TIMEOUT_MS",
				DEFAULT_GATE_TIMEOUT_MS,
			)),
			full_intent_timeout: Duration::from_millis(env_u64(
				"FULL_INTENT_TIMEOUT_MS",
				DEFAULT_FULL_INTENT_TIMEOUT_MS,
			)),
			filter_timeout: Duration::from_millis(env_u64(
				"FILTER_TIMEOUT_MS",
				DEFAULT_FILTER_TIMEOUT_MS,
			)),
			provider_timeout: Duration::from_millis(env_u64(
				"PROVIDER_TIMEOUT_MS",
				DEFAULT_PROVIDER_TIMEOUT_MS,
			)),

			rate_limit_window: Duration::from_millis(env_u64(
				"RATE_LIMIT_WINDOW_MS",
				DEFAULT_RATE_LIMIT_WINDOW_MS,
			)),
			rate_limit_max: env_u32("RATE_LIMIT_MAX", DEFAULT_RATE_LIMIT_MAX),

			l2_cache_url: env::var("L2_CACHE_URL")
				.unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
			l2_cache_ttl_seconds: env_u64("L2_CACHE_TTL_SECONDS", DEFAULT_L2_CACHE_TTL_SECONDS),
			l1_cache_capacity: env_usize("L1_CACHE_CAPACITY", DEFAULT_L1_CACHE_CAPACITY),
			l1_cache_ttl_seconds: env_u64("L1_CACHE_TTL_SECONDS", DEFAULT_L1_CACHE_TTL_SECONDS),

			job_ttl_seconds: env_u64("JOB_TTL_SECONDS", DEFAULT_JOB_TTL_SECONDS),
			backlog_capacity: env_usize("BACKLOG_CAPACITY", DEFAULT_BACKLOG_CAPACITY),
			backlog_ttl_seconds: env_u64("BACKLOG_TTL_SECONDS", DEFAULT_BACKLOG_TTL_SECONDS),

			provider_api_key: env::var(GOOGLE_MAPS_API_KEY).unwrap_or_default(),
			model_api_key: env::var(MODEL_API_KEY).unwrap_or_default(),

			session_cookie_ttl_seconds: env_u64(
				"SESSION_COOKIE_TTL_SECONDS",
				DEFAULT_SESSION_COOKIE_TTL_SECONDS as u64,
			) as i64,
			log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
			log_pretty: env_bool("LOG_PRETTY", true),

			provider_concurrency_limit: env_usize("PROVIDER_CONCURRENCY_LIMIT", 32),
		}
	}

	/// A configuration suitable for tests: no network credentials, short timeouts.
	#[cfg(test)]
	pub fn for_tests() -> Self {
		Self {
			bind_address: "127.0.0.1:0".to_string(),
			api_base_url: "http://localhost:0".to_string(),
			frontend_origins: vec![],
			cookie_domain: None,
			gate_timeout: Duration::from_millis(200),
			full_intent_timeout: Duration::from_millis(400),
			filter_timeout: Duration::from_millis(300),
			provider_timeout: Duration::from_millis(300),
			rate_limit_window: Duration::from_millis(DEFAULT_RATE_LIMIT_WINDOW_MS),
			rate_limit_max: DEFAULT_RATE_LIMIT_MAX,
			l2_cache_url: "redis://127.0.0.1:6379".to_string(),
			l2_cache_ttl_seconds: DEFAULT_L2_CACHE_TTL_SECONDS,
			l1_cache_capacity: 8,
			l1_cache_ttl_seconds: DEFAULT_L1_CACHE_TTL_SECONDS,
			job_ttl_seconds: DEFAULT_JOB_TTL_SECONDS,
			backlog_capacity: DEFAULT_BACKLOG_CAPACITY,
			backlog_ttl_seconds: DEFAULT_BACKLOG_TTL_SECONDS,
			provider_api_key: "test-key".to_string(),
			model_api_key: "test-key".to_string(),
			session_cookie_ttl_seconds: DEFAULT_SESSION_COOKIE_TTL_SECONDS,
			log_level: "debug".to_string(),
			log_pretty: false,
			provider_concurrency_limit: 8,
		}
	}
}

/*
 * src/llm/adapter.rs
 *
 * Language-model adapter (C8). Wraps a `langchain_rust::language_models::llm::LLM`
 * (the same trait the teacher's `MockLLM` in `agent/configs/mock.rs`
 * implements) with the strict-schema, timing, and retry contract spec
 * §4.8 describes.
 */

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use langchain_rust::language_models::llm::LLM;
use langchain_rust::schemas::Message;
use serde_json::Value;

use crate::error::PrivateError;
use crate::obs;

#[derive(Debug, Clone)]
pub struct CallOpts {
	pub stage: &'static str,
	pub prompt_version: &'static str,
	pub prompt_hash: String,
	pub request_id: String,
	pub trace_id: String,
	pub session_id: Option<String>,
}

const MAX_TRANSPORT_ATTEMPTS: u32 = 3;
const BACKOFF_MS: [u64; 3] = [0, 500, 1500];

/// `completeJSON` (spec §4.8): instructs the model to emit a value
/// conforming to `static_schema`, validates the parsed JSON is at
/// least an object, and returns it for the caller to deserialize into
/// its typed struct (defense in depth).
#[async_trait]
pub trait ModelAdapter: Send + Sync {
	async fn complete_json(
		&self,
		system_prompt: &str,
		user_prompt: &str,
		static_schema: &'static str,
		schema_version: &'static str,
		opts: &CallOpts,
	) -> Result<Value, PrivateError>;
}

pub struct LangchainModelAdapter {
	llm: Arc<dyn LLM + Send + Sync>,
	model_id: String,
}

impl LangchainModelAdapter {
	pub fn new(llm: Arc<dyn LLM + Send + Sync>, model_id: impl Into<String>) -> Self {
		Self {
			llm,
			model_id: model_id.into(),
		}
	}
}

fn schema_hash(schema: &str) -> String {
	prompt_hash(schema)
}

/// Shared short hash used for both schema-hash and prompt-hash call-site
/// metadata (spec §4.8) — prompt text itself is never logged.
pub fn prompt_hash(text: &str) -> String {
	use sha2::{Digest, Sha256};
	let digest = Sha256::digest(text.as_bytes());
	hex::encode(&digest[..6])
}

#[async_trait]
impl ModelAdapter for LangchainModelAdapter {
	async fn complete_json(
		&self,
		system_prompt: &str,
		user_prompt: &str,
		static_schema: &'static str,
		schema_version: &'static str,
		opts: &CallOpts,
	) -> Result<Value, PrivateError> {
		let t0 = Instant::now();
		let full_system = format!(
			"{system_prompt}\n\nRespond with a single JSON value conforming EXACTLY to this JSON Schema. \
			Do not include markdown fences or commentary.\n\n{static_schema}"
		);
		let messages = vec![
			Message::new_system_message(&full_system),
			Message::new_human_message(user_prompt),
		];
		let t1 = Instant::now();
		let prompt_chars = full_system.len() + user_prompt.len();
		let schema_hash = schema_hash(static_schema);

		let mut last_err: Option<PrivateError> = None;

		for attempt in 1..=MAX_TRANSPORT_ATTEMPTS {
			if attempt > 1 {
				let backoff = BACKOFF_MS[(attempt - 1) as usize];
				if backoff > 0 {
					tokio::time::sleep(Duration::from_millis(backoff)).await;
				}
			}

			let t2 = Instant::now();
			let result = self.llm.generate(&messages).await;
			let t3 = Instant::now();

			match result {
				Err(e) => {
					// Transport error: retry up to MAX_TRANSPORT_ATTEMPTS.
					let total_ms = t3.duration_since(t0).as_millis() as u64;
					obs::llm_call(
						opts.stage,
						&opts.request_id,
						&opts.trace_id,
						opts.session_id.as_deref(),
						&self.model_id,
						schema_version,
						&schema_hash,
						attempt,
						t1.duration_since(t0).as_millis() as u64,
						t3.duration_since(t2).as_millis() as u64,
						0,
						total_ms,
						prompt_chars,
						None,
						None,
						"transport_error",
					);
					last_err = Some(PrivateError::Model(e.to_string()));
					continue;
				}
				Ok(generated) => {
					let parsed = extract_json(&generated.generation);
					let t4 = Instant::now();
					let (input_tokens, output_tokens) = generated
						.tokens
						.as_ref()
						.map(|t| (Some(t.prompt_tokens), Some(t.completion_tokens)))
						.unwrap_or((None, None));

					match parsed {
						Ok(value) => {
							obs::llm_call(
								opts.stage,
								&opts.request_id,
								&opts.trace_id,
								opts.session_id.as_deref(),
								&self.model_id,
								schema_version,
								&schema_hash,
								attempt,
								t1.duration_since(t0).as_millis() as u64,
								t3.duration_since(t2).as_millis() as u64,
								t4.duration_since(t3).as_millis() as u64,
								t4.duration_since(t0).as_millis() as u64,
								prompt_chars,
								input_tokens,
								output_tokens,
								"success",
							);
							return Ok(value);
						}
						Err(parse_err) => {
							// Parse/schema errors are NOT retried (spec §4.8): fail fast.
							obs::llm_call(
								opts.stage,
								&opts.request_id,
								&opts.trace_id,
								opts.session_id.as_deref(),
								&self.model_id,
								schema_version,
								&schema_hash,
								attempt,
								t1.duration_since(t0).as_millis() as u64,
								t3.duration_since(t2).as_millis() as u64,
								t4.duration_since(t3).as_millis() as u64,
								t4.duration_since(t0).as_millis() as u64,
								prompt_chars,
								input_tokens,
								output_tokens,
								"schema_error",
							);
							return Err(PrivateError::Schema(parse_err));
						}
					}
				}
			}
		}

		Err(last_err.unwrap_or_else(|| PrivateError::Model("model call exhausted retries".into())))
	}
}

/// Strips markdown fences some models wrap JSON in, then parses.
fn extract_json(text: &str) -> Result<Value, String> {
	let trimmed = text.trim();
	let trimmed = trimmed
		.strip_prefix("```json")
		.or_else(|| trimmed.strip_prefix("```"))
		.unwrap_or(trimmed);
	let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed).trim();
	serde_json::from_str(trimmed).map_err(|e| format!("invalid JSON from model: {e}"))
}

/// Deterministic stub used by tests and by stage code exercised without
/// `DEPLOY_LLM` credentials, analogous to the teacher's `MockLLM`.
pub struct StubModelAdapter {
	pub responses: dashmap::DashMap<&'static str, Value>,
	pub fail_stages: dashmap::DashSet<&'static str>,
}

impl StubModelAdapter {
	pub fn new() -> Self {
		Self {
			responses: dashmap::DashMap::new(),
			fail_stages: dashmap::DashSet::new(),
		}
	}

	pub fn with_response(self, stage: &'static str, value: Value) -> Self {
		self.responses.insert(stage, value);
		self
	}

	pub fn with_failure(self, stage: &'static str) -> Self {
		self.fail_stages.insert(stage);
		self
	}
}

impl Default for StubModelAdapter {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl ModelAdapter for StubModelAdapter {
	async fn complete_json(
		&self,
		_system_prompt: &str,
		_user_prompt: &str,
		_static_schema: &'static str,
		_schema_version: &'static str,
		opts: &CallOpts,
	) -> Result<Value, PrivateError> {
		if self.fail_stages.contains(opts.stage) {
			return Err(PrivateError::Model(format!("stubbed failure for {}", opts.stage)));
		}
		self.responses
			.get(opts.stage)
			.map(|v| v.clone())
			.ok_or_else(|| PrivateError::Model(format!("no stubbed response for stage {}", opts.stage)))
	}
}

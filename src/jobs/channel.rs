/*
 * src/jobs/channel.rs
 *
 * Push channel (C7, publish/subscribe half), spec §4.7/§6. Bounded
 * backlog per `(channel, id)`, FIFO delivery, drained-before-live
 * semantics on subscribe.
 */

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeType {
	Subscribe,
	Unsubscribe,
	Event,
}

/// The canonical client envelope (spec §4.7). `normalize_envelope` maps
/// legacy request shapes onto this before the server acts on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientEnvelope {
	pub v: u8,
	#[serde(rename = "type")]
	pub envelope_type: EnvelopeType,
	pub channel: String,
	#[serde(rename = "requestId")]
	pub request_id: String,
	#[serde(rename = "sessionId")]
	pub session_id: Option<String>,
}

/// Maps legacy shapes (`payload.requestId`, `reqId`) onto the canonical
/// envelope. Returns `None` if no request id can be recovered.
pub fn normalize_envelope(raw: &serde_json::Value) -> Option<ClientEnvelope> {
	let v = raw.get("v").and_then(|x| x.as_u64()).unwrap_or(1) as u8;
	let envelope_type = match raw.get("type").and_then(|x| x.as_str()) {
		Some("subscribe") => EnvelopeType::Subscribe,
		Some("unsubscribe") => EnvelopeType::Unsubscribe,
		_ => EnvelopeType::Event,
	};
	let channel = raw.get("channel").and_then(|x| x.as_str())?.to_string();
	let request_id = raw
		.get("requestId")
		.and_then(|x| x.as_str())
		.or_else(|| raw.get("request_id").and_then(|x| x.as_str()))
		.or_else(|| raw.get("reqId").and_then(|x| x.as_str()))
		.or_else(|| {
			raw.get("payload")
				.and_then(|p| p.get("requestId").or_else(|| p.get("request-id")))
				.and_then(|x| x.as_str())
		})?
		.to_string();
	let session_id = raw
		.get("sessionId")
		.and_then(|x| x.as_str())
		.map(|s| s.to_string());

	Some(ClientEnvelope {
		v,
		envelope_type,
		channel,
		request_id,
		session_id,
	})
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerMessageType {
	Results,
	Progress,
	Error,
}

/// The canonical server-to-client message (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
	pub channel: String,
	#[serde(rename = "requestId")]
	pub request_id: String,
	#[serde(rename = "type")]
	pub message_type: ServerMessageType,
	pub data: serde_json::Value,
}

struct ChannelState {
	backlog: VecDeque<(Instant, ChannelMessage)>,
	subscribers: Vec<mpsc::UnboundedSender<ChannelMessage>>,
}

impl ChannelState {
	fn new() -> Self {
		Self {
			backlog: VecDeque::new(),
			subscribers: Vec::new(),
		}
	}

	fn prune(&mut self, ttl: Duration, capacity: usize) {
		let now = Instant::now();
		while let Some((ts, _)) = self.backlog.front() {
			if now.duration_since(*ts) > ttl {
				self.backlog.pop_front();
			} else {
				break;
			}
		}
		while self.backlog.len() > capacity {
			self.backlog.pop_front();
		}
	}
}

pub struct PushChannel {
	state: DashMap<(String, String), Mutex<ChannelState>>,
	backlog_capacity: usize,
	backlog_ttl: Duration,
}

impl PushChannel {
	pub fn new(backlog_capacity: usize, backlog_ttl_seconds: u64) -> Self {
		Self {
			state: DashMap::new(),
			backlog_capacity,
			backlog_ttl: Duration::from_secs(backlog_ttl_seconds),
		}
	}

	/// Delivers `message` to live subscribers of `(channel, id)`, or
	/// buffers it into the backlog if none are currently subscribed.
	pub fn publish(&self, channel: &str, id: &str, message: ChannelMessage) {
		let key = (channel.to_string(), id.to_string());
		let entry = self.state.entry(key).or_insert_with(|| Mutex::new(ChannelState::new()));
		let mut state = entry.lock();
		state.prune(self.backlog_ttl, self.backlog_capacity);

		state.subscribers.retain(|tx| !tx.is_closed());
		if state.subscribers.is_empty() {
			state.backlog.push_back((Instant::now(), message));
			state.prune(self.backlog_ttl, self.backlog_capacity);
		} else {
			for tx in &state.subscribers {
				let _ = tx.send(message.clone());
			}
		}
	}

	/// Subscribes to `(channel, id)`: drains the backlog in order, then
	/// registers for live delivery.
	pub fn subscribe(&self, channel: &str, id: &str) -> mpsc::UnboundedReceiver<ChannelMessage> {
		let (tx, rx) = mpsc::unbounded_channel();
		let key = (channel.to_string(), id.to_string());
		let entry = self.state.entry(key).or_insert_with(|| Mutex::new(ChannelState::new()));
		let mut state = entry.lock();
		state.prune(self.backlog_ttl, self.backlog_capacity);

		for (_, msg) in state.backlog.drain(..) {
			let _ = tx.send(msg);
		}
		state.subscribers.push(tx);
		rx
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalizes_legacy_req_id_shape() {
		let raw = serde_json::json!({"v":1,"type":"subscribe","channel":"search","reqId":"r-1"});
		let env = normalize_envelope(&raw).unwrap();
		assert_eq!(env.request_id, "r-1");
		assert_eq!(env.channel, "search");
	}

	#[test]
	fn normalizes_legacy_payload_shape() {
		let raw = serde_json::json!({"channel":"search","payload":{"request-id":"r-2"}});
		let env = normalize_envelope(&raw).unwrap();
		assert_eq!(env.request_id, "r-2");
	}

	#[tokio::test]
	async fn subscribe_drains_backlog_before_live_messages() {
		let channel = PushChannel::new(50, 120);
		channel.publish(
			"search",
			"r-1",
			ChannelMessage {
				channel: "search".into(),
				request_id: "r-1".into(),
				message_type: ServerMessageType::Progress,
				data: serde_json::json!({"stage": "gate"}),
			},
		);
		let mut rx = channel.subscribe("search", "r-1");
		let first = rx.recv().await.unwrap();
		assert_eq!(first.message_type, ServerMessageType::Progress);

		channel.publish(
			"search",
			"r-1",
			ChannelMessage {
				channel: "search".into(),
				request_id: "r-1".into(),
				message_type: ServerMessageType::Results,
				data: serde_json::json!({}),
			},
		);
		let second = rx.recv().await.unwrap();
		assert_eq!(second.message_type, ServerMessageType::Results);
	}
}

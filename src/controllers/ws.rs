/*
 * src/controllers/ws.rs
 *
 * Push-channel endpoint (spec §4.7/§6). Subscriptions are session-scoped
 * and ticket-authenticated: the client's first frame must be a
 * canonical `subscribe` envelope carrying the ticket issued by
 * `POST /api/v1/auth/session`. Unauthenticated subscriptions are
 * refused by closing the socket without delivering anything.
 */

use std::sync::Arc;

use axum::Router;
use axum::extract::Extension;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use tower_cookies::cookie::Key;

use crate::jobs::channel::{EnvelopeType, normalize_envelope};
use crate::middleware::verify_subscription_ticket;
use crate::state::AppState;

pub async fn api_ws_upgrade(
	Extension(state): Extension<Arc<AppState>>,
	Extension(key): Extension<Key>,
	ws: WebSocketUpgrade,
) -> Response {
	ws.on_upgrade(move |socket| handle_socket(socket, state, key))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, key: Key) {
	let Some(Ok(Message::Text(text))) = socket.recv().await else {
		let _ = socket.send(Message::Close(None)).await;
		return;
	};

	let Ok(raw) = serde_json::from_str::<serde_json::Value>(&text) else {
		let _ = socket.send(Message::Close(None)).await;
		return;
	};
	let Some(envelope) = normalize_envelope(&raw) else {
		let _ = socket.send(Message::Close(None)).await;
		return;
	};
	if envelope.envelope_type != EnvelopeType::Subscribe {
		let _ = socket.send(Message::Close(None)).await;
		return;
	}

	let Some(ticket) = raw.get("ticket").and_then(|v| v.as_str()) else {
		let _ = socket.send(Message::Close(None)).await;
		return;
	};
	if verify_subscription_ticket(&key, ticket, &envelope.request_id).is_none() {
		tracing::error!(
			channel = %envelope.channel,
			request_id = %envelope.request_id,
			"ERROR ->> /api/v1/ws 'api_ws_upgrade' REASON: invalid subscription ticket"
		);
		let _ = socket.send(Message::Close(None)).await;
		return;
	}

	tracing::info!(
		channel = %envelope.channel,
		request_id = %envelope.request_id,
		"HANDLER ->> /api/v1/ws 'api_ws_upgrade' - subscribed"
	);

	let mut rx = state.push_channel.subscribe(&envelope.channel, &envelope.request_id);
	while let Some(message) = rx.recv().await {
		let Ok(text) = serde_json::to_string(&message) else {
			continue;
		};
		if socket.send(Message::Text(text.into())).await.is_err() {
			break;
		}
	}
}

pub fn ws_routes() -> Router {
	Router::new().route("/", get(api_ws_upgrade))
}

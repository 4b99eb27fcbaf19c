//! WebSocket control-channel handler (§4.1, §6): one connection, one
//! [`Session`], split into a reader task that decodes and dispatches
//! inbound envelopes and a writer task that drains the session's
//! `mpsc::UnboundedSender<Message>` so every outbound frame goes through a
//! single writer half, matching axum's split-socket requirement.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;

use stt_gateway_transport::IceCandidateInit;

use crate::codec::{self, InboundEnvelope};
use crate::error::ServerError;
use crate::session::Session;
use crate::state::AppState;

pub async fn upgrade(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let session = Session::new(state.settings(), state.store.clone(), state.recognizer_factory.clone(), outbound_tx);
    state.registry.insert(session.clone());
    metrics::gauge!("stt_gateway_sessions_active").increment(1.0);
    tracing::info!(session_id = session.id(), "session opened");

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if ws_tx.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = ws_rx.next().await {
        let message = match message {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(session_id = session.id(), error = %e, "websocket read error");
                break;
            }
        };
        match message {
            Message::Text(text) => dispatch(&session, &text).await,
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
        }
        if session.state() == crate::session::SignalingState::Closed {
            break;
        }
    }

    state.registry.remove(session.id(), "client disconnected").await;
    metrics::gauge!("stt_gateway_sessions_active").decrement(1.0);
    writer.abort();
    tracing::info!(session_id = session.id(), "session closed");
}

/// Decodes one inbound frame and routes it per §6. Never tears down the
/// connection on a protocol error — only `session.close` or a transport
/// failure ends the loop.
async fn dispatch(session: &Session, text: &str) {
    let envelope = match codec::decode(text) {
        Ok(env) => env,
        Err(e) => {
            session.emit_error(&ServerError::InvalidPayload(e.to_string()));
            return;
        }
    };

    let result = route(session, &envelope).await;
    if let Err(err) = result {
        session.emit_error(&err);
    }
}

async fn route(session: &Session, envelope: &InboundEnvelope) -> Result<(), ServerError> {
    match envelope.event.as_str() {
        "session.init" => {
            if let Some(room_id) = envelope.data.get("room_id").and_then(|v| v.as_str()) {
                session.bind_room(room_id);
            }
            session.emit("session.ready", json!({ "session_id": session.id() }));
            Ok(())
        }
        "rtc.offer" => {
            let sdp = envelope
                .data
                .get("sdp")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ServerError::InvalidOffer("missing sdp field".to_string()))?;
            let answer = session.handle_offer(sdp.to_string()).await?;
            session.emit(
                stt_gateway_config::constants::events::RTC_ANSWER,
                json!({ "sdp": answer, "type": "answer", "reportid": session.id() }),
            );
            Ok(())
        }
        "rtc.candidate" => {
            let init: IceCandidateInit = serde_json::from_value(envelope.data.clone())
                .map_err(|e| ServerError::InvalidCandidate(e.to_string()))?;
            session.add_ice_candidate(init).await
        }
        "rtc.start" => Err(ServerError::NotImplemented(
            "audio flows automatically once the peer connection is live".to_string(),
        )),
        "rtc.stop" => {
            session.stop("client requested rtc.stop").await;
            Ok(())
        }
        "session.close" => {
            session.stop("client requested session.close").await;
            Ok(())
        }
        other => Err(ServerError::UnknownEvent(other.to_string())),
    }
}

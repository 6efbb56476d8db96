//! WebSocket upgrade + message loop. Each connection owns one game session.
//! Client frames are parsed as JSON and forwarded to the core drivers; the
//! loop also drains the session's push channel so the deferred round advance
//! reaches the client without it asking.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

use crate::logic;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, SessionHandle};

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "wikirace_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  let handle = state.create_session().await;
  let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
  handle.attach_push(tx).await;
  info!(target: "wikirace_backend", session_id = %handle.id, "WebSocket connected");

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let msg = match incoming {
          Some(Ok(msg)) => msg,
          _ => break,
        };
        match msg {
          Message::Text(txt) => {
            // Parse, dispatch, serialize response.
            let reply = match serde_json::from_str::<ClientMessage>(&txt) {
              Ok(incoming) => {
                debug!(target: "wikirace_backend", "WS received: {:?}", &incoming);
                handle_client_message(incoming, &state, &handle).await
              }
              Err(e) => ServerMessage::Error { message: format!("Invalid JSON: {}", e) },
            };
            if send_json(&mut socket, &reply).await.is_err() {
              break;
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }
      pushed = rx.recv() => {
        match pushed {
          Some(msg) => {
            if send_json(&mut socket, &msg).await.is_err() {
              break;
            }
          }
          None => break,
        }
      }
    }
  }

  // Connection gone: tear the session down so no deferred work survives it.
  state.remove_session(&handle.id).await;
  info!(target: "wikirace_backend", session_id = %handle.id, "WebSocket disconnected");
}

async fn send_json(socket: &mut WebSocket, msg: &ServerMessage) -> Result<(), ()> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) })
      .to_string()
  });
  match socket.send(Message::Text(out)).await {
    Ok(()) => Ok(()),
    Err(e) => {
      error!(target: "wikirace_backend", error = %e, "WS send error");
      Err(())
    }
  }
}

#[instrument(level = "info", skip(state, handle), fields(session_id = %handle.id))]
async fn handle_client_message(
  msg: ClientMessage,
  state: &Arc<AppState>,
  handle: &Arc<SessionHandle>,
) -> ServerMessage {
  match msg {
    ClientMessage::Ping => ServerMessage::Pong,
    ClientMessage::Start => logic::start_session(state, handle).await,
    ClientMessage::Navigate { article } => logic::navigate(state, handle, &article).await,
    ClientMessage::Hint => logic::hint(state, handle).await,
    ClientMessage::Skip { confirmed } => logic::skip(state, handle, confirmed).await,
  }
}

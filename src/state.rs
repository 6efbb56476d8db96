//! Application state: the session registry and the scheduled round advance.
//!
//! This module owns:
//!   - the game configuration (TOML or defaults)
//!   - the Wikipedia client shared by every session
//!   - the registry of live sessions (one per WebSocket connection or per
//!     HTTP-created session id)
//!
//! Each session couples its `GameSession` with the abort handle of a pending
//! deferred round advance and an optional push channel a WebSocket loop
//! attaches; HTTP-only sessions simply have no channel and pick the advanced
//! state up on their next poll.

use std::{collections::HashMap, sync::Arc};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::AbortHandle;
use tracing::{debug, info, instrument};

use uuid::Uuid;

use crate::config::{load_game_config_from_env, GameConfig};
use crate::game::{AdvanceToken, GameSession};
use crate::protocol::ServerMessage;
use crate::wikipedia::WikipediaSource;

pub struct SessionHandle {
    pub id: String,
    pub game: Mutex<GameSession>,
    pending_advance: Mutex<Option<AbortHandle>>,
    push: Mutex<Option<mpsc::UnboundedSender<ServerMessage>>>,
}

impl SessionHandle {
    /// Attach the WebSocket push channel; server-initiated messages (the
    /// deferred round advance) go through it.
    pub async fn attach_push(&self, tx: mpsc::UnboundedSender<ServerMessage>) {
        *self.push.lock().await = Some(tx);
    }

    /// Best-effort delivery; a closed channel only means the client is gone.
    pub async fn push_message(&self, msg: ServerMessage) {
        if let Some(tx) = self.push.lock().await.as_ref() {
            if tx.send(msg).is_err() {
                debug!(target: "wikirace_backend", session_id = %self.id, "push channel closed");
            }
        }
    }

    /// Abort a scheduled round advance, if one is pending.
    pub async fn cancel_pending_advance(&self) {
        if let Some(handle) = self.pending_advance.lock().await.take() {
            handle.abort();
        }
    }

    async fn set_pending_advance(&self, handle: AbortHandle) {
        if let Some(previous) = self.pending_advance.lock().await.replace(handle) {
            previous.abort();
        }
    }
}

pub struct AppState {
    pub config: GameConfig,
    pub wiki: WikipediaSource,
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl AppState {
    /// Build state from env: load config (or defaults), init the Wikipedia
    /// client, start with an empty registry.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Result<Self, String> {
        let config = load_game_config_from_env().unwrap_or_default();
        info!(
            target: "wikirace_backend",
            rounds = config.total_rounds(),
            schedule = ?config.difficulty_steps,
            floor = ?config.scoring.floor,
            "Game configuration ready"
        );

        let wiki = WikipediaSource::from_env()?;
        info!(target: "wikirace_backend", api_url = %wiki.api_url, "Wikipedia source ready");

        Ok(Self { config, wiki, sessions: RwLock::new(HashMap::new()) })
    }

    #[instrument(level = "info", skip(self))]
    pub async fn create_session(&self) -> Arc<SessionHandle> {
        let id = Uuid::new_v4().to_string();
        let game = GameSession::new(self.config.clone(), StdRng::from_entropy());
        let handle = Arc::new(SessionHandle {
            id: id.clone(),
            game: Mutex::new(game),
            pending_advance: Mutex::new(None),
            push: Mutex::new(None),
        });
        self.sessions.write().await.insert(id.clone(), handle.clone());
        info!(target: "wikirace_backend", session_id = %id, "Session created");
        handle
    }

    pub async fn session(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Tear a session down: drop it from the registry, abort its pending
    /// advance and invalidate the epoch so nothing fires afterwards.
    #[instrument(level = "info", skip(self))]
    pub async fn remove_session(&self, id: &str) -> bool {
        match self.sessions.write().await.remove(id) {
            Some(handle) => {
                handle.cancel_pending_advance().await;
                handle.game.lock().await.teardown();
                info!(target: "wikirace_backend", session_id = %id, "Session removed");
                true
            }
            None => false,
        }
    }

    /// Schedule the deferred re-entry into the next round after a clear.
    /// The task sleeps out the display delay, then lets the epoch-guarded
    /// controller decide whether the advance is still wanted.
    pub async fn schedule_advance(
        self: &Arc<Self>,
        handle: &Arc<SessionHandle>,
        advance: AdvanceToken,
    ) {
        let state = Arc::clone(self);
        let session = Arc::clone(handle);
        let task = tokio::spawn(async move {
            tokio::time::sleep(advance.delay).await;
            let outcome = {
                let mut game = session.game.lock().await;
                game.advance_round(&state.wiki, advance.epoch).await
            };
            if let Some(outcome) = outcome {
                session.push_message(crate::logic::round_reply(outcome)).await;
            }
        });
        handle.set_pending_advance(task.abort_handle()).await;
    }
}

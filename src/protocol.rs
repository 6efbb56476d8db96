//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::Phase;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    /// Begin a fresh session (also used to restart after completion or a
    /// generation failure).
    Start,
    Navigate {
        article: String,
    },
    Hint,
    Skip {
        /// The confirmation dialog lives client-side; an unconfirmed skip is
        /// a no-op here.
        confirmed: bool,
    },
}

/// Messages the server sends back; shared verbatim by the HTTP handlers.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Pong,
    /// A playable position: current round state plus the clickable links.
    Round {
        view: RoundView,
        links: Vec<String>,
    },
    /// Round state without links; `message` explains what went wrong with
    /// the link fetch (missing page, empty page, source outage).
    NoLinks {
        view: RoundView,
        message: String,
    },
    Cleared {
        view: RoundView,
        message: String,
    },
    Complete {
        view: RoundView,
        #[serde(rename = "finalScore")]
        final_score: i64,
        message: String,
    },
    /// Puzzle generation exhausted its attempts; the player retries manually.
    NoPuzzle {
        message: String,
    },
    Hint {
        view: RoundView,
        article: String,
        text: String,
    },
    NoHint {
        view: RoundView,
        message: String,
    },
    Notify {
        message: String,
    },
    /// Event arrived in a state where it does nothing (e.g. navigation after
    /// a clear). Clients drop it on the floor.
    Ignored,
    Error {
        message: String,
    },
}

/// Render snapshot of one round, the unit the frontend draws its header
/// from. Field names match the game UI.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    pub round_index: usize,
    pub total_rounds: usize,
    pub target_hops: u32,
    pub click_count: u32,
    pub score: i64,
    pub hint_used: bool,
    pub current_article: String,
    pub goal_article: String,
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct NewSessionOut {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub reply: ServerMessage,
}

#[derive(Debug, Deserialize)]
pub struct NavigateIn {
    pub article: String,
}

#[derive(Debug, Deserialize)]
pub struct SkipIn {
    pub confirmed: bool,
}

/// Poll-friendly session snapshot for HTTP clients.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub phase: Phase,
    pub score: i64,
    pub cleared_rounds: usize,
    pub total_rounds: usize,
    pub round: Option<RoundView>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct AckOut {
    pub ok: bool,
}

//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! Each driver locks the session, runs one controller operation, schedules
//! follow-up work (the deferred round advance) and maps the outcome onto a
//! protocol message. Handlers stay thin; everything game-shaped lives here
//! or in `game.rs`.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::game::{self, HintOutcome, LinkSet, NavigateOutcome, RoundOutcome, SkipOutcome};
use crate::protocol::{RoundView, ServerMessage, SessionOut};
use crate::state::{AppState, SessionHandle};
use crate::util::trunc_for_log;

fn links_reply(view: RoundView, links: LinkSet) -> ServerMessage {
  match links {
    LinkSet::Choices(links) => ServerMessage::Round { view, links },
    LinkSet::Message(message) => ServerMessage::NoLinks { view, message },
  }
}

/// Map a round start (fresh session, skip, deferred advance) onto the wire.
pub fn round_reply(outcome: RoundOutcome) -> ServerMessage {
  match outcome {
    RoundOutcome::Started { view, links } => links_reply(view, links),
    RoundOutcome::Failed { message } => ServerMessage::NoPuzzle { message },
  }
}

#[instrument(level = "info", skip(state, handle), fields(session_id = %handle.id))]
pub async fn start_session(state: &Arc<AppState>, handle: &Arc<SessionHandle>) -> ServerMessage {
  // a restart also invalidates any advance left over from the previous run
  handle.cancel_pending_advance().await;
  let outcome = handle.game.lock().await.start_session(&state.wiki).await;
  round_reply(outcome)
}

#[instrument(level = "info", skip(state, handle), fields(session_id = %handle.id))]
pub async fn navigate(
  state: &Arc<AppState>,
  handle: &Arc<SessionHandle>,
  article: &str,
) -> ServerMessage {
  let outcome = handle.game.lock().await.navigate(&state.wiki, article).await;
  match outcome {
    NavigateOutcome::Ignored => ServerMessage::Ignored,
    NavigateOutcome::Moved { view, links } => links_reply(view, links),
    NavigateOutcome::Cleared { view, message, advance } => {
      state.schedule_advance(handle, advance).await;
      ServerMessage::Cleared { view, message }
    }
    NavigateOutcome::Completed { view, final_score, message } => {
      ServerMessage::Complete { view, final_score, message }
    }
  }
}

#[instrument(level = "info", skip(state, handle), fields(session_id = %handle.id))]
pub async fn hint(state: &Arc<AppState>, handle: &Arc<SessionHandle>) -> ServerMessage {
  match handle.game.lock().await.hint(&state.wiki).await {
    HintOutcome::NotPlaying => ServerMessage::Ignored,
    HintOutcome::Served { view, article, text } => {
      debug!(target: "puzzle", goal = %article, preview = %trunc_for_log(&text, 120), "hint served");
      ServerMessage::Hint { view, article, text }
    }
    HintOutcome::Unavailable { view, message } => ServerMessage::NoHint { view, message },
  }
}

#[instrument(level = "info", skip(state, handle), fields(session_id = %handle.id))]
pub async fn skip(
  state: &Arc<AppState>,
  handle: &Arc<SessionHandle>,
  confirmed: bool,
) -> ServerMessage {
  match handle.game.lock().await.skip(&state.wiki, confirmed).await {
    SkipOutcome::Declined => ServerMessage::Notify { message: "Skip cancelled.".into() },
    SkipOutcome::NotPlaying => ServerMessage::Ignored,
    SkipOutcome::Restarted(outcome) => round_reply(outcome),
  }
}

/// Re-fetch the current article's link choices without touching game state.
/// HTTP polling clients use this after the deferred advance lands.
#[instrument(level = "info", skip(state, handle), fields(session_id = %handle.id))]
pub async fn current_links(state: &Arc<AppState>, handle: &Arc<SessionHandle>) -> ServerMessage {
  let view = {
    let game = handle.game.lock().await;
    match game.view() {
      Some(view) => view,
      None => return ServerMessage::Notify { message: "No active round.".into() },
    }
  };
  let links = game::fetch_choices(&state.wiki, &view.current_article).await;
  links_reply(view, links)
}

pub async fn snapshot(handle: &Arc<SessionHandle>) -> SessionOut {
  let game = handle.game.lock().await;
  SessionOut {
    phase: game.phase(),
    score: game.score(),
    cleared_rounds: game.cleared_rounds(),
    total_rounds: game.total_rounds(),
    round: game.view(),
  }
}

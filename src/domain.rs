//! Domain models used by the backend: article identifiers, puzzles, and the
//! per-round / per-session state the controller mutates.

use serde::{Deserialize, Serialize};

/// Opaque title of a page in the article-link graph.
/// Compared by exact string match; any normalization (spaces vs underscores,
/// capitalization) is the data source's business, not ours.
pub type ArticleId = String;

/// A generated challenge: reach `goal` from `start` by following forward
/// links. `target_hops` is fixed when the puzzle is generated and never
/// recomputed mid-round.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Puzzle {
  pub start: ArticleId,
  pub goal: ArticleId,
  pub target_hops: u32,
}

/// Mutable per-round progress. Reset whenever a round starts.
#[derive(Clone, Debug)]
pub struct RoundState {
  pub current: ArticleId,
  pub clicks: u32,
  pub hint_used: bool,
  /// Position in the difficulty schedule, 0-based.
  pub index: usize,
}

/// Phases of the round/session state machine.
///
/// `Loading → Playing → {Cleared, SessionComplete}`; a skip re-enters
/// `Loading`. `Failed` is the terminal error-display state entered when
/// puzzle generation exhausts its attempts.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Loading,
  Playing,
  Cleared,
  SessionComplete,
  Failed,
}

//! Backtracking puzzle generation.
//!
//! Backlink sets are unpredictable in size (including empty), so a forward
//! random walk cannot guarantee an exact hop count. Instead we draw a random
//! goal and walk *backwards* along backlinks for exactly `target_hops` steps;
//! feasibility is checked at every step and a dead branch throws the whole
//! attempt away, goal included. Articles are not deduplicated along the path,
//! so a puzzle may contain a cycle.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::domain::{ArticleId, Puzzle};
use crate::source::GraphSource;

/// Type of errors.
#[derive(Debug, PartialEq, Eq)]
pub enum GenerateError {
  /// Every attempt hit an empty random draw or a dead backlink branch.
  NoPath { target_hops: u32, attempts: u32 },
}

impl fmt::Display for GenerateError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GenerateError::NoPath { target_hops, attempts } => write!(
        f,
        "no {}-hop puzzle found after {} attempts",
        target_hops, attempts
      ),
    }
  }
}

/// Produce a puzzle whose start is exactly `target_hops` backlink steps from
/// a freshly drawn random goal. Each failed attempt restarts with a new goal;
/// at most `max_attempts` attempts are made, sequentially.
pub async fn generate<S: GraphSource, R: Rng>(
  source: &S,
  rng: &mut R,
  target_hops: u32,
  max_attempts: u32,
) -> Result<Puzzle, GenerateError> {
  for attempt in 1..=max_attempts {
    match try_backtrack(source, rng, target_hops).await {
      Ok(puzzle) => {
        debug!(
          target: "puzzle",
          attempt,
          start = %puzzle.start,
          goal = %puzzle.goal,
          target_hops,
          "puzzle generated"
        );
        return Ok(puzzle);
      }
      Err(reason) => {
        warn!(target: "puzzle", attempt, max_attempts, %reason, "attempt failed, redrawing goal");
      }
    }
  }
  Err(GenerateError::NoPath { target_hops, attempts: max_attempts })
}

/// One attempt: draw a goal, then prepend one uniformly chosen backlink per
/// hop. Any empty set along the way kills the attempt.
async fn try_backtrack<S: GraphSource, R: Rng>(
  source: &S,
  rng: &mut R,
  target_hops: u32,
) -> Result<Puzzle, String> {
  let mut drawn = source.random_articles(1).await?;
  if drawn.is_empty() {
    return Err("random draw returned no articles".into());
  }
  let goal = drawn.remove(0);

  let mut path: Vec<ArticleId> = vec![goal.clone()];
  let mut current = goal.clone();
  for hop in 0..target_hops {
    let backlinks = source.backlinks(&current).await?;
    let prev = match backlinks.choose(rng) {
      Some(article) => article.clone(),
      None => return Err(format!("no backlinks into \"{}\" at hop {}", current, hop + 1)),
    };
    path.insert(0, prev.clone());
    current = prev;
  }

  debug!(target: "puzzle", path = ?path, "backtracked path");
  Ok(Puzzle { start: path[0].clone(), goal, target_hops })
}

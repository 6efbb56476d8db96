//! The round/score controller: one `GameSession` per player session.
//!
//! The session owns all mutable game state (phase, score, round progress) and
//! is driven by events from the routes layer: start, navigate, hint, skip,
//! and the deferred round advance after a clear. Callers serialize access by
//! keeping each session behind a `Mutex`, so no event runs while a puzzle
//! generation or link fetch for the same session is still outstanding.
//!
//! The deferred advance is epoch-guarded: every round start, skip and
//! teardown bumps `advance_epoch`, so a scheduled advance that outlived its
//! round is dropped even if the task itself was not aborted in time.

use std::time::Duration;

use rand::rngs::StdRng;
use tracing::{info, instrument, warn};

use crate::config::GameConfig;
use crate::domain::{ArticleId, Phase, Puzzle, RoundState};
use crate::generator;
use crate::protocol::RoundView;
use crate::source::GraphSource;

/// Handed out when a round is cleared; redeems exactly one deferred
/// `advance_round` call after `delay`.
#[derive(Debug, Clone, Copy)]
pub struct AdvanceToken {
  pub epoch: u64,
  pub delay: Duration,
}

/// Forward-link choices for the current article, or the inline message shown
/// in their place when the page is missing, empty, or the fetch failed.
#[derive(Debug)]
pub enum LinkSet {
  Choices(Vec<ArticleId>),
  Message(String),
}

#[derive(Debug)]
pub enum RoundOutcome {
  Started { view: RoundView, links: LinkSet },
  Failed { message: String },
}

#[derive(Debug)]
pub enum NavigateOutcome {
  /// Event arrived outside `Playing` (or while already standing on the
  /// goal); dropped without touching any state.
  Ignored,
  Moved { view: RoundView, links: LinkSet },
  Cleared { view: RoundView, message: String, advance: AdvanceToken },
  Completed { view: RoundView, final_score: i64, message: String },
}

#[derive(Debug)]
pub enum HintOutcome {
  NotPlaying,
  Served { view: RoundView, article: ArticleId, text: String },
  Unavailable { view: RoundView, message: String },
}

#[derive(Debug)]
pub enum SkipOutcome {
  Declined,
  NotPlaying,
  Restarted(RoundOutcome),
}

pub struct GameSession {
  config: GameConfig,
  rng: StdRng,
  phase: Phase,
  score: i64,
  cleared_rounds: usize,
  puzzle: Option<Puzzle>,
  round: Option<RoundState>,
  advance_epoch: u64,
}

impl GameSession {
  pub fn new(config: GameConfig, rng: StdRng) -> Self {
    let initial_score = config.scoring.initial_score;
    Self {
      config,
      rng,
      phase: Phase::Loading,
      score: initial_score,
      cleared_rounds: 0,
      puzzle: None,
      round: None,
      advance_epoch: 0,
    }
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn score(&self) -> i64 {
    self.score
  }

  pub fn cleared_rounds(&self) -> usize {
    self.cleared_rounds
  }

  pub fn total_rounds(&self) -> usize {
    self.config.total_rounds()
  }

  /// Render snapshot of the current round; `None` before the first puzzle
  /// arrives or after a generation failure.
  pub fn view(&self) -> Option<RoundView> {
    let round = self.round.as_ref()?;
    let puzzle = self.puzzle.as_ref()?;
    Some(RoundView {
      round_index: round.index,
      total_rounds: self.config.total_rounds(),
      target_hops: puzzle.target_hops,
      click_count: round.clicks,
      score: self.score,
      hint_used: round.hint_used,
      current_article: round.current.clone(),
      goal_article: puzzle.goal.clone(),
    })
  }

  /// Start (or restart) the whole session: score and cleared-round counter
  /// reset, then the first round begins.
  #[instrument(level = "info", skip(self, source))]
  pub async fn start_session<S: GraphSource>(&mut self, source: &S) -> RoundOutcome {
    self.score = self.config.scoring.initial_score;
    self.cleared_rounds = 0;
    self.start_round(source).await
  }

  /// Begin the round at the current schedule position: generate a puzzle,
  /// seed the round state, fetch the opening link choices.
  #[instrument(level = "info", skip(self, source), fields(round = self.cleared_rounds))]
  pub async fn start_round<S: GraphSource>(&mut self, source: &S) -> RoundOutcome {
    self.advance_epoch += 1;
    self.phase = Phase::Loading;
    self.puzzle = None;
    self.round = None;

    let target_hops = match self.config.difficulty_steps.get(self.cleared_rounds) {
      Some(&hops) => hops,
      None => {
        // Schedule exhausted; the session should already be complete.
        warn!(target: "puzzle", cleared = self.cleared_rounds, "no more rounds in the schedule");
        self.phase = Phase::SessionComplete;
        return RoundOutcome::Failed { message: "No more rounds in the schedule.".into() };
      }
    };

    match generator::generate(source, &mut self.rng, target_hops, self.config.max_attempts).await {
      Ok(puzzle) => {
        let round = RoundState {
          current: puzzle.start.clone(),
          clicks: 0,
          hint_used: false,
          index: self.cleared_rounds,
        };
        info!(
          target: "puzzle",
          round = round.index,
          start = %puzzle.start,
          goal = %puzzle.goal,
          target_hops,
          "round started"
        );
        self.round = Some(round);
        self.puzzle = Some(puzzle);
        self.phase = Phase::Playing;
        let links = fetch_choices(source, &self.current_article()).await;
        RoundOutcome::Started { view: self.view().unwrap_or_default(), links }
      }
      Err(e) => {
        warn!(target: "puzzle", error = %e, "round generation failed");
        self.phase = Phase::Failed;
        RoundOutcome::Failed {
          message: format!("Could not find a {}-hop puzzle. Please try again.", target_hops),
        }
      }
    }
  }

  /// Player followed a link. Ignored outside `Playing`; otherwise the click
  /// is counted and penalized, and the move either clears the round or
  /// triggers a fresh link fetch for the new location.
  #[instrument(level = "info", skip(self, source))]
  pub async fn navigate<S: GraphSource>(&mut self, source: &S, article: &str) -> NavigateOutcome {
    if self.phase != Phase::Playing {
      return NavigateOutcome::Ignored;
    }
    let (goal, target_hops) = match &self.puzzle {
      Some(p) => (p.goal.clone(), p.target_hops),
      None => return NavigateOutcome::Ignored,
    };
    let (round_index, clicks) = match self.round.as_mut() {
      Some(round) => {
        if round.current == goal {
          // Already standing on the goal (a degenerate start == goal puzzle);
          // only a skip gets the player out.
          return NavigateOutcome::Ignored;
        }
        round.clicks += 1;
        round.current = article.to_owned();
        (round.index, round.clicks)
      }
      None => return NavigateOutcome::Ignored,
    };

    let scoring = self.config.scoring.clone();
    self.score = scoring.debit(self.score, scoring.click_penalty);

    if article == goal {
      self.score = self.score.saturating_add(scoring.round_clear_bonus);
      let message = clear_message(round_index, clicks, target_hops);
      self.cleared_rounds += 1;
      let total = self.config.total_rounds();
      if self.cleared_rounds >= total {
        self.phase = Phase::SessionComplete;
        info!(target: "puzzle", final_score = self.score, "all rounds cleared");
        NavigateOutcome::Completed {
          view: self.view().unwrap_or_default(),
          final_score: self.score,
          message: format!("All {} rounds cleared! Final score: {}.", total, self.score),
        }
      } else {
        self.phase = Phase::Cleared;
        self.advance_epoch += 1;
        info!(target: "puzzle", cleared = self.cleared_rounds, score = self.score, "round cleared");
        NavigateOutcome::Cleared {
          view: self.view().unwrap_or_default(),
          message,
          advance: AdvanceToken {
            epoch: self.advance_epoch,
            delay: Duration::from_millis(self.config.clear_delay_ms),
          },
        }
      }
    } else {
      let links = fetch_choices(source, article).await;
      NavigateOutcome::Moved { view: self.view().unwrap_or_default(), links }
    }
  }

  /// Reveal the goal article's summary. The penalty lands once per round;
  /// the summary itself is fetched on every request, repeats included.
  #[instrument(level = "info", skip(self, source))]
  pub async fn hint<S: GraphSource>(&mut self, source: &S) -> HintOutcome {
    if self.phase != Phase::Playing {
      return HintOutcome::NotPlaying;
    }
    let goal = match &self.puzzle {
      Some(p) => p.goal.clone(),
      None => return HintOutcome::NotPlaying,
    };
    if let Some(round) = self.round.as_mut() {
      if !round.hint_used {
        round.hint_used = true;
        let scoring = self.config.scoring.clone();
        self.score = scoring.debit(self.score, scoring.hint_penalty);
        info!(target: "puzzle", score = self.score, "hint penalty applied");
      }
    }

    let fetched = source.summary(&goal).await;
    let view = self.view().unwrap_or_default();
    match fetched {
      Ok(text) if !text.trim().is_empty() => HintOutcome::Served { view, article: goal, text },
      Ok(_) => HintOutcome::Unavailable {
        view,
        message: format!("No hint is available for \"{}\".", goal),
      },
      Err(e) => {
        warn!(target: "puzzle", goal = %goal, error = %e, "hint fetch failed");
        HintOutcome::Unavailable { view, message: "An error occurred while fetching the hint.".into() }
      }
    }
  }

  /// Forfeit the current round: penalty, no credit, straight into the next
  /// puzzle at the same schedule position.
  #[instrument(level = "info", skip(self, source))]
  pub async fn skip<S: GraphSource>(&mut self, source: &S, confirmed: bool) -> SkipOutcome {
    if !confirmed {
      return SkipOutcome::Declined;
    }
    if self.phase != Phase::Playing {
      return SkipOutcome::NotPlaying;
    }
    let scoring = self.config.scoring.clone();
    self.score = scoring.debit(self.score, scoring.skip_penalty);
    info!(target: "puzzle", score = self.score, "round skipped");
    SkipOutcome::Restarted(self.start_round(source).await)
  }

  /// The deferred re-entry into `start_round` after a clear. Fires only
  /// while still `Cleared` and only for the current epoch; anything else is
  /// a stale callback and is dropped.
  #[instrument(level = "info", skip(self, source))]
  pub async fn advance_round<S: GraphSource>(
    &mut self,
    source: &S,
    epoch: u64,
  ) -> Option<RoundOutcome> {
    if self.phase != Phase::Cleared || epoch != self.advance_epoch {
      info!(target: "puzzle", epoch, current_epoch = self.advance_epoch, "stale round advance dropped");
      return None;
    }
    Some(self.start_round(source).await)
  }

  /// Invalidate any scheduled advance. The owning registry also aborts the
  /// task itself; this guard catches a task that already slipped past the
  /// abort.
  pub fn teardown(&mut self) {
    self.advance_epoch += 1;
  }

  fn current_article(&self) -> ArticleId {
    self
      .round
      .as_ref()
      .map(|r| r.current.clone())
      .unwrap_or_default()
  }
}

/// Fetch the clickable link choices for `article`, mapping every failure
/// shape to the inline message the player sees in their place.
pub(crate) async fn fetch_choices<S: GraphSource>(source: &S, article: &str) -> LinkSet {
  match source.forward_links(article).await {
    Ok(links) if links.is_empty() => LinkSet::Message("This page has no outgoing links.".into()),
    Ok(links) => LinkSet::Choices(links),
    Err(e) => {
      warn!(target: "puzzle", article, error = %e, "forward-link fetch failed");
      LinkSet::Message("An error occurred while fetching links.".into())
    }
  }
}

fn clear_message(round_index: usize, clicks: u32, target_hops: u32) -> String {
  if clicks == target_hops {
    format!(
      "Round {} cleared! You reached the goal in the target {} clicks!",
      round_index + 1,
      target_hops
    )
  } else {
    format!(
      "Round {} cleared! You reached the goal in {} clicks (target: {}).",
      round_index + 1,
      clicks,
      target_hops
    )
  }
}

#[cfg(test)]
mod tests {
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  use super::*;
  use crate::config::{GameConfig, ScoreFloor};
  use crate::source::testutil::FakeGraph;

  fn config(steps: &[u32]) -> GameConfig {
    GameConfig { difficulty_steps: steps.to_vec(), ..GameConfig::default() }
  }

  fn session(cfg: GameConfig) -> GameSession {
    GameSession::new(cfg, StdRng::seed_from_u64(99))
  }

  /// goal "G" with a backlink chain long enough for any schedule here, plus
  /// some off-path pages to wander through.
  fn chain_graph() -> FakeGraph {
    FakeGraph::new()
      .with_random(&["G"])
      .link("A", "G")
      .link("B", "A")
      .link("C", "B")
      .link("D", "C")
      .link("X1", "X2")
      .summary_text("G", "G is the goal article.")
  }

  #[tokio::test]
  async fn plain_clicks_debit_the_click_penalty() {
    let graph = chain_graph();
    let mut game = session(config(&[3]));

    let outcome = game.start_session(&graph).await;
    assert!(matches!(outcome, RoundOutcome::Started { .. }));
    assert_eq!(game.phase(), Phase::Playing);

    assert!(matches!(game.navigate(&graph, "X1").await, NavigateOutcome::Moved { .. }));
    assert!(matches!(game.navigate(&graph, "X2").await, NavigateOutcome::Moved { .. }));

    let view = game.view().expect("view");
    assert_eq!(view.click_count, 2);
    assert_eq!(view.score, -200);
    assert_eq!(view.current_article, "X2");
  }

  #[tokio::test]
  async fn clamp_at_zero_floors_the_score() {
    let mut cfg = config(&[3]);
    cfg.scoring.initial_score = 50;
    cfg.scoring.floor = ScoreFloor::ClampAtZero;
    let graph = chain_graph();
    let mut game = session(cfg);

    game.start_session(&graph).await;
    game.navigate(&graph, "X1").await;
    assert_eq!(game.score(), 0);
  }

  #[tokio::test]
  async fn clearing_a_round_awards_the_bonus_and_defers_the_next() {
    let graph = chain_graph();
    let mut game = session(config(&[1, 1]));

    game.start_session(&graph).await;
    let view = game.view().expect("view");
    assert_eq!(view.current_article, "A");
    assert_eq!(view.goal_article, "G");

    match game.navigate(&graph, "G").await {
      NavigateOutcome::Cleared { view, message, advance } => {
        assert_eq!(view.click_count, 1);
        // -100 click penalty, +1000 clear bonus
        assert_eq!(view.score, 900);
        assert_eq!(message, "Round 1 cleared! You reached the goal in the target 1 clicks!");
        assert_eq!(advance.delay, Duration::from_millis(1500));

        assert_eq!(game.phase(), Phase::Cleared);
        assert_eq!(game.cleared_rounds(), 1);

        // the deferred advance starts round 2
        let next = game.advance_round(&graph, advance.epoch).await;
        assert!(matches!(next, Some(RoundOutcome::Started { .. })));
        assert_eq!(game.phase(), Phase::Playing);
        let view = game.view().expect("view");
        assert_eq!(view.round_index, 1);
        assert_eq!(view.click_count, 0);
        assert_eq!(view.score, 900);
      }
      other => panic!("expected Cleared, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn overshooting_the_target_is_reported_in_the_clear_message() {
    let graph = chain_graph();
    let mut game = session(config(&[1, 1]));

    game.start_session(&graph).await;
    game.navigate(&graph, "X1").await;
    match game.navigate(&graph, "G").await {
      NavigateOutcome::Cleared { message, .. } => {
        assert_eq!(message, "Round 1 cleared! You reached the goal in 2 clicks (target: 1).");
      }
      other => panic!("expected Cleared, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn navigation_after_a_clear_changes_nothing() {
    let graph = chain_graph();
    let mut game = session(config(&[1, 1]));

    game.start_session(&graph).await;
    game.navigate(&graph, "G").await;
    assert_eq!(game.phase(), Phase::Cleared);
    let before = game.view().expect("view");

    assert!(matches!(game.navigate(&graph, "A").await, NavigateOutcome::Ignored));
    assert!(matches!(game.navigate(&graph, "G").await, NavigateOutcome::Ignored));

    let after = game.view().expect("view");
    assert_eq!(after.click_count, before.click_count);
    assert_eq!(after.score, before.score);
    assert_eq!(after.current_article, before.current_article);
  }

  #[tokio::test]
  async fn third_clear_completes_the_session_for_good() {
    let graph = chain_graph();
    let mut game = session(config(&[1, 1, 1]));

    game.start_session(&graph).await;
    let first = game.navigate(&graph, "G").await;
    let advance = match first {
      NavigateOutcome::Cleared { advance, .. } => advance,
      other => panic!("expected Cleared, got {:?}", other),
    };
    game.advance_round(&graph, advance.epoch).await.expect("round 2");

    let second = game.navigate(&graph, "G").await;
    let advance = match second {
      NavigateOutcome::Cleared { advance, .. } => advance,
      other => panic!("expected Cleared, got {:?}", other),
    };
    game.advance_round(&graph, advance.epoch).await.expect("round 3");

    match game.navigate(&graph, "G").await {
      NavigateOutcome::Completed { final_score, message, .. } => {
        // three rounds of -100 + 1000 each
        assert_eq!(final_score, 2700);
        assert_eq!(message, "All 3 rounds cleared! Final score: 2700.");
      }
      other => panic!("expected Completed, got {:?}", other),
    }
    assert_eq!(game.cleared_rounds(), 3);
    assert_eq!(game.phase(), Phase::SessionComplete);

    // no further round ever starts
    assert!(game.advance_round(&graph, advance.epoch).await.is_none());
    assert!(game.advance_round(&graph, advance.epoch + 1).await.is_none());
    assert!(matches!(game.navigate(&graph, "A").await, NavigateOutcome::Ignored));
  }

  #[tokio::test]
  async fn hint_penalty_lands_once_but_the_summary_always_arrives() {
    let graph = chain_graph();
    let mut game = session(config(&[2]));

    game.start_session(&graph).await;
    match game.hint(&graph).await {
      HintOutcome::Served { view, article, text } => {
        assert_eq!(article, "G");
        assert_eq!(text, "G is the goal article.");
        assert_eq!(view.score, -2000);
        assert!(view.hint_used);
      }
      other => panic!("expected Served, got {:?}", other),
    }

    // second request: same summary, no second penalty
    match game.hint(&graph).await {
      HintOutcome::Served { view, text, .. } => {
        assert_eq!(text, "G is the goal article.");
        assert_eq!(view.score, -2000);
      }
      other => panic!("expected Served, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn hint_outage_still_costs_the_penalty_once() {
    let mut graph = chain_graph();
    graph.fail_summary = true;
    let mut game = session(config(&[2]));

    game.start_session(&graph).await;
    match game.hint(&graph).await {
      HintOutcome::Unavailable { view, message } => {
        assert_eq!(view.score, -2000);
        assert_eq!(message, "An error occurred while fetching the hint.");
      }
      other => panic!("expected Unavailable, got {:?}", other),
    }
    match game.hint(&graph).await {
      HintOutcome::Unavailable { view, .. } => assert_eq!(view.score, -2000),
      other => panic!("expected Unavailable, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn confirmed_skip_forfeits_without_credit() {
    let mut cfg = config(&[1, 1]);
    cfg.scoring.initial_score = 500;
    cfg.scoring.floor = ScoreFloor::ClampAtZero;
    let graph = chain_graph();
    let mut game = session(cfg);

    game.start_session(&graph).await;
    match game.skip(&graph, true).await {
      SkipOutcome::Restarted(RoundOutcome::Started { view, .. }) => {
        // 500 - 5000 clamps to 0; still on round 1 with a fresh puzzle
        assert_eq!(view.score, 0);
        assert_eq!(view.round_index, 0);
        assert_eq!(view.click_count, 0);
      }
      other => panic!("expected Restarted, got {:?}", other),
    }
    assert_eq!(game.cleared_rounds(), 0);
    assert_eq!(game.phase(), Phase::Playing);
  }

  #[tokio::test]
  async fn unconfirmed_skip_is_a_no_op() {
    let graph = chain_graph();
    let mut game = session(config(&[2]));

    game.start_session(&graph).await;
    let before = game.score();
    assert!(matches!(game.skip(&graph, false).await, SkipOutcome::Declined));
    assert_eq!(game.score(), before);
    assert_eq!(game.phase(), Phase::Playing);
  }

  #[tokio::test]
  async fn teardown_invalidates_a_pending_advance() {
    let graph = chain_graph();
    let mut game = session(config(&[1, 1]));

    game.start_session(&graph).await;
    let advance = match game.navigate(&graph, "G").await {
      NavigateOutcome::Cleared { advance, .. } => advance,
      other => panic!("expected Cleared, got {:?}", other),
    };

    game.teardown();
    assert!(game.advance_round(&graph, advance.epoch).await.is_none());
    assert_eq!(game.phase(), Phase::Cleared);
  }

  #[tokio::test]
  async fn generation_failure_is_terminal_for_the_round() {
    // nothing to draw: every attempt fails
    let graph = FakeGraph::new();
    let mut game = session(config(&[2]));

    match game.start_session(&graph).await {
      RoundOutcome::Failed { message } => {
        assert_eq!(message, "Could not find a 2-hop puzzle. Please try again.");
      }
      other => panic!("expected Failed, got {:?}", other),
    }
    assert_eq!(game.phase(), Phase::Failed);
    assert!(game.view().is_none());
    assert!(matches!(game.navigate(&graph, "A").await, NavigateOutcome::Ignored));
  }

  #[tokio::test]
  async fn link_outage_at_round_start_degrades_to_a_message() {
    let mut graph = chain_graph();
    graph.fail_forward = true;
    let mut game = session(config(&[1]));

    match game.start_session(&graph).await {
      RoundOutcome::Started { view, links } => {
        assert!(matches!(links, LinkSet::Message(_)));
        // the failed fetch mutates nothing
        assert_eq!(view.click_count, 0);
        assert_eq!(view.score, 0);
      }
      other => panic!("expected Started, got {:?}", other),
    }
    assert_eq!(game.phase(), Phase::Playing);
  }

  #[tokio::test]
  async fn a_start_equals_goal_puzzle_ignores_navigation() {
    // "Loop" only links to itself, so backtracking lands on the goal again.
    let graph = FakeGraph::new().with_random(&["Loop"]).link("Loop", "Loop");
    let mut game = session(config(&[2]));

    game.start_session(&graph).await;
    assert_eq!(game.phase(), Phase::Playing);
    let view = game.view().expect("view");
    assert_eq!(view.current_article, "Loop");
    assert_eq!(view.goal_article, "Loop");

    // preserved oddity: the round can only be escaped by skipping
    assert!(matches!(game.navigate(&graph, "Loop").await, NavigateOutcome::Ignored));
    assert_eq!(game.view().expect("view").click_count, 0);
  }
}

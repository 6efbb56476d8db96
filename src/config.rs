//! Loading the game configuration (difficulty schedule + scoring policy) from
//! TOML.
//!
//! See `GameConfig` and `Scoring` for the expected schema. Defaults reproduce
//! the shipped game: three rounds at 2/3/4 hops, 100-point click penalty,
//! 2000-point hint penalty, 5000-point skip penalty, 1000-point clear bonus,
//! score allowed to go negative.

use serde::Deserialize;
use tracing::{error, info};

/// What happens when a penalty would push the score below zero.
/// Shipped variants of the game disagree, so this is policy, not behavior.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFloor {
  AllowNegative,
  ClampAtZero,
}

impl Default for ScoreFloor {
  fn default() -> Self { ScoreFloor::AllowNegative }
}

/// Scoring policy applied by the round controller.
#[derive(Clone, Debug, Deserialize)]
pub struct Scoring {
  #[serde(default)] pub initial_score: i64,
  #[serde(default = "default_click_penalty")] pub click_penalty: i64,
  #[serde(default = "default_hint_penalty")] pub hint_penalty: i64,
  #[serde(default = "default_skip_penalty")] pub skip_penalty: i64,
  /// Set to 0 to disable the bonus (the clamp-at-zero variant has none).
  #[serde(default = "default_round_clear_bonus")] pub round_clear_bonus: i64,
  #[serde(default)] pub floor: ScoreFloor,
}

impl Default for Scoring {
  fn default() -> Self {
    Self {
      initial_score: 0,
      click_penalty: default_click_penalty(),
      hint_penalty: default_hint_penalty(),
      skip_penalty: default_skip_penalty(),
      round_clear_bonus: default_round_clear_bonus(),
      floor: ScoreFloor::default(),
    }
  }
}

impl Scoring {
  /// Subtract a penalty, honoring the configured floor.
  pub fn debit(&self, score: i64, amount: i64) -> i64 {
    let next = score.saturating_sub(amount);
    match self.floor {
      ScoreFloor::AllowNegative => next,
      ScoreFloor::ClampAtZero => next.max(0),
    }
  }
}

fn default_click_penalty() -> i64 { 100 }
fn default_hint_penalty() -> i64 { 2000 }
fn default_skip_penalty() -> i64 { 5000 }
fn default_round_clear_bonus() -> i64 { 1000 }

/// Full game configuration. All fields have defaults so a partial TOML file
/// only overrides what it mentions.
#[derive(Clone, Debug, Deserialize)]
pub struct GameConfig {
  /// Target hop count per round; its length is the round count.
  #[serde(default = "default_difficulty_steps")] pub difficulty_steps: Vec<u32>,
  #[serde(default)] pub scoring: Scoring,
  /// Total puzzle-generation attempts before giving up on a round.
  #[serde(default = "default_max_attempts")] pub max_attempts: u32,
  /// Pause between a cleared round and the next one starting.
  #[serde(default = "default_clear_delay_ms")] pub clear_delay_ms: u64,
}

impl Default for GameConfig {
  fn default() -> Self {
    Self {
      difficulty_steps: default_difficulty_steps(),
      scoring: Scoring::default(),
      max_attempts: default_max_attempts(),
      clear_delay_ms: default_clear_delay_ms(),
    }
  }
}

impl GameConfig {
  pub fn total_rounds(&self) -> usize {
    self.difficulty_steps.len()
  }

  /// Reject schedules the controller cannot run.
  pub fn validate(&self) -> Result<(), String> {
    if self.difficulty_steps.is_empty() {
      return Err("difficulty_steps must list at least one round".into());
    }
    if self.difficulty_steps.iter().any(|&hops| hops == 0) {
      return Err("difficulty_steps entries must be at least 1 hop".into());
    }
    if self.max_attempts == 0 {
      return Err("max_attempts must be at least 1".into());
    }
    Ok(())
  }
}

fn default_difficulty_steps() -> Vec<u32> { vec![2, 3, 4] }
fn default_max_attempts() -> u32 { 10 }
fn default_clear_delay_ms() -> u64 { 1500 }

/// Attempt to load `GameConfig` from GAME_CONFIG_PATH.
/// On any IO/parse/validation error, returns None and the caller falls back
/// to the defaults.
pub fn load_game_config_from_env() -> Option<GameConfig> {
  let path = std::env::var("GAME_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<GameConfig>(&s) {
      Ok(cfg) => match cfg.validate() {
        Ok(()) => {
          info!(target: "wikirace_backend", %path, "Loaded game config (TOML)");
          Some(cfg)
        }
        Err(e) => {
          error!(target: "wikirace_backend", %path, error = %e, "Rejected game config");
          None
        }
      },
      Err(e) => {
        error!(target: "wikirace_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "wikirace_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

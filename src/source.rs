//! The seam between game logic and the article-link graph.
//!
//! Production uses the MediaWiki client in `wikipedia.rs`; tests use the
//! in-memory `FakeGraph` below. Errors are human-readable strings carrying
//! whatever the transport reported; callers decide whether a failure is
//! retried (puzzle generation) or surfaced inline (link/summary fetches).

use crate::domain::ArticleId;

// Callers only ever hand these futures to a concrete source type, so the
// auto-trait leakage of `async fn` is sufficient; no Send bound gymnastics.
#[allow(async_fn_in_trait)]
pub trait GraphSource {
  /// Draw `n` random content-namespace articles. May return fewer.
  async fn random_articles(&self, n: usize) -> Result<Vec<ArticleId>, String>;

  /// Articles whose content links *to* `article` (content namespace only).
  async fn backlinks(&self, article: &str) -> Result<Vec<ArticleId>, String>;

  /// Outbound links of `article`. A missing page is an error; a page with no
  /// links is `Ok(vec![])`.
  async fn forward_links(&self, article: &str) -> Result<Vec<ArticleId>, String>;

  /// Intro summary text for `article`. May be empty.
  async fn summary(&self, article: &str) -> Result<String, String>;
}

#[cfg(test)]
pub(crate) mod testutil {
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::GraphSource;
  use crate::domain::ArticleId;

  /// In-memory article graph for tests. Edges are registered with `link`,
  /// which keeps the forward and backward indices consistent.
  #[derive(Default)]
  pub struct FakeGraph {
    pub random_pool: Vec<ArticleId>,
    pub links_in: HashMap<ArticleId, Vec<ArticleId>>,
    pub links_out: HashMap<ArticleId, Vec<ArticleId>>,
    pub summaries: HashMap<ArticleId, String>,
    pub fail_forward: bool,
    pub fail_summary: bool,
    pub random_calls: AtomicUsize,
    pub backlink_calls: AtomicUsize,
  }

  impl FakeGraph {
    pub fn new() -> Self {
      Self::default()
    }

    pub fn with_random(mut self, titles: &[&str]) -> Self {
      self.random_pool = titles.iter().map(|t| t.to_string()).collect();
      self
    }

    pub fn link(mut self, from: &str, to: &str) -> Self {
      self
        .links_out
        .entry(from.to_string())
        .or_default()
        .push(to.to_string());
      self
        .links_in
        .entry(to.to_string())
        .or_default()
        .push(from.to_string());
      self
    }

    pub fn summary_text(mut self, article: &str, text: &str) -> Self {
      self.summaries.insert(article.to_string(), text.to_string());
      self
    }
  }

  impl GraphSource for FakeGraph {
    async fn random_articles(&self, n: usize) -> Result<Vec<ArticleId>, String> {
      let call = self.random_calls.fetch_add(1, Ordering::SeqCst);
      if self.random_pool.is_empty() {
        return Ok(Vec::new());
      }
      let start = call % self.random_pool.len();
      Ok(
        self
          .random_pool
          .iter()
          .cycle()
          .skip(start)
          .take(n)
          .cloned()
          .collect(),
      )
    }

    async fn backlinks(&self, article: &str) -> Result<Vec<ArticleId>, String> {
      self.backlink_calls.fetch_add(1, Ordering::SeqCst);
      Ok(self.links_in.get(article).cloned().unwrap_or_default())
    }

    async fn forward_links(&self, article: &str) -> Result<Vec<ArticleId>, String> {
      if self.fail_forward {
        return Err("simulated link outage".into());
      }
      Ok(self.links_out.get(article).cloned().unwrap_or_default())
    }

    async fn summary(&self, article: &str) -> Result<String, String> {
      if self.fail_summary {
        return Err("simulated summary outage".into());
      }
      Ok(self.summaries.get(article).cloned().unwrap_or_default())
    }
  }
}

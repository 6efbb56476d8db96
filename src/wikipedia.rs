//! MediaWiki Action API client: the production `GraphSource`.
//!
//! We only issue `action=query` GETs and decode the legacy JSON format (the
//! one where `pages` is keyed by page id and a missing page sits under the
//! key "-1"). Calls are instrumented and log article titles, latencies and
//! result sizes (not page contents).

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::USER_AGENT;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::domain::ArticleId;
use crate::source::GraphSource;
use crate::util::trunc_for_log;

const DEFAULT_API_URL: &str = "https://ja.wikipedia.org/w/api.php";

#[derive(Clone)]
pub struct WikipediaSource {
  client: reqwest::Client,
  pub api_url: String,
}

impl WikipediaSource {
  /// Construct the client; WIKI_API_URL overrides the default endpoint.
  pub fn from_env() -> Result<Self, String> {
    let api_url = std::env::var("WIKI_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .map_err(|e| format!("HTTP client init failed: {}", e))?;
    Ok(Self { client, api_url })
  }

  /// One `action=query` GET, decoded into the given response type.
  #[instrument(level = "debug", skip(self, params))]
  async fn query<T: for<'a> Deserialize<'a>>(&self, params: &[(&str, &str)]) -> Result<T, String> {
    let res = self
      .client
      .get(&self.api_url)
      .header(USER_AGENT, "wikirace-backend/0.1")
      .query(&[("action", "query"), ("format", "json"), ("origin", "*")])
      .query(params)
      .send()
      .await
      .map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      return Err(format!("MediaWiki HTTP {}: {}", status, trunc_for_log(&body, 200)));
    }

    res.json::<T>().await.map_err(|e| e.to_string())
  }
}

impl GraphSource for WikipediaSource {
  async fn random_articles(&self, n: usize) -> Result<Vec<ArticleId>, String> {
    let limit = n.to_string();
    let body: RandomResponse = self
      .query(&[("list", "random"), ("rnnamespace", "0"), ("rnlimit", &limit)])
      .await?;
    let titles = random_titles(body);
    debug!(target: "puzzle", count = titles.len(), "random articles drawn");
    Ok(titles)
  }

  async fn backlinks(&self, article: &str) -> Result<Vec<ArticleId>, String> {
    let body: BacklinksResponse = self
      .query(&[
        ("list", "backlinks"),
        ("bltitle", article),
        ("bllimit", "max"),
        ("blnamespace", "0"),
      ])
      .await?;
    let titles = backlink_titles(body);
    debug!(target: "puzzle", article, count = titles.len(), "backlinks fetched");
    Ok(titles)
  }

  async fn forward_links(&self, article: &str) -> Result<Vec<ArticleId>, String> {
    let body: PagesResponse = self
      .query(&[("titles", article), ("prop", "links"), ("pllimit", "max")])
      .await?;
    let titles = forward_titles(article, body)?;
    debug!(target: "puzzle", article, count = titles.len(), "forward links fetched");
    Ok(titles)
  }

  async fn summary(&self, article: &str) -> Result<String, String> {
    let body: PagesResponse = self
      .query(&[
        ("titles", article),
        ("prop", "extracts"),
        ("exintro", "true"),
        ("explaintext", "true"),
      ])
      .await?;
    let text = extract_text(body);
    debug!(target: "puzzle", article, preview = %trunc_for_log(&text, 80), "summary fetched");
    Ok(text)
  }
}

// --- Response decoding (legacy JSON format) ---

fn random_titles(body: RandomResponse) -> Vec<ArticleId> {
  body
    .query
    .map(|q| q.random.into_iter().map(|item| item.title).collect())
    .unwrap_or_default()
}

fn backlink_titles(body: BacklinksResponse) -> Vec<ArticleId> {
  body
    .query
    .and_then(|q| q.backlinks)
    .map(|items| items.into_iter().map(|item| item.title).collect())
    .unwrap_or_default()
}

fn forward_titles(article: &str, body: PagesResponse) -> Result<Vec<ArticleId>, String> {
  let pages = body.query.map(|q| q.pages).unwrap_or_default();
  // The legacy format reports a nonexistent title under the key "-1".
  if pages.contains_key("-1") {
    return Err(format!("page \"{}\" does not exist", article));
  }
  let links = pages
    .into_values()
    .next()
    .and_then(|page| page.links)
    .unwrap_or_default();
  Ok(links.into_iter().map(|item| item.title).collect())
}

fn extract_text(body: PagesResponse) -> String {
  body
    .query
    .map(|q| q.pages)
    .unwrap_or_default()
    .into_values()
    .next()
    .and_then(|page| page.extract)
    .unwrap_or_default()
}

// --- Query DTOs ---

#[derive(Deserialize)]
struct TitleItem {
  title: String,
}

#[derive(Deserialize)]
struct RandomResponse {
  #[serde(default)]
  query: Option<RandomQuery>,
}
#[derive(Deserialize)]
struct RandomQuery {
  #[serde(default)]
  random: Vec<TitleItem>,
}

#[derive(Deserialize)]
struct BacklinksResponse {
  #[serde(default)]
  query: Option<BacklinksQuery>,
}
#[derive(Deserialize)]
struct BacklinksQuery {
  #[serde(default)]
  backlinks: Option<Vec<TitleItem>>,
}

#[derive(Deserialize)]
struct PagesResponse {
  #[serde(default)]
  query: Option<PagesQuery>,
}
#[derive(Deserialize)]
struct PagesQuery {
  #[serde(default)]
  pages: HashMap<String, PageEntry>,
}
#[derive(Deserialize, Default)]
struct PageEntry {
  #[serde(default)]
  links: Option<Vec<TitleItem>>,
  #[serde(default)]
  extract: Option<String>,
}

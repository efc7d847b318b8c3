use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::OnceLock};

use crate::error::{PlannerError, Result};

const DEFAULT_SEARCH_URL: &str = "https://s.jina.ai";

/// Web lookup used to find ticket prices for attractions
#[async_trait]
pub trait PriceLookup: Send + Sync {
    /// Return free text describing the search results for `query`
    async fn lookup(&self, query: &str) -> Result<String>;
}

/// One search hit parsed from the Jina search response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSnippet {
    pub title: Option<String>,
    pub url_source: Option<String>,
    pub description: Option<String>,
}

/// Price lookup backed by the Jina search API
#[derive(Debug, Clone)]
pub struct JinaSearchClient {
    api_key: String,
    base_url: String,
    client: Client,
}

impl JinaSearchClient {
    /// Create a new client using the provided API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_SEARCH_URL.to_string(),
            client: Client::new(),
        }
    }

    /// Build the client using the `JINA_API_KEY` environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("JINA_API_KEY")
            .map_err(|_| PlannerError::Config("Missing JINA_API_KEY env var".to_string()))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl PriceLookup for JinaSearchClient {
    async fn lookup(&self, query: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[("q", query)])
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Respond-With", "no-content")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PlannerError::Upstream(format!(
                "Jina search returned status {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let snippets = parse_search_response(&body);

        if snippets.is_empty() {
            return Ok(body);
        }

        Ok(snippets
            .iter()
            .map(|snippet| {
                format!(
                    "{}\n{}",
                    snippet.title.as_deref().unwrap_or_default(),
                    snippet.description.as_deref().unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

/// Parse the `[n] Title: ...` line format returned by Jina search.
///
/// Snippets come back ordered by their index; indexes without any line are skipped.
pub fn parse_search_response(raw: &str) -> Vec<SearchSnippet> {
    let mut snippets: BTreeMap<usize, SearchSnippet> = BTreeMap::new();

    for line in raw.lines() {
        let Some(rest) = line.strip_prefix('[') else {
            continue;
        };
        let Some((index, field)) = rest.split_once("] ") else {
            continue;
        };
        let Ok(index) = index.parse::<usize>() else {
            continue;
        };
        let snippet = snippets.entry(index).or_default();

        if let Some(value) = field.strip_prefix("Title: ") {
            snippet.title = Some(value.trim().to_string());
        } else if let Some(value) = field.strip_prefix("URL Source: ") {
            snippet.url_source = Some(value.trim().to_string());
        } else if let Some(value) = field.strip_prefix("Description: ") {
            snippet.description = Some(value.trim().to_string());
        }
    }

    snippets.into_values().collect()
}

fn price_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"[€$£]\s*\d+(?:\.\d{2})?",
            r"\d+(?:\.\d{2})?\s*[€$£]",
            r"(?:EUR|USD|GBP)\s*\d+",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}

/// Find a ticket price in free text: the first currency amount, else "Free"
/// when the text mentions free admission
pub fn extract_ticket_price(text: &str) -> Option<String> {
    for pattern in price_patterns() {
        if let Some(found) = pattern.find(text) {
            return Some(found.as_str().to_string());
        }
    }

    let lower = text.to_lowercase();
    if lower.contains("free") && lower.contains("admission") {
        return Some("Free".to_string());
    }

    None
}

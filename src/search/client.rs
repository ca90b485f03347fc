//! Web Search Client
//!
//! Issues `GET {base}/search` requests and normalizes whatever shape the
//! search API answers with into [`SearchResponse`].
//!
//! ## Accepted payloads
//!
//! - a bare array of results
//! - `{ "results": [...] }`
//! - `{ "organic": [...] }`
//!
//! The body is decoded once into a `serde_json::Value` and classified by
//! shape alone. Each row is then normalized on its own, so a field with an
//! unexpected type falls back to its default instead of dropping the response.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur during a search request
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search request failed: {0}")]
    Request(String),

    #[error("Search API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode search response: {0}")]
    Decode(String),
}

/// Query parameters sent with every search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub engine: String,
    pub max_results: u32,
    pub region: String,
    pub safesearch: String,
    pub search_type: String,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            engine: "google".to_string(),
            max_results: 10,
            region: "all".to_string(),
            safesearch: "moderate".to_string(),
            search_type: "text".to_string(),
        }
    }
}

/// One normalized search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub title: String,
    pub description: String,
    pub url: String,
    pub source: String,
    pub position: u32,
    #[serde(rename = "type")]
    pub result_type: String,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub total_results: u64,
    /// Seconds reported by the search API, 0 when it did not say
    pub search_time: f64,
    pub query: String,
}

impl SearchResponse {
    /// Response standing in for a query that produced nothing
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            total_results: 0,
            search_time: 0.0,
            query: query.into(),
        }
    }
}

/// Anything that can answer a single search query
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse, SearchError>;
}

pub type SharedSearch = Arc<dyn WebSearch>;

/// The shapes the search API is known to answer with, borrowed from the decoded body
#[derive(Debug)]
enum SearchPayload<'a> {
    Bare(&'a [Value]),
    Results(&'a [Value], &'a Map<String, Value>),
    Organic(&'a [Value], &'a Map<String, Value>),
    Unrecognized(&'a Value),
}

impl<'a> SearchPayload<'a> {
    /// Dispatch on shape only; row and stat types are checked later, field by field
    fn classify(value: &'a Value) -> Self {
        match value {
            Value::Array(rows) => SearchPayload::Bare(rows),
            Value::Object(object) => match (object.get("results"), object.get("organic")) {
                (Some(Value::Array(rows)), _) => SearchPayload::Results(rows, object),
                (_, Some(Value::Array(rows))) => SearchPayload::Organic(rows, object),
                _ => SearchPayload::Unrecognized(value),
            },
            other => SearchPayload::Unrecognized(other),
        }
    }

    fn into_parts(self) -> (&'a [Value], Option<&'a Map<String, Value>>) {
        match self {
            SearchPayload::Bare(rows) => (rows, None),
            SearchPayload::Results(rows, object) | SearchPayload::Organic(rows, object) => (rows, Some(object)),
            SearchPayload::Unrecognized(value) => {
                warn!(kind = value_kind(value), "Unrecognized search payload, treating as empty");
                (&[], None)
            }
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// First key holding a non-blank string; other types count as missing
fn str_field(row: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| row.get(*key).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Numbers, or strings holding one
fn lenient_u64(value: Option<&Value>) -> Option<u64> {
    let value = value?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn lenient_f64(value: Option<&Value>) -> Option<f64> {
    let value = value?;
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn stat<'a>(object: Option<&'a Map<String, Value>>, keys: &[&str]) -> Option<&'a Value> {
    let object = object?;
    keys.iter().find_map(|key| object.get(*key))
}

fn hostname(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
}

fn normalize_row(row: &Map<String, Value>, index: usize, default_type: &str) -> SearchResultItem {
    let url = str_field(row, &["url", "href", "link"]).unwrap_or_default();
    let source = str_field(row, &["source"])
        .or_else(|| hostname(&url))
        .unwrap_or_else(|| "web".to_string());

    SearchResultItem {
        title: str_field(row, &["title"]).unwrap_or_else(|| "No title".to_string()),
        description: str_field(row, &["description", "body", "snippet"]).unwrap_or_default(),
        url,
        source,
        position: lenient_u64(row.get("position"))
            .and_then(|p| u32::try_from(p).ok())
            .unwrap_or(index as u32 + 1),
        result_type: str_field(row, &["type"]).unwrap_or_else(|| default_type.to_string()),
        metadata: row
            .get("metadata")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
    }
}

/// Decode a search API body into a normalized response
pub fn normalize_response(body: &str, query: &str, options: &SearchOptions) -> Result<SearchResponse, SearchError> {
    let value: Value = serde_json::from_str(body).map_err(|e| SearchError::Decode(e.to_string()))?;
    let (rows, object) = SearchPayload::classify(&value).into_parts();

    let results: Vec<SearchResultItem> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| match row.as_object() {
            Some(row) => Some(normalize_row(row, i, &options.search_type)),
            None => {
                debug!(kind = value_kind(row), position = i + 1, "Skipping non-object search result");
                None
            }
        })
        .collect();

    Ok(SearchResponse {
        total_results: lenient_u64(stat(object, &["total_results", "totalResults"]))
            .unwrap_or(results.len() as u64),
        search_time: lenient_f64(stat(object, &["search_time", "searchTime"])).unwrap_or(0.0),
        query: query.to_string(),
        results,
    })
}

/// HTTP client for the search API
pub struct SearchClient {
    client: Client,
    api_base: String,
}

impl SearchClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &crate::config::SearchConfig) -> Self {
        Self::new(config.api_base.clone())
    }
}

#[async_trait]
impl WebSearch for SearchClient {
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse, SearchError> {
        info!(query = %query, engine = %options.engine, "Searching");

        let max_results = options.max_results.to_string();
        let params = [
            ("q", query),
            ("engine", options.engine.as_str()),
            ("max_results", max_results.as_str()),
            ("region", options.region.as_str()),
            ("safesearch", options.safesearch.as_str()),
            ("type", options.search_type.as_str()),
        ];

        let response = self
            .client
            .get(format!("{}/search", self.api_base))
            .query(&params)
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let normalized = normalize_response(&body, query, options)?;
        debug!(query = %query, count = normalized.results.len(), "Search completed");
        Ok(normalized)
    }
}

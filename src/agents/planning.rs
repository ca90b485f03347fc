//! Query Planning
//!
//! Turns a research topic into an ordered list of search queries.
//!
//! - [`AIQueryPlanner`] asks the completion endpoint for a JSON plan
//! - [`HeuristicQueryPlanner`] derives a plan from keywords and never fails

use super::plan_parser::{ParseError, QueryPlanParser};
use crate::llm::SharedLLM;
use crate::types::{AppError, LLMMessage, LLMRequest};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Model id that cannot follow the structured planning instruction
pub const UNSUPPORTED_PLANNING_MODEL: &str = "AI4Chat/default";

pub const DEFAULT_MAX_QUERIES: usize = 3;

const PLANNING_TEMPERATURE: f32 = 0.3;
const PLANNING_MAX_TOKENS: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub rationale: String,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            rationale: rationale.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub rationale: String,
    pub queries: Vec<SearchQuery>,
}

#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("model {model} does not support structured query planning")]
    UnsupportedModel { model: String },

    #[error("planning request failed: {0}")]
    Request(#[from] AppError),

    #[error("planning response had no content")]
    NoChoices,

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("planning response contained no usable queries")]
    EmptyPlan,
}

/// LLM-backed planner
pub struct AIQueryPlanner {
    llm: SharedLLM,
}

impl AIQueryPlanner {
    pub fn new(llm: SharedLLM) -> Self {
        Self { llm }
    }

    pub async fn generate_plan(
        &self,
        topic: &str,
        max_queries: usize,
        model_id: &str,
    ) -> Result<QueryPlan, PlanningError> {
        if model_id == UNSUPPORTED_PLANNING_MODEL {
            return Err(PlanningError::UnsupportedModel {
                model: model_id.to_string(),
            });
        }

        let max_queries = max_queries.max(1);
        let request = LLMRequest::new(model_id, vec![LLMMessage::user(topic)])
            .with_system_instruction(planning_instruction(max_queries))
            .with_temperature(PLANNING_TEMPERATURE)
            .with_max_tokens(PLANNING_MAX_TOKENS);

        info!(model = %model_id, max_queries, "Requesting AI query plan");
        let response = self.llm.create_chat_completion(&request).await?;
        if response.content.trim().is_empty() {
            return Err(PlanningError::NoChoices);
        }
        debug!(content_len = response.content.len(), "Received planning response");

        let mut plan = QueryPlanParser::parse(&response.content)?;
        plan.queries.truncate(max_queries);
        if plan.queries.is_empty() {
            return Err(PlanningError::EmptyPlan);
        }

        info!(query_count = plan.queries.len(), "AI query plan ready");
        Ok(plan)
    }
}

fn planning_instruction(max_queries: usize) -> String {
    let today = Utc::now().format("%Y-%m-%d");
    format!(
        "You are a search query planner. Today's date is {today}.\n\
         Break the user's topic into at most {max_queries} focused web search queries \
         that together cover it from different angles.\n\
         Respond with ONLY a JSON object of this exact shape and nothing else:\n\
         {{\"rationale\": \"<overall search strategy>\", \"queries\": [{{\"query\": \"<search text>\", \"rationale\": \"<why this query>\"}}]}}\n\
         Do not wrap the JSON in code fences and do not add commentary."
    )
}

const TEMPORAL_KEYWORDS: &[&str] = &["latest", "recent", "current"];
const COMPARISON_KEYWORDS: &[&str] = &["vs", "versus", "compare", "difference"];
const INSTRUCTIONAL_KEYWORDS: &[&str] = &["tutorial", "guide"];

/// Keyword-driven fallback planner
#[derive(Debug, Clone)]
pub struct HeuristicQueryPlanner {
    year: i32,
}

impl Default for HeuristicQueryPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicQueryPlanner {
    pub fn new() -> Self {
        Self::with_year(Utc::now().year())
    }

    pub fn with_year(year: i32) -> Self {
        Self { year }
    }

    pub fn generate_plan(&self, topic: &str, max_queries: usize) -> QueryPlan {
        let max_queries = max_queries.max(1);
        let year = self.year;
        let words = words(topic);

        let this_year = year.to_string();
        let next_year = (year + 1).to_string();
        let temporal = contains_any(&words, TEMPORAL_KEYWORDS)
            || contains_any(&words, &[this_year.as_str(), next_year.as_str()]);
        let comparison = contains_any(&words, COMPARISON_KEYWORDS);
        let instructional = contains_any(&words, INSTRUCTIONAL_KEYWORDS)
            || words.windows(2).any(|pair| pair[0] == "how" && pair[1] == "to");

        let mut queries = vec![SearchQuery::new(topic, "Direct search for the main topic")];
        let candidates = [
            (temporal, format!("{topic} {year}"), "Focus on the most recent information"),
            (comparison, format!("{topic} comparison analysis"), "Compare the options side by side"),
            (instructional, format!("{topic} step by step"), "Find practical step-by-step instructions"),
            (true, format!("{topic} latest news {year}"), "Catch recent news and developments"),
        ];

        for (applies, query, rationale) in candidates {
            if queries.len() >= max_queries {
                break;
            }
            if applies {
                queries.push(SearchQuery::new(query, rationale));
            }
        }

        QueryPlan {
            rationale: "Keyword-based search plan covering the topic directly and from related angles".to_string(),
            queries,
        }
    }
}

fn contains_any(words: &[String], keywords: &[&str]) -> bool {
    keywords.iter().any(|k| words.iter().any(|w| w == k))
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

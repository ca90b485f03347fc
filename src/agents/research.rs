//! Research Aggregator
//!
//! Plans queries for a topic, runs each one against the search backend and
//! summarizes the outcome. Individual failures (planning or search) are
//! absorbed here so a chat turn always gets a [`ResearchResult`].

use super::planning::{AIQueryPlanner, HeuristicQueryPlanner, QueryPlan, SearchQuery};
use crate::search::{SearchOptions, SearchResponse, SharedSearch};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

/// Results for one planned query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySearchResult {
    pub query: SearchQuery,
    pub results: SearchResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchSummary {
    pub total_results: usize,
    /// Distinct hostnames across all result URLs
    pub total_sources: usize,
    pub search_time: f64,
}

/// Where the executed plan came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PlanSource {
    Ai,
    Heuristic { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchResult {
    pub topic: String,
    pub query_plan: QueryPlan,
    pub search_results: Vec<QuerySearchResult>,
    pub summary: ResearchSummary,
    pub plan_source: PlanSource,
}

impl ResearchResult {
    /// Reason the heuristic planner was used, if it was
    pub fn fallback_reason(&self) -> Option<&str> {
        match &self.plan_source {
            PlanSource::Ai => None,
            PlanSource::Heuristic { reason } => Some(reason),
        }
    }
}

/// Per-request research pipeline
pub struct ResearchAggregator {
    planner: AIQueryPlanner,
    fallback: HeuristicQueryPlanner,
    search: SharedSearch,
    options: SearchOptions,
    concurrency: usize,
}

impl ResearchAggregator {
    pub fn new(planner: AIQueryPlanner, search: SharedSearch) -> Self {
        Self {
            planner,
            fallback: HeuristicQueryPlanner::new(),
            search,
            options: SearchOptions::default(),
            concurrency: 1,
        }
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    /// Values above 1 run that many searches at once; output order is unchanged
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_fallback(mut self, fallback: HeuristicQueryPlanner) -> Self {
        self.fallback = fallback;
        self
    }

    pub async fn comprehensive_search(&self, topic: &str, max_queries: usize, model_id: &str) -> ResearchResult {
        let (query_plan, plan_source) = match self.planner.generate_plan(topic, max_queries, model_id).await {
            Ok(plan) => (plan, PlanSource::Ai),
            Err(e) => {
                warn!(error = %e, model = %model_id, "AI query planning failed, using heuristic plan");
                let plan = self.fallback.generate_plan(topic, max_queries);
                (plan, PlanSource::Heuristic { reason: e.to_string() })
            }
        };

        info!(
            topic = %topic,
            query_count = query_plan.queries.len(),
            concurrency = self.concurrency,
            "Executing search plan"
        );

        let search_results: Vec<QuerySearchResult> = if self.concurrency > 1 {
            stream::iter(query_plan.queries.iter().cloned())
                .map(|query| self.run_query(query))
                .buffered(self.concurrency)
                .collect::<Vec<_>>()
                .await
        } else {
            let mut results = Vec::with_capacity(query_plan.queries.len());
            for query in query_plan.queries.iter().cloned() {
                results.push(self.run_query(query).await);
            }
            results
        };

        let summary = summarize(&search_results);
        info!(
            total_results = summary.total_results,
            total_sources = summary.total_sources,
            "Research complete"
        );

        ResearchResult {
            topic: topic.to_string(),
            query_plan,
            search_results,
            summary,
            plan_source,
        }
    }

    async fn run_query(&self, query: SearchQuery) -> QuerySearchResult {
        match self.search.search(&query.query, &self.options).await {
            Ok(results) => QuerySearchResult {
                query,
                results,
                error: None,
            },
            Err(e) => {
                warn!(query = %query.query, error = %e, "Search query failed");
                QuerySearchResult {
                    results: SearchResponse::empty(query.query.clone()),
                    query,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

fn summarize(search_results: &[QuerySearchResult]) -> ResearchSummary {
    let mut hosts = HashSet::new();
    let mut summary = ResearchSummary::default();

    for entry in search_results {
        summary.total_results += entry.results.results.len();
        summary.search_time += entry.results.search_time;
        for item in &entry.results.results {
            if let Some(host) = url::Url::parse(&item.url).ok().and_then(|u| u.host_str().map(str::to_string)) {
                hosts.insert(host);
            }
        }
    }

    summary.total_sources = hosts.len();
    summary
}

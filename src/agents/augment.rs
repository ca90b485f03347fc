// Prompt augmentation with research context

use super::research::ResearchResult;
use crate::types::{LLMMessage, Role};
use std::fmt::Write;

/// First line of every context block
pub const CONTEXT_MARKER: &str = "[Web search context]";

const RESULTS_PER_QUERY: usize = 3;

pub struct PromptAugmenter;

impl PromptAugmenter {
    /// Render research into the text that replaces the user's turn.
    ///
    /// Output depends only on the inputs, so the same research always
    /// produces the same block.
    pub fn format(research: &ResearchResult, original_topic: &str) -> String {
        if research.summary.total_results == 0 {
            return Self::format_empty(research, original_topic);
        }

        let mut out = String::new();
        let _ = writeln!(out, "{CONTEXT_MARKER}");
        let _ = writeln!(out, "Search strategy: {}", research.query_plan.rationale);
        let _ = writeln!(out);

        let _ = writeln!(out, "Planned queries:");
        for (i, query) in research.query_plan.queries.iter().enumerate() {
            let _ = writeln!(out, "{}. {} ({})", i + 1, query.query, query.rationale);
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "Results:");
        for (q, entry) in research.search_results.iter().enumerate() {
            let _ = writeln!(out, "Query {}: {}", q + 1, entry.query.query);
            if entry.results.results.is_empty() {
                let _ = writeln!(out, "  (no results)");
                continue;
            }
            for (r, item) in entry.results.results.iter().take(RESULTS_PER_QUERY).enumerate() {
                let _ = writeln!(out, "{}.{}. {}", q + 1, r + 1, item.title);
                if !item.description.is_empty() {
                    let _ = writeln!(out, "   {}", item.description);
                }
                let _ = writeln!(out, "   Source: {}", item.url);
            }
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "Summary:");
        let _ = writeln!(out, "- Total results: {}", research.summary.total_results);
        let _ = writeln!(out, "- Unique sources: {}", research.summary.total_sources);
        let _ = writeln!(out, "- Queries executed: {}", research.search_results.len());
        let _ = writeln!(out);

        let _ = write!(
            out,
            "Using the search context above, answer the user's original question: \"{original_topic}\". \
             Synthesize across sources and cite the source URLs you rely on."
        );
        out
    }

    fn format_empty(research: &ResearchResult, original_topic: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{CONTEXT_MARKER}");
        let _ = writeln!(
            out,
            "No web results were found for {} planned queries.",
            research.query_plan.queries.len()
        );
        let _ = writeln!(out);
        let _ = write!(
            out,
            "Answer the user's original question from general knowledge: \"{original_topic}\". \
             Mention that live search returned nothing, so the answer may not reflect the latest information."
        );
        out
    }

    /// Replace the latest user turn with `block`, or append one when there is none
    pub fn augment_messages(mut messages: Vec<LLMMessage>, block: String) -> Vec<LLMMessage> {
        match messages.iter_mut().rev().find(|m| m.role == Role::User) {
            Some(message) => message.content = block,
            None => messages.push(LLMMessage::user(block)),
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::planning::{QueryPlan, SearchQuery};
    use crate::agents::research::{PlanSource, QuerySearchResult, ResearchSummary};
    use crate::search::{SearchResponse, SearchResultItem};

    fn item(n: u32, url: &str) -> SearchResultItem {
        SearchResultItem {
            title: format!("Title {n}"),
            description: format!("Description {n}"),
            url: url.to_string(),
            source: "web".to_string(),
            position: n,
            result_type: "text".to_string(),
            metadata: Default::default(),
        }
    }

    fn research() -> ResearchResult {
        let first = SearchQuery::new("rust 2026", "recent");
        let second = SearchQuery::new("rust news", "news");
        ResearchResult {
            topic: "rust".to_string(),
            query_plan: QueryPlan {
                rationale: "Cover recent changes".to_string(),
                queries: vec![first.clone(), second.clone()],
            },
            search_results: vec![
                QuerySearchResult {
                    query: first,
                    results: SearchResponse {
                        results: (1..=5).map(|n| item(n, &format!("https://a.com/{n}"))).collect(),
                        total_results: 5,
                        search_time: 0.2,
                        query: "rust 2026".to_string(),
                    },
                    error: None,
                },
                QuerySearchResult {
                    query: second.clone(),
                    results: SearchResponse::empty(second.query),
                    error: Some("HTTP 500".to_string()),
                },
            ],
            summary: ResearchSummary {
                total_results: 5,
                total_sources: 1,
                search_time: 0.2,
            },
            plan_source: PlanSource::Ai,
        }
    }

    #[test]
    fn test_format_layout() {
        let block = PromptAugmenter::format(&research(), "what's new in rust?");

        assert!(block.starts_with(CONTEXT_MARKER));
        assert!(block.contains("Search strategy: Cover recent changes"));
        assert!(block.contains("1. rust 2026 (recent)"));
        assert!(block.contains("2. rust news (news)"));
        assert!(block.contains("1.3. Title 3"));
        assert!(!block.contains("1.4."));
        assert!(block.contains("Source: https://a.com/1"));
        assert!(block.contains("- Unique sources: 1"));
        assert!(block.contains("- Queries executed: 2"));
        assert!(block.contains("\"what's new in rust?\""));
    }

    #[test]
    fn test_format_is_deterministic() {
        let research = research();
        assert_eq!(
            PromptAugmenter::format(&research, "rust"),
            PromptAugmenter::format(&research, "rust")
        );
    }

    #[test]
    fn test_no_results_variant() {
        let mut research = research();
        research.search_results.truncate(1);
        research.search_results[0].results = SearchResponse::empty("rust 2026");
        research.summary = ResearchSummary::default();

        let block = PromptAugmenter::format(&research, "rust");
        assert!(block.starts_with(CONTEXT_MARKER));
        assert!(block.contains("No web results were found"));
        assert!(block.contains("general knowledge"));
        assert!(!block.contains("Summary:"));
    }

    #[test]
    fn test_augment_replaces_latest_user_turn() {
        let messages = vec![
            LLMMessage::system("be helpful"),
            LLMMessage::user("first"),
            LLMMessage::assistant("answer"),
            LLMMessage::user("second"),
        ];

        let augmented = PromptAugmenter::augment_messages(messages, "context".to_string());
        assert_eq!(augmented.len(), 4);
        assert_eq!(augmented[1].content, "first");
        assert_eq!(augmented[3], LLMMessage::user("context"));

        let appended = PromptAugmenter::augment_messages(vec![LLMMessage::system("s")], "context".to_string());
        assert_eq!(appended.last(), Some(&LLMMessage::user("context")));
    }
}

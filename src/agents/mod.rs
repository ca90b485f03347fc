//! Research Agents
//!
//! The web search augmentation pipeline behind every chat turn:
//!
//! ```text
//! User topic
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Planning   │  → AI plan, heuristic plan on failure
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Research   │  → One search per planned query
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Augment    │  → Context block spliced into the prompt
//! └─────────────┘
//! ```

pub mod augment;
pub mod plan_parser;
pub mod planning;
pub mod research;

pub use augment::{PromptAugmenter, CONTEXT_MARKER};
pub use plan_parser::{ParseError, QueryPlanParser};
pub use planning::{
    AIQueryPlanner, HeuristicQueryPlanner, PlanningError, QueryPlan, SearchQuery, DEFAULT_MAX_QUERIES,
    UNSUPPORTED_PLANNING_MODEL,
};
pub use research::{PlanSource, QuerySearchResult, ResearchAggregator, ResearchResult, ResearchSummary};

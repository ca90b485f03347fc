//! Search Module
//!
//! Web search used to ground chat answers. One HTTP client talks to the
//! configured search API; the [`WebSearch`] trait lets the research pipeline
//! run against any backend.

pub mod client;

pub use client::{
    normalize_response, SearchClient, SearchError, SearchOptions, SearchResponse, SearchResultItem,
    SharedSearch, WebSearch,
};

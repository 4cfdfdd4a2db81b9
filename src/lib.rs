//! Car recommendations from a tabular dataset and a free-text requirement.
//!
//! The pipeline normalizes the dataset, applies structured filters, asks a
//! text-completion service for matching car names and resolves those names
//! back onto concrete, diverse dataset rows.

pub mod analyzer;
pub mod client;
pub mod config;
pub mod filter;
pub mod model;
pub mod normalizer;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod storage;
pub mod utils;

pub use filter::FilterConfig;
pub use model::{CompletionError, Dataset, LoadError, MatchTier, RecommendationSet};
pub use normalizer::normalize;
pub use pipeline::{filter, load_dataset, Recommender};
pub use resolver::resolve_candidates;

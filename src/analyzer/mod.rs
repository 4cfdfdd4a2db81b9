// Analyzer module: statistics used by the normalizer and dataset summaries.

pub mod stats;
pub mod insights;

// Re-export the summaries for ease of use.
pub use insights::{DatasetInsights, FilterOptions};

// Caller-facing API: load, filter, recommend
use crate::client::{CompletionAdapter, CompletionService};
use crate::filter::{filter_data, FilterConfig};
use crate::model::{CompletionError, Dataset, LoadError, RecommendationSet};
use crate::normalizer::normalize;
use crate::parser::load_data;
use crate::resolver::resolve_candidates;
use std::path::Path;
use tracing::info;

/// Reads and normalizes a delimited-text dataset.
pub fn load_dataset(path: &Path) -> Result<Dataset, LoadError> {
    normalize(load_data(path)?)
}

pub fn filter(dataset: &Dataset, config: &FilterConfig) -> Dataset {
    filter_data(dataset, config)
}

/// Turns a free-text requirement into a diverse set of dataset rows.
pub struct Recommender<S> {
    adapter: CompletionAdapter<S>,
}

impl<S: CompletionService> Recommender<S> {
    pub fn new(adapter: CompletionAdapter<S>) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &CompletionAdapter<S> {
        &self.adapter
    }

    pub async fn recommend(
        &self,
        requirements: &str,
        dataset: &Dataset,
        top_n: usize,
    ) -> Result<RecommendationSet, CompletionError> {
        if top_n == 0 || dataset.is_empty() {
            info!("Nothing to recommend from {} rows (top_n = {})", dataset.len(), top_n);
            return Ok(RecommendationSet::empty(dataset.schema().clone()));
        }
        let candidates = self.adapter.candidates(requirements, dataset, top_n).await?;
        let set = resolve_candidates(&candidates, dataset, top_n);
        info!(
            "Recommendation set: {} rows, fallback = {}, tiers = {:?}",
            set.len(),
            set.is_fallback(),
            set.tier_counts()
        );
        Ok(set)
    }
}

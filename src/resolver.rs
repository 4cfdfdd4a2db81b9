// Maps candidate names from the completion service back onto dataset rows.
use crate::model::{Dataset, IdentityKey, Match, MatchTier, Record, RecommendationSet, Row};
use crate::utils::contains_ignore_case;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, info};

/// Resolves candidates against `dataset`, keeping at most one row per
/// `(make, model)` and at most `top_n` rows overall. Falls back to the
/// cheapest (or first) rows when nothing resolves.
pub fn resolve_candidates(candidates: &[String], dataset: &Dataset, top_n: usize) -> RecommendationSet {
    let mut resolution = Resolution::new(dataset);
    for candidate in candidates {
        resolution.resolve(candidate);
    }

    let mut matches: Vec<Match> = Vec::with_capacity(resolution.committed.len());
    for m in resolution.committed {
        if !matches.iter().any(|seen| seen.row == m.row) {
            matches.push(m);
        }
    }
    matches.truncate(top_n);

    if matches.is_empty() {
        info!("No matches found, returning top cars as fallback");
        return fallback(dataset, top_n);
    }

    info!("Returning {} diverse recommendations", matches.len());
    RecommendationSet::resolved(dataset.schema().clone(), matches)
}

/// Cheapest rows when a price column exists, otherwise the first rows.
pub fn fallback(dataset: &Dataset, top_n: usize) -> RecommendationSet {
    let mut rows: Vec<Row> = dataset.rows().to_vec();
    if dataset.schema().known().price.is_some() {
        rows.sort_by(|a, b| {
            let pa = Record::new(dataset.schema(), a).price();
            let pb = Record::new(dataset.schema(), b).price();
            compare_price(pa, pb)
        });
    }
    rows.truncate(top_n);
    RecommendationSet::fallback(dataset.schema().clone(), rows)
}

/// Ascending price; rows without a price sort last.
fn compare_price(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Ranks two rows of the same candidate: newer year first, then higher
/// combined MPG. `Greater` means `a` is the better pick.
pub fn best_row_ordering(a: &Record<'_>, b: &Record<'_>) -> Ordering {
    let by_year = a.year().zip(b.year()).map_or(Ordering::Equal, |(x, y)| x.total_cmp(&y));
    by_year.then_with(|| {
        a.combined_mpg()
            .zip(b.combined_mpg())
            .map_or(Ordering::Equal, |(x, y)| x.total_cmp(&y))
    })
}

/// Best row under [`best_row_ordering`]; the first one encountered wins ties.
fn best_row<'a, I>(rows: I) -> Option<Record<'a>>
where
    I: IntoIterator<Item = Record<'a>>,
{
    rows.into_iter().fold(None, |best, candidate| match best {
        Some(current) if best_row_ordering(&candidate, &current) != Ordering::Greater => Some(current),
        _ => Some(candidate),
    })
}

/// State of one resolution pass.
struct Resolution<'a> {
    dataset: &'a Dataset,
    seen: HashSet<IdentityKey>,
    committed: Vec<Match>,
}

impl<'a> Resolution<'a> {
    fn new(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            seen: HashSet::new(),
            committed: Vec::new(),
        }
    }

    fn resolve(&mut self, candidate: &str) {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            debug!("Skipping empty candidate");
            return;
        }
        debug!("Looking for matches for car: {}", candidate);

        if let Some(tier) = self.try_combined(candidate) {
            debug!("'{}' resolved by {:?} tier", candidate, tier);
        } else if let Some(tier) = self.try_model(candidate) {
            debug!("'{}' resolved by {:?} tier", candidate, tier);
        } else if let Some(tier) = self.try_make(candidate) {
            debug!("'{}' resolved by {:?} tier", candidate, tier);
        } else {
            debug!("No matches found for {}", candidate);
        }
    }

    /// Records `record` under its identity key unless the key is taken.
    fn commit(&mut self, record: Record<'_>, tier: MatchTier) {
        let key = record.identity_key();
        if self.seen.insert(key.clone()) {
            self.committed.push(Match {
                row: Row::from(record.values()),
                tier,
            });
        } else {
            debug!("Skipping duplicate model {}", key);
        }
    }

    fn try_combined(&mut self, candidate: &str) -> Option<MatchTier> {
        let known = self.dataset.schema().known();
        if known.make.is_none() || known.model.is_none() {
            return None;
        }
        let (make_part, model_part) = candidate.split_once(' ')?;
        let model_part = model_part.trim();

        let dataset = self.dataset;
        let best = best_row(dataset.records().filter(|r| {
            r.make_display().is_some_and(|m| contains_ignore_case(&m, make_part))
                && r.model_display().is_some_and(|m| contains_ignore_case(&m, model_part))
        }))?;
        self.commit(best, MatchTier::Combined);
        Some(MatchTier::Combined)
    }

    fn try_model(&mut self, candidate: &str) -> Option<MatchTier> {
        self.dataset.schema().known().model?;
        let dataset = self.dataset;
        let best = best_row(
            dataset
                .records()
                .filter(|r| r.model_display().is_some_and(|m| contains_ignore_case(&m, candidate))),
        )?;
        self.commit(best, MatchTier::ModelOnly);
        Some(MatchTier::ModelOnly)
    }

    fn try_make(&mut self, candidate: &str) -> Option<MatchTier> {
        self.dataset.schema().known().make?;
        let dataset = self.dataset;
        let matches: Vec<Record<'a>> = dataset
            .records()
            .filter(|r| r.make_display().is_some_and(|m| contains_ignore_case(&m, candidate)))
            .collect();
        let first = *matches.first()?;

        if self.dataset.schema().known().model.is_none() {
            self.committed.push(Match {
                row: Row::from(first.values()),
                tier: MatchTier::MakeOnly,
            });
            return Some(MatchTier::MakeOnly);
        }

        let mut models: Vec<String> = Vec::new();
        for record in &matches {
            let model = record.model_display().unwrap_or_default();
            if !models.contains(&model) {
                models.push(model);
            }
        }

        for model in models {
            let group = matches
                .iter()
                .copied()
                .filter(|r| r.model_display().unwrap_or_default() == model);
            let Some(best) = best_row(group) else {
                continue;
            };
            if !self.seen.contains(&best.identity_key()) {
                self.commit(best, MatchTier::MakeOnly);
                break;
            }
        }
        Some(MatchTier::MakeOnly)
    }
}

use crate::analyzer::stats::value_counts;
use crate::model::Dataset;
use std::collections::{BTreeMap, BTreeSet};

const TOP_BODY_TYPES: usize = 5;

/// Summary figures shown next to the recommendations.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInsights {
    pub total_cars: usize,
    /// Number of distinct manufacturers, if the dataset has a make column.
    pub manufacturers: Option<usize>,
    /// Most common vehicle size classes with their counts.
    pub top_body_types: Vec<(String, usize)>,
    /// Row counts per model year, ascending by year.
    pub cars_by_year: BTreeMap<i64, usize>,
}

impl DatasetInsights {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let known = dataset.schema().known();

        let manufacturers = known.make.map(|_| {
            dataset
                .records()
                .filter_map(|r| r.make_display())
                .collect::<BTreeSet<_>>()
                .len()
        });

        let top_body_types = value_counts(dataset.records().filter_map(|r| r.size_class()))
            .into_iter()
            .take(TOP_BODY_TYPES)
            .map(|(class, count)| (class.to_string(), count))
            .collect();

        let mut cars_by_year = BTreeMap::new();
        for year in dataset.records().filter_map(|r| r.year()) {
            *cars_by_year.entry(year.round() as i64).or_insert(0) += 1;
        }

        Self {
            total_cars: dataset.len(),
            manufacturers,
            top_body_types,
            cars_by_year,
        }
    }
}

/// Values a caller can offer in its filter controls.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOptions {
    pub year_bounds: Option<(i32, i32)>,
    pub makes: Vec<String>,
    pub body_types: Vec<String>,
}

impl FilterOptions {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let years: Vec<f64> = dataset.records().filter_map(|r| r.year()).collect();
        let year_bounds = years
            .iter()
            .copied()
            .reduce(f64::min)
            .zip(years.iter().copied().reduce(f64::max))
            .map(|(min, max)| (min.floor() as i32, max.ceil() as i32));

        let makes: BTreeSet<String> = dataset.records().filter_map(|r| r.make_display()).collect();
        let body_types: BTreeSet<String> = dataset
            .records()
            .filter_map(|r| r.size_class().map(str::to_string))
            .collect();

        Self {
            year_bounds,
            makes: makes.into_iter().collect(),
            body_types: body_types.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnKind, Row, Schema, Value};
    use std::sync::Arc;

    fn dataset() -> Dataset {
        let schema = Arc::new(Schema::new(
            vec!["make".into(), "year".into(), "vehicle size class".into()],
            vec![ColumnKind::Categorical, ColumnKind::Numeric, ColumnKind::Categorical],
        ));
        let rows = [
            ("Toyota", 2019.0, "Small SUV"),
            ("Toyota", 2020.0, "Midsize Cars"),
            ("Honda", 2020.0, "Small SUV"),
            ("Kia", 2017.0, "Compact Cars"),
        ]
        .into_iter()
        .map(|(make, year, class)| {
            Row::from(vec![
                Value::Text(make.into()),
                Value::Number(year),
                Value::Text(class.into()),
            ])
        })
        .collect();
        Dataset::new(schema, rows)
    }

    #[test]
    fn summarizes_dataset() {
        let insights = DatasetInsights::from_dataset(&dataset());
        assert_eq!(insights.total_cars, 4);
        assert_eq!(insights.manufacturers, Some(3));
        assert_eq!(insights.top_body_types[0], ("Small SUV".to_string(), 2));
        assert_eq!(insights.top_body_types.len(), 3);
        assert_eq!(
            insights.cars_by_year.into_iter().collect::<Vec<_>>(),
            vec![(2017, 1), (2019, 1), (2020, 2)]
        );
    }

    #[test]
    fn filter_options_are_sorted() {
        let options = FilterOptions::from_dataset(&dataset());
        assert_eq!(options.year_bounds, Some((2017, 2020)));
        assert_eq!(options.makes, vec!["Honda", "Kia", "Toyota"]);
        assert_eq!(options.body_types, vec!["Compact Cars", "Midsize Cars", "Small SUV"]);
    }

    #[test]
    fn empty_dataset_has_no_year_bounds() {
        let ds = dataset();
        let empty = ds.with_rows(Vec::new());
        assert_eq!(FilterOptions::from_dataset(&empty).year_bounds, None);
        assert_eq!(DatasetInsights::from_dataset(&empty).total_cars, 0);
    }
}

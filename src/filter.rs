use crate::model::{Dataset, Record, Row};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::info;

/// Structured constraints applied before asking for recommendations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Inclusive `(min, max)` model years.
    pub year_range: Option<(i32, i32)>,
    /// Allowed manufacturers; empty means any.
    pub makes: BTreeSet<String>,
    /// Allowed vehicle size classes; empty means any.
    pub body_types: BTreeSet<String>,
}

impl FilterConfig {
    pub fn is_empty(&self) -> bool {
        self.year_range.is_none() && self.makes.is_empty() && self.body_types.is_empty()
    }
}

/// Returns a new view holding the rows that satisfy every clause.
/// Clauses whose column is absent are skipped.
pub fn filter_data(dataset: &Dataset, config: &FilterConfig) -> Dataset {
    let known = *dataset.schema().known();
    let year_clause = config.year_range.filter(|_| known.year.is_some());
    let make_clause = (!config.makes.is_empty() && known.make.is_some()).then_some(&config.makes);
    let body_clause =
        (!config.body_types.is_empty() && known.size_class.is_some()).then_some(&config.body_types);

    let rows: Vec<Row> = dataset
        .rows()
        .iter()
        .filter(|row| {
            let record = Record::new(dataset.schema(), row);
            year_clause.is_none_or(|(min, max)| {
                record
                    .year()
                    .is_some_and(|y| y >= f64::from(min) && y <= f64::from(max))
            }) && make_clause.is_none_or(|makes| in_set(record.make_display(), makes))
                && body_clause.is_none_or(|types| in_set(record.size_class().map(str::to_string), types))
        })
        .cloned()
        .collect();

    info!("Filter kept {} of {} rows", rows.len(), dataset.len());
    dataset.with_rows(rows)
}

fn in_set(value: Option<String>, set: &BTreeSet<String>) -> bool {
    value.is_some_and(|v| set.contains(&v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnKind, Schema, Value};
    use std::sync::Arc;

    fn dataset() -> Dataset {
        let schema = Arc::new(Schema::new(
            vec!["make".into(), "model".into(), "year".into(), "vehicle size class".into()],
            vec![
                ColumnKind::Categorical,
                ColumnKind::Categorical,
                ColumnKind::Numeric,
                ColumnKind::Categorical,
            ],
        ));
        let rows = [
            ("Toyota", "Camry", 2018.0, "Midsize Cars"),
            ("Toyota", "RAV4", 2021.0, "Small SUV"),
            ("Honda", "Civic", 2020.0, "Compact Cars"),
            ("Ford", "F150", 2015.0, "Pickup"),
        ]
        .into_iter()
        .map(|(make, model, year, class)| {
            Row::from(vec![
                Value::Text(make.into()),
                Value::Text(model.into()),
                Value::Number(year),
                Value::Text(class.into()),
            ])
        })
        .collect();
        Dataset::new(schema, rows)
    }

    fn models(ds: &Dataset) -> Vec<&str> {
        ds.records().filter_map(|r| r.model()).collect()
    }

    #[test]
    fn empty_config_keeps_everything() {
        let ds = dataset();
        let out = filter_data(&ds, &FilterConfig::default());
        assert_eq!(out, ds);
    }

    #[test]
    fn year_range_is_inclusive() {
        let ds = dataset();
        let config = FilterConfig {
            year_range: Some((2018, 2020)),
            ..Default::default()
        };
        assert_eq!(models(&filter_data(&ds, &config)), vec!["Camry", "Civic"]);
    }

    #[test]
    fn combines_make_and_body_clauses() {
        let ds = dataset();
        let config = FilterConfig {
            makes: ["Toyota".to_string()].into(),
            body_types: ["Small SUV".to_string(), "Compact Cars".to_string()].into(),
            ..Default::default()
        };
        assert_eq!(models(&filter_data(&ds, &config)), vec!["RAV4"]);
    }

    #[test]
    fn does_not_mutate_input() {
        let ds = dataset();
        let snapshot = ds.clone();
        let config = FilterConfig {
            makes: ["Ford".to_string()].into(),
            ..Default::default()
        };
        let out = filter_data(&ds, &config);
        assert_eq!(out.len(), 1);
        assert_eq!(ds, snapshot);
        assert_eq!(ds.len(), 4);
    }

    #[test]
    fn skips_clauses_for_absent_columns() {
        let schema = Arc::new(Schema::new(vec!["make".into()], vec![ColumnKind::Categorical]));
        let ds = Dataset::new(schema, vec![Row::from(vec![Value::Text("Kia".into())])]);
        let config = FilterConfig {
            year_range: Some((2000, 2001)),
            body_types: ["Van".to_string()].into(),
            ..Default::default()
        };
        assert_eq!(filter_data(&ds, &config).len(), 1);
    }

    #[test]
    fn deserializes_from_json() {
        let config: FilterConfig =
            serde_json::from_str(r#"{"year_range": [2010, 2020], "makes": ["Kia"]}"#).unwrap();
        assert_eq!(config.year_range, Some((2010, 2020)));
        assert!(config.makes.contains("Kia"));
        assert!(config.body_types.is_empty());
        assert!(!config.is_empty());
    }
}

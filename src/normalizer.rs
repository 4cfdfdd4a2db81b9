use crate::analyzer::stats::{iqr_bounds, median, mode};
use crate::model::{ColumnKind, Dataset, LoadError, RawTable, Row, Schema, Value};
use crate::utils::{has_alphabetic, is_missing_token};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

const MAX_MISSING_FRACTION: f64 = 0.90;
const IQR_THRESHOLD: f64 = 1.5;

/// Cleans a raw table into a canonical dataset.
///
/// Column names are lower-cased and trimmed, garbage and mostly-empty columns
/// are dropped, numeric columns are coerced, misaligned rows removed, missing
/// cells imputed (median / mode), text trimmed and IQR outliers removed.
pub fn normalize(raw: RawTable) -> Result<Dataset, LoadError> {
    let RawTable { headers, rows } = raw;
    if headers.is_empty() {
        return Err(LoadError::NoColumns);
    }
    let total_rows = rows.len();

    let names: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    let kept = select_columns(&names, &rows);
    if kept.is_empty() {
        return Err(LoadError::NoColumns);
    }

    let names: Vec<String> = kept.iter().map(|&i| names[i].clone()).collect();
    let mut cells: Vec<Vec<String>> = rows
        .into_iter()
        .map(|row| {
            kept.iter()
                .map(|&i| row.get(i).cloned().unwrap_or_default())
                .collect()
        })
        .collect();

    let mut kinds: Vec<ColumnKind> = (0..names.len())
        .map(|col| infer_kind(cells.iter().map(|row| row[col].as_str())))
        .collect();
    debug!(
        "Numeric columns: {:?}",
        names
            .iter()
            .zip(&kinds)
            .filter(|(_, k)| **k == ColumnKind::Numeric)
            .map(|(n, _)| n.as_str())
            .collect::<Vec<_>>()
    );

    let before = cells.len();
    cells.retain(|row| !is_misaligned(row, &kinds));
    if cells.len() < before {
        info!("Dropped {} misaligned rows", before - cells.len());
    }

    let mut typed = to_values(cells, &kinds);
    impute(&mut typed, &kinds);
    trim_text(&mut typed);

    // Dropping rows can leave a categorical column holding only numbers, so
    // inference and the fence alternate until both are stable.
    let before = typed.len();
    loop {
        typed = remove_outliers(typed, &kinds);
        if !promote_numeric_columns(&mut typed, &mut kinds) {
            break;
        }
    }
    if typed.len() < before {
        info!("Dropped {} outlier rows", before - typed.len());
    }

    info!(
        "Normalized dataset: {} of {} rows, {} columns",
        typed.len(),
        total_rows,
        names.len()
    );

    let schema = Arc::new(Schema::new(names, kinds));
    let rows: Vec<Row> = typed.into_iter().map(Row::from).collect();
    Ok(Dataset::new(schema, rows))
}

/// Indices of the columns that survive name and sparsity checks.
fn select_columns(names: &[String], rows: &[Vec<String>]) -> Vec<usize> {
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    for (i, name) in names.iter().enumerate() {
        if name.contains("unnamed") {
            debug!("Dropping column '{}': unnamed", name);
            continue;
        }
        if !seen.insert(name.as_str()) {
            debug!("Dropping column '{}': duplicate name", name);
            continue;
        }
        let fraction = missing_fraction(rows, i);
        if fraction > MAX_MISSING_FRACTION {
            debug!("Dropping column '{}': {:.0}% missing", name, fraction * 100.0);
            continue;
        }
        kept.push(i);
    }
    kept
}

fn missing_fraction(rows: &[Vec<String>], col: usize) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let missing = rows
        .iter()
        .filter(|row| row.get(col).is_none_or(|cell| is_missing_token(cell)))
        .count();
    missing as f64 / rows.len() as f64
}

fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok()
}

/// A column is numeric when it has values and every one of them parses.
fn infer_kind<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnKind {
    let mut any = false;
    for cell in cells.filter(|c| !is_missing_token(c)) {
        if parse_number(cell).is_none() {
            return ColumnKind::Categorical;
        }
        any = true;
    }
    if any {
        ColumnKind::Numeric
    } else {
        ColumnKind::Categorical
    }
}

/// Letters in a numeric cell mean the row's fields were shifted.
fn is_misaligned(row: &[String], kinds: &[ColumnKind]) -> bool {
    row.iter().zip(kinds).any(|(cell, kind)| {
        *kind == ColumnKind::Numeric && !is_missing_token(cell) && has_alphabetic(cell)
    })
}

fn to_values(cells: Vec<Vec<String>>, kinds: &[ColumnKind]) -> Vec<Vec<Value>> {
    cells
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(kinds)
                .map(|(cell, kind)| {
                    if is_missing_token(&cell) {
                        return Value::Missing;
                    }
                    match kind {
                        ColumnKind::Numeric => {
                            parse_number(&cell).map_or(Value::Missing, Value::Number)
                        }
                        ColumnKind::Categorical => Value::Text(cell),
                    }
                })
                .collect()
        })
        .collect()
}

fn impute(rows: &mut [Vec<Value>], kinds: &[ColumnKind]) {
    for (col, kind) in kinds.iter().enumerate() {
        if !rows.iter().any(|row| row[col].is_missing()) {
            continue;
        }
        let fill = match kind {
            ColumnKind::Numeric => {
                let present: Vec<f64> = rows.iter().filter_map(|row| row[col].as_f64()).collect();
                median(&present).map(Value::Number)
            }
            ColumnKind::Categorical => {
                mode(rows.iter().filter_map(|row| row[col].as_str())).map(|m| Value::Text(m.to_string()))
            }
        };
        let Some(fill) = fill else {
            continue;
        };
        debug!("Imputing column {} with {}", col, fill);
        for row in rows.iter_mut() {
            if row[col].is_missing() {
                row[col] = fill.clone();
            }
        }
    }
}

fn trim_text(rows: &mut [Vec<Value>]) {
    for value in rows.iter_mut().flatten() {
        if let Value::Text(s) = value {
            let trimmed = s.trim();
            if trimmed.len() != s.len() {
                *s = trimmed.to_string();
            }
        }
    }
}

/// Re-infers the kind of every categorical column on the surviving rows.
/// Columns whose values now all parse become numeric; rows the misalignment
/// guard would reject are dropped. Returns whether any column changed kind.
fn promote_numeric_columns(rows: &mut Vec<Vec<Value>>, kinds: &mut [ColumnKind]) -> bool {
    let mut changed = false;
    for col in 0..kinds.len() {
        if kinds[col] != ColumnKind::Categorical
            || infer_kind(rows.iter().filter_map(|row| row[col].as_str())) != ColumnKind::Numeric
        {
            continue;
        }
        debug!("Column {} is numeric after row removal", col);
        kinds[col] = ColumnKind::Numeric;
        rows.retain(|row| row[col].as_str().is_none_or(|cell| !has_alphabetic(cell)));
        for row in rows.iter_mut() {
            let parsed = row[col].as_str().and_then(parse_number);
            if let Some(n) = parsed {
                row[col] = Value::Number(n);
            }
        }
        changed = true;
    }
    changed
}

/// Drops rows outside the IQR fence of any numeric column, repeating until
/// the fence no longer removes anything.
fn remove_outliers(mut rows: Vec<Vec<Value>>, kinds: &[ColumnKind]) -> Vec<Vec<Value>> {
    let numeric: Vec<usize> = kinds
        .iter()
        .enumerate()
        .filter(|(_, k)| **k == ColumnKind::Numeric)
        .map(|(i, _)| i)
        .collect();

    loop {
        let bounds: Vec<(usize, f64, f64)> = numeric
            .iter()
            .filter_map(|&col| {
                let values: Vec<f64> = rows.iter().filter_map(|row| row[col].as_f64()).collect();
                iqr_bounds(&values, IQR_THRESHOLD).map(|(lo, hi)| (col, lo, hi))
            })
            .collect();

        let before = rows.len();
        rows.retain(|row| {
            bounds.iter().all(|&(col, lo, hi)| {
                row[col].as_f64().is_none_or(|v| v >= lo && v <= hi)
            })
        });
        if rows.len() == before {
            return rows;
        }
        debug!("Outlier pass removed {} rows", before - rows.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    fn cars() -> RawTable {
        raw(
            &[" Make ", "MODEL", "Year", "Unnamed: 0", "Combined MPG for Fuel Type1", "Notes"],
            &[
                &["Toyota", " Camry ", "2019", "0", "30", ""],
                &["Toyota", "Camry", "2020", "1", "31", ""],
                &["Honda", "Accord", "2020", "2", "", ""],
                &["Honda", "Civic", "2018", "3", "33", ""],
                &["Ford", "", "2019", "4", "25", ""],
                &[" Ford ", "Focus", "2021", "5", "29", ""],
                &["Mazda", "3", "2020", "6", "30", ""],
                &["Mazda", "CX-5", "2019", "7", "28", ""],
                &["Kia", "Rio", "2019", "8", "32", ""],
                &["Kia", "Soul", "2020", "9", "27", ""],
            ],
        )
    }

    #[test]
    fn cleans_names_and_drops_garbage_columns() {
        let ds = normalize(cars()).unwrap();
        assert_eq!(
            ds.schema().names(),
            &["make", "model", "year", "combined mpg for fuel type1"]
        );
        assert!(ds.schema().names().iter().all(|n| !n.contains("unnamed")));
    }

    #[test]
    fn infers_column_kinds() {
        let ds = normalize(cars()).unwrap();
        assert_eq!(
            ds.schema().kinds(),
            &[
                ColumnKind::Categorical,
                ColumnKind::Categorical,
                ColumnKind::Numeric,
                ColumnKind::Numeric
            ]
        );
    }

    #[test]
    fn imputes_and_trims() {
        let ds = normalize(cars()).unwrap();
        for record in ds.records() {
            assert!(record.values().iter().all(|v| !v.is_missing()));
            for value in record.values() {
                if let Value::Text(s) = value {
                    assert_eq!(s, s.trim());
                }
            }
        }
        let accord = ds.records().find(|r| r.model() == Some("Accord")).unwrap();
        // median of 30,31,33,25,29,30,28,32,27
        assert_eq!(accord.combined_mpg(), Some(30.0));
        let ford_without_model = ds
            .records()
            .find(|r| r.make() == Some("Ford") && r.year() == Some(2019.0))
            .unwrap();
        // all models tie, so the smallest raw value " Camry " fills the gap
        assert_eq!(ford_without_model.model(), Some("Camry"));
    }

    #[test]
    fn drops_misaligned_rows() {
        let table = raw(
            &["make", "year"],
            &[&["Toyota", "2019"], &["Honda", "1e3"], &["Ford", "2020"]],
        );
        let ds = normalize(table).unwrap();
        assert_eq!(ds.len(), 2);
        assert!(ds.records().all(|r| r.make() != Some("Honda")));
    }

    #[test]
    fn non_numeric_column_stays_categorical() {
        let table = raw(&["make", "year"], &[&["Toyota", "2019"], &["Honda", "abc"]]);
        let ds = normalize(table).unwrap();
        assert_eq!(ds.schema().kinds()[1], ColumnKind::Categorical);
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn removes_outliers() {
        let table = raw(
            &["make", "price"],
            &[
                &["a", "10"],
                &["b", "11"],
                &["c", "12"],
                &["d", "13"],
                &["e", "1000"],
            ],
        );
        let ds = normalize(table).unwrap();
        assert_eq!(ds.len(), 4);
        assert!(ds.records().all(|r| r.price().unwrap() < 1000.0));
    }

    #[test]
    fn constant_column_keeps_only_the_constant() {
        let table = raw(
            &["make", "doors"],
            &[&["a", "4"], &["b", "4"], &["c", "4"], &["d", "4"], &["e", "2"]],
        );
        let ds = normalize(table).unwrap();
        assert_eq!(ds.len(), 4);
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize(cars()).unwrap();
        let twice = normalize(once.to_raw()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn column_left_numeric_by_outlier_removal_is_promoted() {
        let table = raw(
            &["make", "trim", "price"],
            &[
                &["a", "1", "10"],
                &["b", "2", "11"],
                &["c", "1", "12"],
                &["d", "2", "13"],
                &["e", "X", "1000"],
            ],
        );
        let once = normalize(table).unwrap();
        assert_eq!(
            once.schema().kinds(),
            &[ColumnKind::Categorical, ColumnKind::Numeric, ColumnKind::Numeric]
        );
        assert_eq!(once.len(), 4);
        assert!(once.records().all(|r| matches!(r.get("trim"), Some(Value::Number(_)))));
        let twice = normalize(once.to_raw()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn promoted_column_is_fenced_too() {
        let table = raw(
            &["make", "trim", "price"],
            &[
                &["a", "1", "10"],
                &["b", "1", "11"],
                &["c", "1", "12"],
                &["d", "2", "13"],
                &["e", "X", "1000"],
            ],
        );
        let once = normalize(table).unwrap();
        // "e" fails the price fence, then "d" fails the trim fence
        assert_eq!(once.len(), 3);
        let twice = normalize(once.to_raw()).unwrap();
        assert_eq!(twice.len(), 3);
        assert_eq!(once, twice);
    }

    #[test]
    fn keeps_column_at_exactly_ninety_percent_missing() {
        let mut rows: Vec<Vec<String>> = (0..10)
            .map(|i| vec![format!("m{i}"), String::new()])
            .collect();
        rows[0][1] = "blue".to_string();
        let table = RawTable {
            headers: vec!["make".into(), "color".into()],
            rows,
        };
        let ds = normalize(table).unwrap();
        assert_eq!(ds.schema().names(), &["make", "color"]);
        assert!(ds.records().all(|r| r.get("color") == Some(&Value::Text("blue".into()))));
    }

    #[test]
    fn empty_header_is_an_error() {
        assert!(matches!(normalize(RawTable::default()), Err(LoadError::NoColumns)));
    }

    #[test]
    fn header_only_table_yields_empty_dataset() {
        let ds = normalize(raw(&["make", "model"], &[])).unwrap();
        assert!(ds.is_empty());
        assert_eq!(ds.schema().len(), 2);
    }
}

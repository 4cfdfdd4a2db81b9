// Core structs: Value, Dataset, Record, Match, RecommendationSet and the error types
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub const MAKE: &str = "make";
pub const MODEL: &str = "model";
pub const YEAR: &str = "year";
pub const SIZE_CLASS: &str = "vehicle size class";
pub const COMBINED_MPG: &str = "combined mpg for fuel type1";
pub const PRICE: &str = "price";
pub const FUEL_TYPE: &str = "fuel type";
pub const TRANSMISSION: &str = "transmission";

/// Columns the recommender cannot work without.
pub const REQUIRED_COLUMNS: [&str; 5] = [MAKE, MODEL, YEAR, SIZE_CLASS, COMBINED_MPG];

/// A single cell of the dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::Missing => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// Positions of the well-known columns, resolved once per schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KnownColumns {
    pub make: Option<usize>,
    pub model: Option<usize>,
    pub year: Option<usize>,
    pub size_class: Option<usize>,
    pub combined_mpg: Option<usize>,
    pub price: Option<usize>,
    pub fuel_type: Option<usize>,
    pub transmission: Option<usize>,
}

impl KnownColumns {
    fn resolve(names: &[String]) -> Self {
        let find = |name: &str| names.iter().position(|n| n == name);
        Self {
            make: find(MAKE),
            model: find(MODEL),
            year: find(YEAR),
            size_class: find(SIZE_CLASS),
            combined_mpg: find(COMBINED_MPG),
            price: find(PRICE),
            fuel_type: find(FUEL_TYPE),
            transmission: find(TRANSMISSION),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    names: Vec<String>,
    kinds: Vec<ColumnKind>,
    known: KnownColumns,
}

impl Schema {
    pub fn new(names: Vec<String>, kinds: Vec<ColumnKind>) -> Self {
        debug_assert_eq!(names.len(), kinds.len());
        let known = KnownColumns::resolve(&names);
        Self { names, kinds, known }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn kinds(&self) -> &[ColumnKind] {
        &self.kinds
    }

    pub fn known(&self) -> &KnownColumns {
        &self.known
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A normalized row. Rows are shared between dataset views and never mutated.
pub type Row = Arc<[Value]>;

/// Ordered rows over a uniform schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    schema: Arc<Schema>,
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new(schema: Arc<Schema>, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn record(&self, index: usize) -> Option<Record<'_>> {
        self.rows.get(index).map(|row| Record::new(&self.schema, row))
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(|row| Record::new(&self.schema, row))
    }

    /// Builds a view over the same schema holding only `rows`.
    pub fn with_rows(&self, rows: Vec<Row>) -> Dataset {
        Dataset {
            schema: Arc::clone(&self.schema),
            rows,
        }
    }

    pub fn missing_required_columns(&self) -> Vec<&'static str> {
        REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|name| self.schema.index_of(name).is_none())
            .collect()
    }

    /// Renders the dataset back into raw text cells.
    pub fn to_raw(&self) -> RawTable {
        RawTable {
            headers: self.schema.names.clone(),
            rows: self
                .rows
                .iter()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        }
    }
}

/// Borrowed view of one row with named accessors for the well-known columns.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    schema: &'a Schema,
    values: &'a [Value],
}

impl<'a> Record<'a> {
    pub fn new(schema: &'a Schema, values: &'a [Value]) -> Self {
        Self { schema, values }
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.schema.index_of(column).and_then(|i| self.values.get(i))
    }

    fn text_at(&self, index: Option<usize>) -> Option<&'a str> {
        index.and_then(|i| self.values.get(i)).and_then(Value::as_str)
    }

    fn number_at(&self, index: Option<usize>) -> Option<f64> {
        index.and_then(|i| self.values.get(i)).and_then(Value::as_f64)
    }

    fn display_at(&self, index: Option<usize>) -> Option<String> {
        index
            .and_then(|i| self.values.get(i))
            .filter(|v| !v.is_missing())
            .map(|v| v.to_string())
    }

    pub fn make(&self) -> Option<&'a str> {
        self.text_at(self.schema.known.make)
    }

    pub fn model(&self) -> Option<&'a str> {
        self.text_at(self.schema.known.model)
    }

    pub fn year(&self) -> Option<f64> {
        self.number_at(self.schema.known.year)
    }

    pub fn size_class(&self) -> Option<&'a str> {
        self.text_at(self.schema.known.size_class)
    }

    pub fn combined_mpg(&self) -> Option<f64> {
        self.number_at(self.schema.known.combined_mpg)
    }

    pub fn price(&self) -> Option<f64> {
        self.number_at(self.schema.known.price)
    }

    /// Fuel type as displayed, whatever the column's kind.
    pub fn fuel_type(&self) -> Option<String> {
        self.display_at(self.schema.known.fuel_type)
    }

    pub fn transmission(&self) -> Option<String> {
        self.display_at(self.schema.known.transmission)
    }

    /// Make and model as displayed, whatever the columns' kinds.
    pub fn make_display(&self) -> Option<String> {
        self.display_at(self.schema.known.make)
    }

    pub fn model_display(&self) -> Option<String> {
        self.display_at(self.schema.known.model)
    }

    /// `(make, model)` identity used to keep results diverse.
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            make: self.make_display().unwrap_or_default(),
            model: self.model_display().unwrap_or_default(),
        }
    }
}

/// Header row plus raw cell text, as read from the source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub make: String,
    pub model: String,
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.make, self.model)
    }
}

/// Strategy that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchTier {
    Combined,
    ModelOnly,
    MakeOnly,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub row: Row,
    pub tier: MatchTier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationSet {
    schema: Arc<Schema>,
    matches: Vec<Match>,
    fallback: bool,
}

impl RecommendationSet {
    pub fn resolved(schema: Arc<Schema>, matches: Vec<Match>) -> Self {
        Self {
            schema,
            matches,
            fallback: false,
        }
    }

    pub fn fallback(schema: Arc<Schema>, rows: Vec<Row>) -> Self {
        let matches = rows
            .into_iter()
            .map(|row| Match {
                row,
                tier: MatchTier::Fallback,
            })
            .collect();
        Self {
            schema,
            matches,
            fallback: true,
        }
    }

    pub fn empty(schema: Arc<Schema>) -> Self {
        Self::resolved(schema, Vec::new())
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn records(&self) -> impl Iterator<Item = (Record<'_>, MatchTier)> {
        self.matches
            .iter()
            .map(|m| (Record::new(&self.schema, &m.row), m.tier))
    }

    /// Counts per tier, for logging.
    pub fn tier_counts(&self) -> HashMap<MatchTier, usize> {
        let mut counts = HashMap::new();
        for m in &self.matches {
            *counts.entry(m.tier).or_insert(0) += 1;
        }
        counts
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse dataset: {0}")]
    Csv(#[from] csv::Error),
    #[error("dataset has no columns")]
    NoColumns,
    #[error("line {line}: expected {expected} fields, found {found}")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("rate limited after {attempts} attempts: {message}")]
    RateLimited { attempts: u32, message: String },
    #[error("completion service error: {0}")]
    Service(String),
    #[error("API key not found in environment variable {0}")]
    MissingApiKey(String),
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

impl CompletionError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CompletionError::RateLimited { .. })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

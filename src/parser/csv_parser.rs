// Delimited-text parsing into a raw table
use crate::model::{LoadError, RawTable};
use csv::ReaderBuilder;
use std::fs;
use std::path::Path;
use tracing::info;

pub trait Parser {
    fn parse(&self, text: &str) -> Result<RawTable, LoadError>;
}

pub struct CsvParser {
    delimiter: u8,
}

impl CsvParser {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for CsvParser {
    fn parse(&self, text: &str) -> Result<RawTable, LoadError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(text.as_bytes());

        // Blank header cells get a placeholder name the normalizer drops.
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if h.trim().is_empty() {
                    format!("Unnamed: {}", i)
                } else {
                    h.to_string()
                }
            })
            .collect();
        if headers.is_empty() {
            return Err(LoadError::NoColumns);
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            if record.len() > headers.len() {
                return Err(LoadError::RaggedRow {
                    line: record.position().map(|p| p.line()).unwrap_or_default(),
                    expected: headers.len(),
                    found: record.len(),
                });
            }
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(RawTable { headers, rows })
    }
}

/// Reads and parses a comma-separated file.
pub fn load_data(path: &Path) -> Result<RawTable, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let table = CsvParser::new().parse(&text)?;
    info!(
        "Loaded dataset with shape: ({}, {})",
        table.rows.len(),
        table.headers.len()
    );
    Ok(table)
}

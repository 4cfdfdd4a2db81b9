// Source parsers: turn delimited text into a raw table.

pub mod csv_parser;

pub use csv_parser::{load_data, CsvParser, Parser};

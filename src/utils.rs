// Utility functions

/// Tokens read as a missing cell, after trimming.
const MISSING_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// True when a raw cell carries no value.
pub fn is_missing_token(cell: &str) -> bool {
    let trimmed = cell.trim();
    trimmed.is_empty() || MISSING_TOKENS.contains(&trimmed)
}

/// Case-insensitive substring test.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub fn has_alphabetic(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_alphabetic())
}

//! Record matching for substring search.

use crate::readers::Chunk;
use crate::record::{FieldValue, Record};

/// A normalized search request: query text, optional column, and the page window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub column: Option<String>,
    pub offset: usize,
    pub limit: usize,
}

impl SearchQuery {
    /// Build a query from a 1-based page number. Pages below 1 read as page 1.
    pub fn for_page(text: &str, column: Option<&str>, page: usize, limit: usize) -> Self {
        Self {
            text: text.trim().to_string(),
            column: column
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            offset: page.max(1).saturating_sub(1).saturating_mul(limit),
            limit,
        }
    }

    pub fn is_listing(&self) -> bool {
        self.text.is_empty()
    }
}

/// Evaluates a [`SearchQuery`] against records.
#[derive(Debug, Clone)]
pub struct RowMatcher {
    needle: String,
    ascii_needle: bool,
    column: Option<String>,
}

impl RowMatcher {
    pub fn new(query: &SearchQuery) -> Self {
        let needle = query.text.to_lowercase();
        Self {
            ascii_needle: needle.is_ascii(),
            needle,
            column: query.column.clone(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        if self.needle.is_empty() {
            return true;
        }

        match self.column.as_deref() {
            Some(column) if record.contains_field(column) => record
                .get(column)
                .render()
                .is_some_and(|text| self.contains(&text)),
            _ => record.iter().any(|(_, value)| match value {
                FieldValue::Text(text) => self.contains(text),
                // Numeric cells are not part of an all-fields search
                FieldValue::Number(_) | FieldValue::Absent => false,
            }),
        }
    }

    /// Keep the matching records of a chunk, in chunk order.
    pub fn filter_chunk(&self, chunk: Chunk) -> Vec<Record> {
        if self.needle.is_empty() {
            return chunk.records;
        }
        chunk
            .records
            .into_iter()
            .filter(|record| self.matches(record))
            .collect()
    }

    fn contains(&self, haystack: &str) -> bool {
        if self.ascii_needle && haystack.is_ascii() {
            return contains_ascii_ci(haystack.as_bytes(), self.needle.as_bytes());
        }
        haystack.to_lowercase().contains(&self.needle)
    }
}

// `needle` is already lowercase.
fn contains_ascii_ci(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack
        .windows(needle.len())
        .any(|window| window.iter().zip(needle).all(|(h, n)| h.to_ascii_lowercase() == *n))
}

//! Turning a stream of per-chunk matches into one result page.

use serde::Serialize;

use crate::matcher::{RowMatcher, SearchQuery};
use crate::planner::{ChunkSink, ScanControl};
use crate::readers::Chunk;
use crate::record::{FieldValue, Record};

/// Field added to paged results naming the dataset they came from.
pub const VISA_TYPE_FIELD: &str = "VISA_TYPE";

/// One page of search results as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub results: Vec<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Page {
    pub fn failed(page: usize, limit: usize, message: impl Into<String>) -> Self {
        Self {
            total: 0,
            page,
            limit,
            results: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Collects the `[offset, offset + limit)` window of matches across chunks.
///
/// With an empty query it switches to listing mode: the first `limit` rows
/// of the first file that yields any row, with the offset ignored.
#[derive(Debug)]
pub struct PaginationAccumulator {
    matcher: RowMatcher,
    offset: usize,
    limit: usize,
    listing: bool,
    tag: Option<String>,
    total_seen: usize,
    collected: Vec<Record>,
}

impl PaginationAccumulator {
    pub fn new(query: &SearchQuery) -> Self {
        Self {
            matcher: RowMatcher::new(query),
            offset: query.offset,
            limit: query.limit,
            listing: query.is_listing(),
            tag: None,
            total_seen: 0,
            collected: Vec::with_capacity(query.limit.min(1024)),
        }
    }

    /// Tag every paged result with `VISA_TYPE = tag`.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn is_listing(&self) -> bool {
        self.listing
    }

    pub fn total_seen(&self) -> usize {
        self.total_seen
    }

    pub fn collected(&self) -> usize {
        self.collected.len()
    }

    fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.collected.len())
    }

    fn control(&self) -> ScanControl {
        if self.collected.len() >= self.limit {
            ScanControl::Stop
        } else {
            ScanControl::Continue
        }
    }

    /// Fold the matches of one chunk, in encounter order.
    pub fn push_matches(&mut self, matches: Vec<Record>) -> ScanControl {
        let k = matches.len();
        self.total_seen += k;

        if self.total_seen > self.offset {
            let before = self.total_seen - k;
            let start = self.offset.saturating_sub(before);
            let end = k.min(start + self.remaining());
            for mut record in matches.into_iter().skip(start).take(end - start) {
                if let Some(tag) = &self.tag {
                    record.set_field(VISA_TYPE_FIELD, FieldValue::Text(tag.clone()));
                }
                self.collected.push(record);
            }
        }

        self.control()
    }

    fn push_listing(&mut self, records: Vec<Record>) -> ScanControl {
        let take = self.remaining();
        self.collected.extend(records.into_iter().take(take));
        self.control()
    }

    pub fn into_page(self, page: usize) -> Page {
        let total = if self.listing {
            self.collected.len()
        } else {
            self.total_seen
        };
        Page {
            total,
            page,
            limit: self.limit,
            results: self.collected,
            error: None,
        }
    }
}

impl ChunkSink for PaginationAccumulator {
    fn consume(&mut self, chunk: Chunk) -> ScanControl {
        if self.listing {
            return self.push_listing(chunk.records);
        }
        let matches = self.matcher.filter_chunk(chunk);
        self.push_matches(matches)
    }

    fn end_of_file(&mut self) -> ScanControl {
        if self.listing && !self.collected.is_empty() {
            ScanControl::Stop
        } else {
            ScanControl::Continue
        }
    }

    fn is_satisfied(&self) -> bool {
        self.limit == 0
    }
}

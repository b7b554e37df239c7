use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;

/// Recoverable conditions met during a scan.
///
/// None of these abort a scan; they are recorded so that skip decisions can
/// be inspected after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IssueKind {
    /// A dataset file could not be opened or its header could not be read.
    FileUnreadable,
    /// A whole chunk failed to read and was skipped.
    ChunkSkipped,
    /// Malformed rows were dropped from a chunk.
    RowsDropped,
    /// Values could not be converted for aggregation and were excluded.
    ValuesExcluded,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueKind::FileUnreadable => "file_unreadable",
            IssueKind::ChunkSkipped => "chunk_skipped",
            IssueKind::RowsDropped => "rows_dropped",
            IssueKind::ValuesExcluded => "values_excluded",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanIssue {
    pub kind: IssueKind,
    pub message: String,
    pub file: Option<String>,
    pub chunk: Option<usize>,
}

impl ScanIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            file: None,
            chunk: None,
        }
    }

    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn in_chunk(mut self, chunk: usize) -> Self {
        self.chunk = Some(chunk);
        self
    }
}

impl fmt::Display for ScanIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.chunk) {
            (Some(file), Some(chunk)) => write!(f, "{} (chunk {}): {}", file, chunk, self.message),
            (Some(file), None) => write!(f, "{}: {}", file, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

const MAX_EXAMPLES: usize = 3;

/// Issues recorded by one scan, with per-kind counts and a few examples.
#[derive(Debug, Clone, Default)]
pub struct IssueLog {
    issues: Vec<ScanIssue>,
    counts: BTreeMap<IssueKind, usize>,
    examples: BTreeMap<IssueKind, Vec<String>>,
}

impl IssueLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, issue: ScanIssue) {
        *self.counts.entry(issue.kind).or_insert(0) += 1;

        let examples = self.examples.entry(issue.kind).or_default();
        if examples.len() < MAX_EXAMPLES {
            examples.push(issue.to_string());
        }

        self.issues.push(issue);
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScanIssue> {
        self.issues.iter()
    }

    /// JSON summary keyed by issue kind, or `None` when nothing went wrong.
    pub fn generate_summary(&self) -> Option<serde_json::Value> {
        if self.issues.is_empty() {
            return None;
        }

        let mut summary = json!({});
        for (kind, count) in &self.counts {
            let examples = self.examples.get(kind).cloned().unwrap_or_default();
            summary[kind.to_string()] = json!({
                "count": count,
                "examples": examples,
            });
        }
        Some(summary)
    }
}

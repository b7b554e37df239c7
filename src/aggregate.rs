//! Online summary statistics over a bounded prefix of a dataset.
//!
//! Everything here folds chunk by chunk: categorical counts add up, the
//! top-N table is merged and re-trimmed after every chunk, and the mean is
//! kept as `(mean, n)` so it stays exact whatever the chunk boundaries are.

use indexmap::IndexMap;
use serde::Serialize;

use crate::planner::{ChunkSink, ScanControl};
use crate::readers::Chunk;
use crate::record::serialize_optional_finite;

pub const TOP_N: usize = 10;
pub const MIN_VALID_WAGE: f64 = 5.0;
pub const MAX_VALID_WAGE: f64 = 1_000_000.0;
pub const DEFAULT_WAGE_UNIT: &str = "Hour";

/// Column names the aggregator reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsFields {
    pub category: String,
    /// Entity columns in order of preference; the first present one is used.
    pub entities: Vec<String>,
    pub wage: Option<String>,
    /// Unit columns in order of preference.
    pub units: Vec<String>,
}

impl StatsFields {
    pub fn with_wage(wage: Option<&str>) -> Self {
        Self {
            category: "CASE_STATUS".to_string(),
            entities: vec!["EMPLOYER_NAME".to_string(), "TRADE_NAME_DBA".to_string()],
            wage: wage.map(str::to_string),
            units: vec!["WAGE_UNIT_OF_PAY".to_string(), "PER".to_string()],
        }
    }
}

/// Bounded name-to-count table keeping the `n` highest counts.
///
/// Entries trimmed away lose their count; a name that comes back later starts
/// again from its new chunk-local count.
#[derive(Debug, Clone)]
pub struct TopNTable {
    n: usize,
    entries: IndexMap<String, u64>,
}

impl TopNTable {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            entries: IndexMap::new(),
        }
    }

    /// Add `counts` to the table and re-trim to `n`. Ties keep the order in
    /// which names were first inserted.
    pub fn merge<I: IntoIterator<Item = (String, u64)>>(&mut self, counts: I) {
        for (name, count) in counts {
            *self.entries.entry(name).or_insert(0) += count;
        }
        self.entries.sort_by(|_, a, _, b| b.cmp(a));
        self.entries.truncate(self.n);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries.get(name).copied()
    }

    pub fn into_map(self) -> IndexMap<String, u64> {
        self.entries
    }
}

/// Exact incremental arithmetic mean.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMean {
    mean: Option<f64>,
    count: u64,
}

impl RunningMean {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a batch given by its sum and size. Empty batches change nothing.
    pub fn fold_batch(&mut self, sum: f64, count: u64) {
        if count == 0 {
            return;
        }
        let total = self.count + count;
        self.mean = Some(match self.mean {
            None => sum / count as f64,
            Some(mean) => (mean * self.count as f64 + sum) / total as f64,
        });
        self.count = total;
    }

    /// `None` until the first valid value.
    pub fn mean(&self) -> Option<f64> {
        self.mean
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Final statistics of one dataset selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub visa_type: String,
    pub year: String,
    pub quarter: String,
    pub case_status: IndexMap<String, u64>,
    pub top_employers: IndexMap<String, u64>,
    #[serde(serialize_with = "serialize_optional_finite")]
    pub avg_wage: Option<f64>,
    pub wage_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatsReport {
    pub fn failed(
        visa_type: impl Into<String>,
        year: impl Into<String>,
        quarter: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            visa_type: visa_type.into(),
            year: year.into(),
            quarter: quarter.into(),
            case_status: IndexMap::new(),
            top_employers: IndexMap::new(),
            avg_wage: None,
            wage_unit: None,
            error: Some(message.into()),
        }
    }
}

/// Aggregated tables without the request labels.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsResult {
    pub case_status: IndexMap<String, u64>,
    pub top_employers: IndexMap<String, u64>,
    pub avg_wage: Option<f64>,
    pub wage_unit: Option<String>,
    pub values_excluded: usize,
}

impl StatsResult {
    pub fn into_report(
        self,
        visa_type: impl Into<String>,
        year: impl Into<String>,
        quarter: impl Into<String>,
    ) -> StatsReport {
        StatsReport {
            visa_type: visa_type.into(),
            year: year.into(),
            quarter: quarter.into(),
            case_status: self.case_status,
            top_employers: self.top_employers,
            avg_wage: self.avg_wage,
            wage_unit: self.wage_unit,
            error: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatsAggregator {
    fields: StatsFields,
    case_status: IndexMap<String, u64>,
    top: TopNTable,
    wages: RunningMean,
    wage_unit: Option<String>,
    values_excluded: usize,
}

impl StatsAggregator {
    pub fn new(fields: StatsFields) -> Self {
        Self {
            fields,
            case_status: IndexMap::new(),
            top: TopNTable::new(TOP_N),
            wages: RunningMean::new(),
            wage_unit: None,
            values_excluded: 0,
        }
    }

    pub fn fold(&mut self, chunk: &Chunk) {
        if chunk.has_column(&self.fields.category) {
            for (status, count) in value_counts(chunk, &self.fields.category) {
                *self.case_status.entry(status).or_insert(0) += count;
            }
        }

        if let Some(entity) = first_present(chunk, &self.fields.entities) {
            let mut local = value_counts(chunk, entity);
            local.truncate(TOP_N);
            self.top.merge(local);
        }

        let Some(wage) = self.fields.wage.as_deref() else {
            return;
        };
        if !chunk.has_column(wage) {
            return;
        }

        let mut sum = 0.0;
        let mut valid = 0u64;
        for record in &chunk.records {
            let value = record.get(wage);
            if value.is_absent() {
                continue;
            }
            match value.to_number() {
                Some(w) if (MIN_VALID_WAGE..=MAX_VALID_WAGE).contains(&w) => {
                    sum += w;
                    valid += 1;
                }
                _ => self.values_excluded += 1,
            }
        }
        self.wages.fold_batch(sum, valid);

        if self.wage_unit.is_none() {
            let unit = first_present(chunk, &self.fields.units)
                .and_then(|column| value_counts(chunk, column).into_iter().next())
                .map(|(unit, _)| unit)
                .unwrap_or_else(|| DEFAULT_WAGE_UNIT.to_string());
            self.wage_unit = Some(unit);
        }
    }

    pub fn finish(self) -> StatsResult {
        let mut case_status = self.case_status;
        case_status.sort_by(|_, a, _, b| b.cmp(a));

        StatsResult {
            case_status,
            top_employers: self.top.into_map(),
            avg_wage: self.wages.mean().map(round2),
            wage_unit: self.wage_unit,
            values_excluded: self.values_excluded,
        }
    }
}

impl ChunkSink for StatsAggregator {
    fn consume(&mut self, chunk: Chunk) -> ScanControl {
        self.fold(&chunk);
        ScanControl::Continue
    }
}

fn first_present<'a>(chunk: &Chunk, candidates: &'a [String]) -> Option<&'a str> {
    candidates
        .iter()
        .find(|c| chunk.has_column(c))
        .map(String::as_str)
}

/// Counts of the non-absent values of `column`, most frequent first.
fn value_counts(chunk: &Chunk, column: &str) -> Vec<(String, u64)> {
    let mut counts: IndexMap<String, u64> = IndexMap::new();
    for record in &chunk.records {
        if let Some(value) = record.get(column).render() {
            *counts.entry(value.into_owned()).or_insert(0) += 1;
        }
    }
    counts.sort_by(|_, a, _, b| b.cmp(a));
    counts.into_iter().collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

//! Forward-only chunked reading of delimited dataset files.
//!
//! A [`ChunkReader`] owns the open file and yields [`ChunkOutcome`]s until the
//! end of the file. Malformed rows are dropped from their chunk and counted,
//! a field that is not valid UTF-8 is kept as absent, and a chunk that cannot be read at all is reported as [`ChunkOutcome::Skipped`]
//! and reading resumes with the next window of rows.

use anyhow::{Context, Result};
use csv::{ByteRecord, ReaderBuilder};
use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::decompression::DecompressionReader;
use crate::record::{is_missing_marker, FieldValue, Record};

/// Consecutive unreadable chunks after which a file is abandoned.
pub const MAX_CONSECUTIVE_SKIPS: usize = 3;

/// A bounded batch of records read from one file.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub file_id: Arc<str>,
    pub index: usize,
    pub start_row: u64,
    pub columns: Arc<[String]>,
    pub records: Vec<Record>,
    pub dropped_rows: usize,
}

impl Chunk {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Why a chunk was not delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The underlying stream failed mid-chunk (I/O or decompression error).
    Unreadable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unreadable(msg) => write!(f, "unreadable: {}", msg),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ChunkOutcome {
    Chunk(Chunk),
    Skipped {
        file_id: Arc<str>,
        index: usize,
        start_row: u64,
        reason: SkipReason,
    },
}

// A `None` field could not be decoded as UTF-8.
enum RowRead {
    Row(Vec<Option<String>>),
    Malformed,
    Eof,
    Failed(String),
}

pub struct ChunkReader<R: Read> {
    reader: csv::Reader<R>,
    file_id: Arc<str>,
    columns: Arc<[String]>,
    chunk_size: usize,
    next_index: usize,
    next_row: u64,
    consecutive_skips: usize,
    buffer: ByteRecord,
    finished: bool,
}

impl ChunkReader<DecompressionReader> {
    /// Open a (possibly compressed) CSV file and read its header row.
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        let source = DecompressionReader::open(path)?;
        Self::from_reader(source, path.display().to_string(), chunk_size)
    }
}

impl<R: Read> ChunkReader<R> {
    pub fn from_reader(source: R, file_id: impl Into<String>, chunk_size: usize) -> Result<Self> {
        let file_id: Arc<str> = Arc::from(file_id.into());
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(source);

        let columns = dedupe_columns(
            reader
                .byte_headers()
                .with_context(|| format!("Failed to read CSV header of '{}'", file_id))?
                .iter()
                .map(|h| String::from_utf8_lossy(h).trim().to_string()),
        );

        Ok(Self {
            reader,
            finished: columns.is_empty(),
            columns: columns.into(),
            file_id,
            chunk_size: chunk_size.max(1),
            next_index: 0,
            next_row: 0,
            consecutive_skips: 0,
            buffer: ByteRecord::new(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// True once the end of the file was reached or the file was abandoned.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn read_row(&mut self) -> RowRead {
        match self.reader.read_byte_record(&mut self.buffer) {
            Ok(false) => RowRead::Eof,
            Ok(true) => {
                if self.buffer.len() > self.columns.len() {
                    return RowRead::Malformed;
                }
                let row = self
                    .buffer
                    .iter()
                    .map(|field| std::str::from_utf8(field).ok().map(str::to_string))
                    .collect();
                RowRead::Row(row)
            }
            Err(e) => match e.kind() {
                csv::ErrorKind::Io(io) => RowRead::Failed(io.to_string()),
                _ => RowRead::Malformed,
            },
        }
    }

    fn read_chunk(&mut self) -> Option<ChunkOutcome> {
        let index = self.next_index;
        let start_row = self.next_row;
        let mut rows = Vec::with_capacity(self.chunk_size.min(4096));
        let mut dropped_rows = 0;
        let mut failure = None;
        let mut consumed = 0;

        while consumed < self.chunk_size {
            match self.read_row() {
                RowRead::Row(row) => rows.push(row),
                RowRead::Malformed => dropped_rows += 1,
                RowRead::Eof => {
                    self.finished = true;
                    break;
                }
                RowRead::Failed(msg) => {
                    failure = Some(msg);
                    break;
                }
            }
            consumed += 1;
        }

        if consumed == 0 && failure.is_none() {
            return None;
        }

        self.next_index += 1;
        self.next_row += consumed as u64;

        if let Some(msg) = failure {
            self.consecutive_skips += 1;
            if self.consecutive_skips >= MAX_CONSECUTIVE_SKIPS {
                self.finished = true;
            }
            return Some(ChunkOutcome::Skipped {
                file_id: Arc::clone(&self.file_id),
                index,
                start_row,
                reason: SkipReason::Unreadable(msg),
            });
        }

        self.consecutive_skips = 0;
        Some(ChunkOutcome::Chunk(Chunk {
            file_id: Arc::clone(&self.file_id),
            index,
            start_row,
            records: build_records(&self.columns, rows),
            columns: Arc::clone(&self.columns),
            dropped_rows,
        }))
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = ChunkOutcome;

    fn next(&mut self) -> Option<ChunkOutcome> {
        if self.finished {
            return None;
        }
        let outcome = self.read_chunk();
        if outcome.is_none() {
            self.finished = true;
        }
        outcome
    }
}

/// Suffix repeated header names as `NAME.1`, `NAME.2`, ... so no column
/// shadows an earlier one.
fn dedupe_columns(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for name in names {
        let mut candidate = name.clone();
        let mut n = 0;
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{}.{}", name, n);
        }
        seen.insert(candidate.clone());
        columns.push(candidate);
    }
    columns
}

/// Type the raw rows of one chunk.
///
/// A column is numeric when every non-missing value of the chunk parses as a
/// number; otherwise all of its values stay text. Undecodable fields are
/// absent and take no part in typing.
fn build_records(columns: &[String], rows: Vec<Vec<Option<String>>>) -> Vec<Record> {
    let numeric: Vec<bool> = (0..columns.len())
        .map(|col| {
            let mut seen = false;
            for row in &rows {
                match row.get(col) {
                    Some(Some(raw)) if !is_missing_marker(raw) => {
                        if raw.trim().parse::<f64>().is_err() {
                            return false;
                        }
                        seen = true;
                    }
                    _ => {}
                }
            }
            seen
        })
        .collect();

    rows.into_iter()
        .map(|row| {
            let mut record = Record::with_capacity(columns.len());
            let mut values = row.into_iter();
            for (col, name) in columns.iter().enumerate() {
                let value = match values.next().flatten() {
                    Some(raw) if is_missing_marker(&raw) => FieldValue::Absent,
                    Some(raw) if numeric[col] => raw
                        .trim()
                        .parse::<f64>()
                        .map(FieldValue::Number)
                        .unwrap_or(FieldValue::Absent),
                    Some(raw) => FieldValue::Text(raw),
                    None => FieldValue::Absent,
                };
                record.set_field(name.clone(), value);
            }
            record
        })
        .collect()
}

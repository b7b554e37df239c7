//! Bounded, sequential scans over an ordered list of dataset files.

use crossbeam_channel::Receiver;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error_handling::{IssueKind, IssueLog, ScanIssue};
use crate::platform::Ctrl;
use crate::readers::{Chunk, ChunkOutcome, ChunkReader};
use crate::stats::ScanStats;

/// Resource ceilings for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanBounds {
    pub max_files: usize,
    pub max_chunks_per_file: usize,
    pub chunk_size: usize,
}

impl ScanBounds {
    pub const SEARCH: ScanBounds = ScanBounds {
        max_files: 3,
        max_chunks_per_file: 5,
        chunk_size: 20_000,
    };

    pub const STATS: ScanBounds = ScanBounds {
        max_files: 1,
        max_chunks_per_file: 3,
        chunk_size: 25_000,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    Continue,
    Stop,
}

/// Consumer of the chunks a [`ScanPlanner`] reads.
pub trait ChunkSink {
    fn consume(&mut self, chunk: Chunk) -> ScanControl;

    /// Called after the last chunk of every opened file.
    fn end_of_file(&mut self) -> ScanControl {
        ScanControl::Continue
    }

    /// A sink that needs nothing more stops the scan before any file is opened.
    fn is_satisfied(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The sink asked to stop.
    Satisfied,
    /// Every file was read to its end.
    Exhausted,
    /// Every file was visited but at least one was cut short by the chunk bound.
    ChunkBound,
    /// Files remained when the file bound was reached.
    MaxFiles,
    /// A shutdown request arrived between chunks.
    Cancelled,
    /// There was nothing to scan.
    NoData,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StopReason::Satisfied => "satisfied",
            StopReason::Exhausted => "exhausted",
            StopReason::ChunkBound => "chunk bound reached",
            StopReason::MaxFiles => "file bound reached",
            StopReason::Cancelled => "cancelled",
            StopReason::NoData => "no data",
        };
        write!(f, "{}", name)
    }
}

/// What happened during a scan, next to whatever the sink produced.
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub stop: StopReason,
    pub stats: ScanStats,
    pub issues: IssueLog,
}

impl ScanSummary {
    /// Summary of a scan that never started.
    pub fn not_started(stop: StopReason) -> Self {
        let mut stats = ScanStats::new();
        stats.finish();
        Self {
            stop,
            stats,
            issues: IssueLog::new(),
        }
    }
}

pub struct ScanPlanner<'a> {
    bounds: ScanBounds,
    ctrl: Option<&'a Receiver<Ctrl>>,
}

impl<'a> ScanPlanner<'a> {
    pub fn new(bounds: ScanBounds) -> Self {
        Self { bounds, ctrl: None }
    }

    pub fn with_ctrl(mut self, ctrl: Option<&'a Receiver<Ctrl>>) -> Self {
        self.ctrl = ctrl;
        self
    }

    /// Read `files` in order, feeding every chunk to `sink` until it is
    /// satisfied or a bound is reached. No file is opened twice.
    pub fn run<S: ChunkSink>(&self, files: &[PathBuf], sink: &mut S) -> ScanSummary {
        let mut stats = ScanStats::new();
        let mut issues = IssueLog::new();
        let stop = self.drive(files, sink, &mut stats, &mut issues);
        stats.finish();
        ScanSummary {
            stop,
            stats,
            issues,
        }
    }

    fn drive<S: ChunkSink>(
        &self,
        files: &[PathBuf],
        sink: &mut S,
        stats: &mut ScanStats,
        issues: &mut IssueLog,
    ) -> StopReason {
        if files.is_empty() {
            return StopReason::NoData;
        }
        if sink.is_satisfied() {
            return StopReason::Satisfied;
        }

        let mut truncated = false;

        for (attempted, path) in files.iter().enumerate() {
            if attempted >= self.bounds.max_files {
                return StopReason::MaxFiles;
            }
            if self.cancelled(stats) {
                return StopReason::Cancelled;
            }

            let name = display_name(path);
            let mut reader = match ChunkReader::open(path, self.bounds.chunk_size) {
                Ok(reader) => {
                    stats.files_opened += 1;
                    reader
                }
                Err(e) => {
                    stats.files_failed += 1;
                    issues.record(
                        ScanIssue::new(IssueKind::FileUnreadable, format!("{:#}", e)).in_file(&name),
                    );
                    continue;
                }
            };

            let mut chunks_taken = 0;
            while chunks_taken < self.bounds.max_chunks_per_file {
                if chunks_taken > 0 && self.cancelled(stats) {
                    return StopReason::Cancelled;
                }
                let Some(outcome) = reader.next() else {
                    break;
                };
                chunks_taken += 1;

                match outcome {
                    ChunkOutcome::Chunk(chunk) => {
                        stats.chunks_read += 1;
                        stats.rows_read += chunk.len();
                        if chunk.dropped_rows > 0 {
                            stats.rows_dropped += chunk.dropped_rows;
                            issues.record(
                                ScanIssue::new(
                                    IssueKind::RowsDropped,
                                    format!("{} malformed rows dropped", chunk.dropped_rows),
                                )
                                .in_file(&name)
                                .in_chunk(chunk.index),
                            );
                        }
                        if sink.consume(chunk) == ScanControl::Stop {
                            return StopReason::Satisfied;
                        }
                    }
                    ChunkOutcome::Skipped { index, reason, .. } => {
                        stats.chunks_skipped += 1;
                        issues.record(
                            ScanIssue::new(IssueKind::ChunkSkipped, reason.to_string())
                                .in_file(&name)
                                .in_chunk(index),
                        );
                    }
                }
            }

            if chunks_taken >= self.bounds.max_chunks_per_file && !reader.is_finished() {
                truncated = true;
            }
            // The handle is released here, before the next file is opened
            drop(reader);

            if sink.end_of_file() == ScanControl::Stop {
                return StopReason::Satisfied;
            }
        }

        if truncated {
            StopReason::ChunkBound
        } else {
            StopReason::Exhausted
        }
    }

    fn cancelled(&self, stats: &ScanStats) -> bool {
        let Some(ctrl) = self.ctrl else {
            return false;
        };
        loop {
            match ctrl.try_recv() {
                Ok(Ctrl::Shutdown { .. }) => return true,
                Ok(Ctrl::PrintStats) => {
                    eprintln!(
                        "{}",
                        crate::config::format_info_message_auto(&stats.format_stats())
                    );
                }
                Err(_) => return false,
            }
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

use std::time::{Duration, Instant};

/// Counters collected while one scan runs.
///
/// Each scan owns its own instance; nothing here is shared between requests.
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    pub files_opened: usize,
    pub files_failed: usize,
    pub chunks_read: usize,
    pub chunks_skipped: usize,
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub rows_matched: usize,
    pub values_excluded: usize,
    pub processing_time: Duration,
    pub start_time: Option<Instant>,
}

impl ScanStats {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn finish(&mut self) {
        if let Some(start) = self.start_time {
            self.processing_time = start.elapsed();
        }
    }

    pub fn format_stats(&self) -> String {
        let mut output = format!(
            "Scanned: {} files, {} chunks, {} rows",
            self.files_opened, self.chunks_read, self.rows_read
        );

        if self.rows_matched > 0 {
            output.push_str(&format!(", {} matched", self.rows_matched));
        }
        if self.files_failed > 0 {
            output.push_str(&format!(", {} files unreadable", self.files_failed));
        }
        if self.chunks_skipped > 0 {
            output.push_str(&format!(", {} chunks skipped", self.chunks_skipped));
        }
        if self.rows_dropped > 0 {
            output.push_str(&format!(", {} rows dropped", self.rows_dropped));
        }
        if self.values_excluded > 0 {
            output.push_str(&format!(", {} values excluded", self.values_excluded));
        }

        let processing_time_ms = self.processing_time.as_millis();
        output.push_str(&format!(" in {}ms", processing_time_ms));

        if processing_time_ms > 0 && self.rows_read > 0 {
            let rows_per_sec = (self.rows_read as f64 * 1000.0) / processing_time_ms as f64;
            output.push_str(&format!(" ({:.0} rows/s)", rows_per_sec));
        }

        output
    }
}

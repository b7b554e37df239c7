// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Two Acme rows; the first job title is Latin-1 encoded.
pub const LATIN1_ROWS: &[u8] = b"CASE_NUMBER,CASE_STATUS,EMPLOYER_NAME,JOB_TITLE\n\
A1,Certified,Acme Corp,Caf\xc9 Manager\n\
A2,Certified,Acme Corp,Engineer\n";

pub const LCA_HEADER: &str =
    "CASE_NUMBER,CASE_STATUS,EMPLOYER_NAME,JOB_TITLE,WORKSITE_CITY,WAGE_RATE_OF_PAY_FROM,WAGE_UNIT_OF_PAY";

/// A temporary data directory holding disclosure files
pub struct DatasetDir {
    dir: TempDir,
}

impl DatasetDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn path_str(&self) -> &str {
        self.dir.path().to_str().expect("temp dir is not UTF-8")
    }

    /// Write a plain CSV file
    pub fn add(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).expect("Failed to write dataset file");
        path
    }

    /// Write a CSV file from raw bytes, for encodings other than UTF-8
    pub fn add_bytes(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).expect("Failed to write dataset file");
        path
    }

    /// Write a gzip-compressed CSV file
    pub fn add_gz(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        let file = fs::File::create(&path).expect("Failed to create dataset file");
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder
            .write_all(content.as_bytes())
            .expect("Failed to compress dataset file");
        encoder.finish().expect("Failed to finish gzip stream");
        path
    }
}

/// LCA rows numbered from `start`, cycling through a few employers
pub fn lca_rows(start: usize, count: usize) -> String {
    const EMPLOYERS: [&str; 4] = ["Google LLC", "Acme Corp", "Initech", "Globex"];
    let mut out = String::from(LCA_HEADER);
    out.push('\n');
    for i in start..start + count {
        out.push_str(&format!(
            "I-200-{:05},Certified,{},Engineer {},Austin,{},Hour\n",
            i,
            EMPLOYERS[i % EMPLOYERS.len()],
            i,
            40 + i % 10
        ));
    }
    out
}

/// Run the visascan binary with an isolated environment
pub fn run_visascan(args: &[&str]) -> (String, String, i32) {
    let home = TempDir::new().expect("Failed to create temp home");
    let output = Command::new(env!("CARGO_BIN_EXE_visascan"))
        .args(args)
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("FORCE_COLOR")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute visascan");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Run visascan against a data directory
pub fn run_with_data(dir: &DatasetDir, args: &[&str]) -> (String, String, i32) {
    let mut full_args = vec!["--data-dir", dir.path_str()];
    full_args.extend_from_slice(args);
    run_visascan(&full_args)
}

pub fn parse_json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("Invalid JSON output ({}): {}", e, stdout))
}

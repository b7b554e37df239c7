//! Dataset file discovery.
//!
//! Disclosure files are named `<CATEGORY>_Disclosure_Data_FY<year>_Q<quarter>.csv`
//! (H-2B files sometimes lack the `Data_` part) and may carry a `.gz` or `.zst`
//! suffix. The index groups them by category and fiscal year, ordered by name.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

static FILE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(LCA|H-2A|H-2B)_Disclosure_(Data_)?FY(\d{4})_Q(\d+)\.csv(?:\.gz|\.zst)?$")
        .expect("dataset file name pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatasetCategory {
    Lca,
    H2a,
    H2b,
}

impl DatasetCategory {
    pub const ALL: [DatasetCategory; 3] =
        [DatasetCategory::Lca, DatasetCategory::H2a, DatasetCategory::H2b];

    pub fn id(self) -> &'static str {
        match self {
            DatasetCategory::Lca => "LCA",
            DatasetCategory::H2a => "H-2A",
            DatasetCategory::H2b => "H-2B",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DatasetCategory::Lca => "H-1B Visas",
            DatasetCategory::H2a => "Agricultural Workers",
            DatasetCategory::H2b => "Non-Agricultural Workers",
        }
    }

    /// Column holding the offered wage in this category's files.
    pub fn wage_field(self) -> &'static str {
        match self {
            DatasetCategory::Lca => "WAGE_RATE_OF_PAY_FROM",
            DatasetCategory::H2a => "WAGE_OFFER",
            DatasetCategory::H2b => "BASIC_WAGE_RATE_FROM",
        }
    }
}

impl fmt::Display for DatasetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for DatasetCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        DatasetCategory::ALL
            .into_iter()
            .find(|c| c.id().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown visa type '{}' (expected LCA, H-2A or H-2B)", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFile {
    pub category: DatasetCategory,
    pub year: String,
    pub quarter: String,
    pub path: PathBuf,
}

impl DatasetFile {
    /// Parse a dataset file descriptor from its file name.
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let caps = FILE_NAME.captures(name)?;

        let category = caps.get(1)?.as_str().parse::<DatasetCategory>().ok()?;
        // Only H-2B publishes files without the `Data_` infix
        if caps.get(2).is_none() && category != DatasetCategory::H2b {
            return None;
        }

        Some(Self {
            category,
            year: caps.get(3)?.as_str().to_string(),
            quarter: caps.get(4)?.as_str().to_string(),
            path,
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A category with data, as listed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableDataset {
    pub label: String,
    pub years: Vec<String>,
}

/// Immutable listing of the dataset files of a data directory.
///
/// Built once and shared by reference between concurrent scans.
#[derive(Debug, Clone, Default)]
pub struct DatasetIndex {
    files: BTreeMap<DatasetCategory, BTreeMap<String, Vec<DatasetFile>>>,
}

impl DatasetIndex {
    /// List `dir` (non-recursively) and index every dataset file in it.
    pub fn scan_dir(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read data directory '{}'", dir.display()))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("Failed to list data directory '{}'", dir.display()))?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                paths.push(entry.path());
            }
        }
        Ok(Self::from_paths(paths))
    }

    /// Index the given paths; names that are not dataset files are ignored.
    pub fn from_paths<I: IntoIterator<Item = PathBuf>>(paths: I) -> Self {
        let mut files: BTreeMap<DatasetCategory, BTreeMap<String, Vec<DatasetFile>>> =
            BTreeMap::new();
        for file in paths.into_iter().filter_map(DatasetFile::from_path) {
            files
                .entry(file.category)
                .or_default()
                .entry(file.year.clone())
                .or_default()
                .push(file);
        }
        for years in files.values_mut() {
            for year_files in years.values_mut() {
                year_files.sort_by_key(|f| f.file_name());
            }
        }
        Self { files }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.files
            .values()
            .flat_map(|years| years.values())
            .map(Vec::len)
            .sum()
    }

    /// Fiscal years of a category, ascending.
    pub fn years(&self, category: DatasetCategory) -> Vec<&str> {
        self.files
            .get(&category)
            .map(|years| years.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn year_files(&self, category: DatasetCategory, year: &str) -> Option<&[DatasetFile]> {
        self.files
            .get(&category)
            .and_then(|years| years.get(year))
            .map(Vec::as_slice)
    }

    /// Files to search.
    ///
    /// A known year narrows to that year (and to one quarter if given; an
    /// unknown quarter selects nothing). Otherwise every file of the category
    /// is returned, by year then name.
    pub fn search_files(
        &self,
        category: DatasetCategory,
        year: Option<&str>,
        quarter: Option<&str>,
    ) -> Vec<PathBuf> {
        if let Some(files) = year.and_then(|y| self.year_files(category, y)) {
            return select_quarter(files, quarter);
        }
        self.files
            .get(&category)
            .map(|years| {
                years
                    .values()
                    .flatten()
                    .map(|f| f.path.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Files to aggregate: as [`search_files`](Self::search_files) for a known
    /// year, otherwise the files of the most recent year.
    pub fn stats_files(
        &self,
        category: DatasetCategory,
        year: Option<&str>,
        quarter: Option<&str>,
    ) -> Vec<PathBuf> {
        if let Some(files) = year.and_then(|y| self.year_files(category, y)) {
            return select_quarter(files, quarter);
        }
        self.files
            .get(&category)
            .and_then(|years| years.values().next_back())
            .map(|files| files.iter().map(|f| f.path.clone()).collect())
            .unwrap_or_default()
    }

    /// First file of the earliest year of a category.
    pub fn first_file(&self, category: DatasetCategory) -> Option<&DatasetFile> {
        self.files
            .get(&category)
            .and_then(|years| years.values().next())
            .and_then(|files| files.first())
    }

    /// Categories that have files, with their label and years.
    pub fn available(&self) -> IndexMap<&'static str, AvailableDataset> {
        self.files
            .iter()
            .filter(|(_, years)| !years.is_empty())
            .map(|(category, years)| {
                (
                    category.id(),
                    AvailableDataset {
                        label: category.label().to_string(),
                        years: years.keys().cloned().collect(),
                    },
                )
            })
            .collect()
    }
}

fn select_quarter(files: &[DatasetFile], quarter: Option<&str>) -> Vec<PathBuf> {
    match quarter {
        Some(q) => files
            .iter()
            .find(|f| f.quarter == q)
            .map(|f| vec![f.path.clone()])
            .unwrap_or_default(),
        None => files.iter().map(|f| f.path.clone()).collect(),
    }
}

//! Request-level operations: resolve dataset files, run a bounded scan, and
//! shape the result.

use anyhow::Result;
use crossbeam_channel::Receiver;
use indexmap::IndexMap;

use crate::aggregate::{StatsAggregator, StatsFields, StatsReport};
use crate::dataset::{AvailableDataset, DatasetCategory, DatasetIndex};
use crate::error_handling::{IssueKind, ScanIssue};
use crate::matcher::SearchQuery;
use crate::pagination::{Page, PaginationAccumulator};
use crate::planner::{ScanBounds, ScanPlanner, ScanSummary, StopReason};
use crate::platform::Ctrl;
use crate::readers::ChunkReader;

pub const NO_DATA_MESSAGE: &str = "No data files found matching the specified criteria";

/// Label used in reports when a year or quarter was not requested.
pub const ALL_LABEL: &str = "All";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub category: DatasetCategory,
    pub year: Option<String>,
    pub quarter: Option<String>,
    pub query: String,
    pub column: Option<String>,
    pub page: usize,
    pub limit: usize,
}

impl SearchRequest {
    pub fn new(category: DatasetCategory) -> Self {
        Self {
            category,
            year: None,
            quarter: None,
            query: String::new(),
            column: None,
            page: 1,
            limit: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRequest {
    pub category: DatasetCategory,
    pub year: Option<String>,
    pub quarter: Option<String>,
}

impl StatsRequest {
    pub fn new(category: DatasetCategory) -> Self {
        Self {
            category,
            year: None,
            quarter: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutput {
    pub page: Page,
    pub summary: ScanSummary,
}

#[derive(Debug, Clone)]
pub struct StatsOutput {
    pub report: StatsReport,
    pub summary: ScanSummary,
}

// Empty strings mean "not given".
fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Paginated substring search over the selected files.
pub fn search(
    index: &DatasetIndex,
    request: &SearchRequest,
    bounds: ScanBounds,
    ctrl: Option<&Receiver<Ctrl>>,
) -> SearchOutput {
    let page = request.page.max(1);
    let query = SearchQuery::for_page(&request.query, request.column.as_deref(), page, request.limit);

    let files = index.search_files(request.category, given(&request.year), given(&request.quarter));
    if files.is_empty() {
        return SearchOutput {
            page: Page::failed(page, request.limit, NO_DATA_MESSAGE),
            summary: ScanSummary::not_started(StopReason::NoData),
        };
    }

    let mut bounds = bounds;
    if query.is_listing() {
        // Listing only needs the first `limit` rows
        bounds.chunk_size = bounds.chunk_size.min(query.limit).max(1);
    }

    let mut accumulator = PaginationAccumulator::new(&query).with_tag(request.category.id());
    let mut summary = ScanPlanner::new(bounds)
        .with_ctrl(ctrl)
        .run(&files, &mut accumulator);

    summary.stats.rows_matched = if accumulator.is_listing() {
        accumulator.collected()
    } else {
        accumulator.total_seen()
    };

    SearchOutput {
        page: accumulator.into_page(page),
        summary,
    }
}

/// Summary statistics over a bounded prefix of the selected files.
pub fn stats(
    index: &DatasetIndex,
    request: &StatsRequest,
    bounds: ScanBounds,
    ctrl: Option<&Receiver<Ctrl>>,
) -> StatsOutput {
    let year = given(&request.year);
    let quarter = given(&request.quarter);
    let year_label = year.unwrap_or(ALL_LABEL);
    let quarter_label = quarter.unwrap_or(ALL_LABEL);

    let files = index.stats_files(request.category, year, quarter);
    if files.is_empty() {
        return StatsOutput {
            report: StatsReport::failed(
                request.category.id(),
                year_label,
                quarter_label,
                NO_DATA_MESSAGE,
            ),
            summary: ScanSummary::not_started(StopReason::NoData),
        };
    }

    let fields = StatsFields::with_wage(Some(request.category.wage_field()));
    let mut aggregator = StatsAggregator::new(fields);
    let mut summary = ScanPlanner::new(bounds)
        .with_ctrl(ctrl)
        .run(&files, &mut aggregator);

    let result = aggregator.finish();
    if result.values_excluded > 0 {
        summary.stats.values_excluded = result.values_excluded;
        summary.issues.record(ScanIssue::new(
            IssueKind::ValuesExcluded,
            format!(
                "{} {} values were not numeric or outside the accepted range",
                result.values_excluded,
                request.category.wage_field()
            ),
        ));
    }

    StatsOutput {
        report: result.into_report(request.category.id(), year_label, quarter_label),
        summary,
    }
}

/// Header of the first file of the earliest year of a category.
pub fn columns(index: &DatasetIndex, category: DatasetCategory) -> Result<Vec<String>> {
    let Some(file) = index.first_file(category) else {
        return Ok(Vec::new());
    };
    let reader = ChunkReader::open(&file.path, 1)?;
    Ok(reader.columns().to_vec())
}

/// Categories with data, keyed by category id.
pub fn datasets(index: &DatasetIndex) -> IndexMap<&'static str, AvailableDataset> {
    index.available()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn dataset_dir(files: &[(&str, &str)]) -> (TempDir, DatasetIndex) {
        let dir = TempDir::new().unwrap();
        for (name, body) in files {
            fs::write(dir.path().join(name), body).unwrap();
        }
        let index = DatasetIndex::scan_dir(dir.path()).unwrap();
        (dir, index)
    }

    const LCA_2024: &str = "CASE_STATUS,EMPLOYER_NAME,JOB_TITLE,WAGE_RATE_OF_PAY_FROM\n\
        Certified,Google LLC,Engineer,60\n\
        Denied,Acme Corp,Analyst,30\n\
        Certified,Google LLC,Manager,90\n";

    #[test]
    fn test_search_tags_results_and_counts_total() {
        let (_dir, index) = dataset_dir(&[("LCA_Disclosure_Data_FY2024_Q1.csv", LCA_2024)]);
        let mut request = SearchRequest::new(DatasetCategory::Lca);
        request.query = "google".to_string();

        let out = search(&index, &request, ScanBounds::SEARCH, None);
        assert_eq!(out.page.total, 2);
        assert_eq!(out.page.results.len(), 2);
        assert_eq!(out.page.results[0].get("VISA_TYPE").as_str(), Some("LCA"));
        assert_eq!(out.page.results[1].get("JOB_TITLE").as_str(), Some("Manager"));
        assert_eq!(out.summary.stats.rows_matched, 2);
        assert_eq!(out.summary.stop, StopReason::Exhausted);
    }

    #[test]
    fn test_search_without_files_reports_error() {
        let (_dir, index) = dataset_dir(&[]);
        let mut request = SearchRequest::new(DatasetCategory::H2a);
        request.page = 0;

        let out = search(&index, &request, ScanBounds::SEARCH, None);
        assert_eq!(out.page.error.as_deref(), Some(NO_DATA_MESSAGE));
        assert_eq!(out.page.page, 1);
        assert_eq!(out.summary.stop, StopReason::NoData);
    }

    #[test]
    fn test_listing_reads_only_first_rows() {
        let (_dir, index) = dataset_dir(&[("LCA_Disclosure_Data_FY2024_Q1.csv", LCA_2024)]);
        let mut request = SearchRequest::new(DatasetCategory::Lca);
        request.limit = 2;
        request.page = 4;

        let out = search(&index, &request, ScanBounds::SEARCH, None);
        assert_eq!(out.page.total, 2);
        assert_eq!(out.page.results[0].get("JOB_TITLE").as_str(), Some("Engineer"));
        assert_eq!(out.summary.stats.rows_read, 2);
        assert_eq!(out.summary.stop, StopReason::Satisfied);
    }

    #[test]
    fn test_stats_labels_and_tables() {
        let (_dir, index) = dataset_dir(&[("LCA_Disclosure_Data_FY2024_Q1.csv", LCA_2024)]);
        let out = stats(&index, &StatsRequest::new(DatasetCategory::Lca), ScanBounds::STATS, None);

        assert_eq!(out.report.year, "All");
        assert_eq!(out.report.quarter, "All");
        assert_eq!(out.report.case_status.get("Certified"), Some(&2));
        assert_eq!(out.report.top_employers.get("Google LLC"), Some(&2));
        assert_eq!(out.report.avg_wage, Some(60.0));
        assert_eq!(out.report.wage_unit.as_deref(), Some("Hour"));
        assert!(out.report.error.is_none());
    }

    #[test]
    fn test_stats_counts_excluded_wages() {
        let body = "CASE_STATUS,WAGE_RATE_OF_PAY_FROM\nCertified,abc\nCertified,40\n";
        let (_dir, index) = dataset_dir(&[("LCA_Disclosure_Data_FY2024_Q1.csv", body)]);
        let out = stats(&index, &StatsRequest::new(DatasetCategory::Lca), ScanBounds::STATS, None);

        assert_eq!(out.report.avg_wage, Some(40.0));
        assert_eq!(out.summary.stats.values_excluded, 1);
        assert_eq!(out.summary.issues.count(IssueKind::ValuesExcluded), 1);
    }

    #[test]
    fn test_stats_unknown_quarter_of_known_year() {
        let (_dir, index) = dataset_dir(&[("LCA_Disclosure_Data_FY2024_Q1.csv", LCA_2024)]);
        let request = StatsRequest {
            category: DatasetCategory::Lca,
            year: Some("2024".to_string()),
            quarter: Some("4".to_string()),
        };
        let out = stats(&index, &request, ScanBounds::STATS, None);

        assert_eq!(out.report.error.as_deref(), Some(NO_DATA_MESSAGE));
        assert_eq!(out.report.year, "2024");
        assert_eq!(out.report.quarter, "4");
    }

    #[test]
    fn test_columns_from_earliest_file() -> Result<()> {
        let (_dir, index) = dataset_dir(&[
            ("H-2A_Disclosure_Data_FY2023_Q1.csv", "CASE_STATUS,WAGE_OFFER\n"),
            ("H-2A_Disclosure_Data_FY2024_Q1.csv", "OTHER\n"),
        ]);

        assert_eq!(columns(&index, DatasetCategory::H2a)?, vec!["CASE_STATUS", "WAGE_OFFER"]);
        assert!(columns(&index, DatasetCategory::Lca)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_datasets_lists_categories_with_files() {
        let (_dir, index) = dataset_dir(&[("H-2B_Disclosure_FY2022_Q1.csv", "A\n")]);
        let available = datasets(&index);
        assert_eq!(available.len(), 1);
        assert_eq!(available["H-2B"].years, vec!["2022"]);
    }
}

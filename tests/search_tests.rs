mod common;
use common::*;

use proptest::prelude::*;
use std::path::PathBuf;
use visascan::matcher::SearchQuery;
use visascan::planner::ScanControl;
use visascan::service::{search, SearchRequest};
use visascan::{DatasetCategory, DatasetIndex, FieldValue, PaginationAccumulator, Record, ScanBounds, StopReason};

fn generous() -> ScanBounds {
    ScanBounds {
        max_files: 10,
        max_chunks_per_file: 1000,
        chunk_size: 3,
    }
}

fn request(query: &str, page: usize, limit: usize) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        page,
        limit,
        ..SearchRequest::new(DatasetCategory::Lca)
    }
}

fn case_numbers(results: &[Record]) -> Vec<String> {
    results
        .iter()
        .map(|r| r.get("CASE_NUMBER").as_str().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn test_pages_concatenate_to_one_large_page() {
    let data = DatasetDir::new();
    data.add("LCA_Disclosure_Data_FY2023_Q4.csv", &lca_rows(0, 11));
    data.add("LCA_Disclosure_Data_FY2024_Q1.csv", &lca_rows(100, 9));
    let index = DatasetIndex::scan_dir(data.path()).unwrap();

    let mut paged = Vec::new();
    for page in 1..=4 {
        let out = search(&index, &request("google", page, 2), generous(), None);
        paged.extend(case_numbers(&out.page.results));
    }
    let whole = search(&index, &request("google", 1, 8), generous(), None);

    assert_eq!(paged, case_numbers(&whole.page.results));
    assert_eq!(paged.len(), 6, "only six Google rows exist");
}

#[test]
fn test_listing_returns_first_rows_of_first_readable_file() {
    let data = DatasetDir::new();
    data.add("LCA_Disclosure_Data_FY2024_Q1.csv", LCA_HEADER);
    let second = data.add("LCA_Disclosure_Data_FY2024_Q2.csv", &lca_rows(0, 30));
    data.add("LCA_Disclosure_Data_FY2024_Q3.csv", &lca_rows(500, 30));

    // The first file is missing entirely, the second has only a header
    let missing = data.path().join("LCA_Disclosure_Data_FY2023_Q4.csv");
    let index = DatasetIndex::from_paths(vec![
        missing,
        data.path().join("LCA_Disclosure_Data_FY2024_Q1.csv"),
        second,
    ]);

    for page in [1, 3, 50] {
        let out = search(&index, &request("", page, 4), ScanBounds::SEARCH, None);
        assert_eq!(
            case_numbers(&out.page.results),
            vec!["I-200-00000", "I-200-00001", "I-200-00002", "I-200-00003"],
            "page {} should ignore the offset",
            page
        );
        assert_eq!(out.page.total, 4);
        assert_eq!(out.summary.stats.files_failed, 1);
    }
}

#[test]
fn test_no_match_is_empty_with_zero_total() {
    let data = DatasetDir::new();
    data.add("LCA_Disclosure_Data_FY2024_Q1.csv", &lca_rows(0, 25));
    let index = DatasetIndex::scan_dir(data.path()).unwrap();

    let out = search(&index, &request("no such employer", 1, 20), ScanBounds::SEARCH, None);
    assert!(out.page.results.is_empty());
    assert_eq!(out.page.total, 0);
    assert!(out.page.error.is_none());
}

#[test]
fn test_total_counts_only_the_scanned_prefix() {
    let data = DatasetDir::new();
    data.add("LCA_Disclosure_Data_FY2024_Q1.csv", &lca_rows(0, 40));
    let index = DatasetIndex::scan_dir(data.path()).unwrap();

    let bounds = ScanBounds {
        max_files: 1,
        max_chunks_per_file: 2,
        chunk_size: 5,
    };
    let out = search(&index, &request("engineer", 1, 100), bounds, None);

    assert_eq!(out.page.total, 10);
    assert_eq!(out.page.results.len(), 10);
    assert_eq!(out.summary.stop, StopReason::ChunkBound);
}

#[test]
fn test_page_fills_then_stops_early() {
    let data = DatasetDir::new();
    data.add("LCA_Disclosure_Data_FY2024_Q1.csv", &lca_rows(0, 40));
    data.add("LCA_Disclosure_Data_FY2024_Q2.csv", &lca_rows(100, 40));
    let index = DatasetIndex::scan_dir(data.path()).unwrap();

    let out = search(&index, &request("engineer", 1, 3), generous(), None);
    assert_eq!(out.page.results.len(), 3);
    assert_eq!(out.page.total, 3);
    assert_eq!(out.summary.stop, StopReason::Satisfied);
    assert_eq!(out.summary.stats.files_opened, 1);
}

#[test]
fn test_targeted_column_search() {
    let data = DatasetDir::new();
    data.add(
        "LCA_Disclosure_Data_FY2024_Q1.csv",
        "CASE_NUMBER,EMPLOYER_NAME,JOB_TITLE\n\
         A1,Data Corp,Clerk\n\
         A2,Acme,Data Engineer\n",
    );
    let index = DatasetIndex::scan_dir(data.path()).unwrap();

    let mut req = request("data", 1, 20);
    req.column = Some("JOB_TITLE".to_string());
    let out = search(&index, &req, ScanBounds::SEARCH, None);
    assert_eq!(case_numbers(&out.page.results), vec!["A2"]);

    req.column = None;
    let out = search(&index, &req, ScanBounds::SEARCH, None);
    assert_eq!(case_numbers(&out.page.results), vec!["A1", "A2"]);
}

#[test]
fn test_undecodable_field_does_not_hide_its_row() {
    let data = DatasetDir::new();
    data.add_bytes("LCA_Disclosure_Data_FY2024_Q1.csv", LATIN1_ROWS);
    let index = DatasetIndex::scan_dir(data.path()).unwrap();

    let out = search(&index, &request("acme", 1, 20), ScanBounds::SEARCH, None);
    assert_eq!(out.page.total, 2);
    assert_eq!(case_numbers(&out.page.results), vec!["A1", "A2"]);
    assert!(out.page.results[0].get("JOB_TITLE").is_absent());
    assert_eq!(out.summary.stats.rows_dropped, 0);

    // The undecodable title itself never matches
    let out = search(&index, &request("manager", 1, 20), ScanBounds::SEARCH, None);
    assert_eq!(out.page.total, 0);
}

#[test]
fn test_compressed_files_are_searched() {
    let data = DatasetDir::new();
    data.add_gz("H-2A_Disclosure_Data_FY2024_Q1.csv.gz", &lca_rows(0, 8));
    let index = DatasetIndex::scan_dir(data.path()).unwrap();

    let mut req = request("initech", 1, 20);
    req.category = DatasetCategory::H2a;
    let out = search(&index, &req, ScanBounds::SEARCH, None);

    assert_eq!(out.page.total, 2);
    assert_eq!(out.page.results[0].get("VISA_TYPE").as_str(), Some("H-2A"));
}

#[test]
fn test_zero_limit_opens_nothing() {
    let index = DatasetIndex::from_paths(vec![PathBuf::from("/nonexistent/LCA_Disclosure_Data_FY2024_Q1.csv")]);
    let out = search(&index, &request("x", 1, 0), ScanBounds::SEARCH, None);

    assert!(out.page.results.is_empty());
    assert_eq!(out.summary.stop, StopReason::Satisfied);
    assert_eq!(out.summary.stats.files_failed, 0);
}

fn numbered(ids: std::ops::Range<usize>) -> Vec<Record> {
    ids.map(|i| {
        let mut r = Record::new();
        r.set_field("id", FieldValue::Number(i as f64));
        r
    })
    .collect()
}

/// Drive one page over per-chunk match counts the way the planner would.
fn page_ids(chunk_matches: &[usize], page: usize, limit: usize) -> Vec<usize> {
    let query = SearchQuery::for_page("x", None, page, limit);
    let mut acc = PaginationAccumulator::new(&query);
    let mut next = 0;
    for &k in chunk_matches {
        let control = acc.push_matches(numbered(next..next + k));
        next += k;
        if control == ScanControl::Stop {
            break;
        }
    }
    acc.into_page(page)
        .results
        .iter()
        .filter_map(|r| r.get("id").to_number())
        .map(|n| n as usize)
        .collect()
}

proptest! {
    #[test]
    fn prop_pagination_is_consistent(
        chunk_matches in prop::collection::vec(0usize..8, 0..12),
        limit in 1usize..6,
        pages in 1usize..5,
    ) {
        let mut concatenated = Vec::new();
        for page in 1..=pages {
            let ids = page_ids(&chunk_matches, page, limit);
            prop_assert!(ids.len() <= limit);
            concatenated.extend(ids);
        }
        let whole = page_ids(&chunk_matches, 1, pages * limit);
        prop_assert_eq!(concatenated, whole);
    }

    #[test]
    fn prop_page_is_the_offset_window(
        chunk_matches in prop::collection::vec(0usize..8, 0..12),
        limit in 1usize..6,
        page in 1usize..6,
    ) {
        let total: usize = chunk_matches.iter().sum();
        let offset = (page - 1) * limit;
        let expected: Vec<usize> = (offset..total.min(offset + limit)).collect();
        prop_assert_eq!(page_ids(&chunk_matches, page, limit), expected);
    }
}

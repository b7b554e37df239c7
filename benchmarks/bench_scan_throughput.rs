use std::fs;
use std::hint::black_box;
use std::io::Cursor;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;

use visascan::readers::ChunkReader;
use visascan::service::{search, stats, SearchRequest, StatsRequest};
use visascan::{DatasetCategory, DatasetIndex, ScanBounds};

const ROWS_PER_FILE: usize = 20_000;

fn disclosure_csv(rows: usize, seed: usize) -> String {
    const EMPLOYERS: [&str; 6] = [
        "Google LLC",
        "Acme Corp",
        "Initech",
        "Globex",
        "Umbrella Inc",
        "Stark Industries",
    ];
    const STATUSES: [&str; 3] = ["Certified", "Denied", "Withdrawn"];

    let mut out = String::from(
        "CASE_NUMBER,CASE_STATUS,EMPLOYER_NAME,JOB_TITLE,WORKSITE_CITY,WAGE_RATE_OF_PAY_FROM,WAGE_UNIT_OF_PAY\n",
    );
    for i in 0..rows {
        let n = seed * rows + i;
        out.push_str(&format!(
            "I-200-{:07},{},{},Software Engineer {},Austin,{},Year\n",
            n,
            STATUSES[n % STATUSES.len()],
            EMPLOYERS[(n * 7) % EMPLOYERS.len()],
            n % 97,
            60_000 + (n % 500) * 100
        ));
    }
    out
}

fn dataset_dir(files: usize) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    for q in 0..files {
        let name = format!("LCA_Disclosure_Data_FY2024_Q{}.csv", q + 1);
        fs::write(dir.path().join(name), disclosure_csv(ROWS_PER_FILE, q)).expect("write dataset");
    }
    dir
}

fn bench_chunk_reader(c: &mut Criterion) {
    let csv = disclosure_csv(ROWS_PER_FILE, 0);
    let mut group = c.benchmark_group("chunk_reader");
    group.throughput(Throughput::Elements(ROWS_PER_FILE as u64));

    for chunk_size in [1_000, 20_000] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk_size), &chunk_size, |b, &size| {
            b.iter(|| {
                let reader = ChunkReader::from_reader(Cursor::new(csv.as_bytes()), "bench.csv", size)
                    .expect("header");
                black_box(reader.count());
            });
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let dir = dataset_dir(3);
    let index = DatasetIndex::scan_dir(dir.path()).expect("index");

    let mut group = c.benchmark_group("search");
    for (name, query) in [("rare", "stark"), ("absent", "no such employer"), ("listing", "")] {
        let request = SearchRequest {
            query: query.to_string(),
            ..SearchRequest::new(DatasetCategory::Lca)
        };
        group.bench_function(name, |b| {
            b.iter(|| black_box(search(&index, &request, ScanBounds::SEARCH, None)));
        });
    }
    group.finish();
}

fn bench_stats(c: &mut Criterion) {
    let dir = dataset_dir(1);
    let index = DatasetIndex::scan_dir(dir.path()).expect("index");
    let request = StatsRequest::new(DatasetCategory::Lca);

    c.bench_function("stats_default_bounds", |b| {
        b.iter(|| black_box(stats(&index, &request, ScanBounds::STATS, None)));
    });
}

criterion_group!(scan_benches, bench_chunk_reader, bench_search, bench_stats);
criterion_main!(scan_benches);

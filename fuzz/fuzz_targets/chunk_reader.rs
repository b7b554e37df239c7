#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use visascan::matcher::SearchQuery;
use visascan::planner::ChunkSink;
use visascan::readers::{ChunkOutcome, ChunkReader};
use visascan::PaginationAccumulator;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    // First byte picks the chunk size, the rest is the file body
    let chunk_size = (data[0] as usize % 16) + 1;
    let Ok(reader) = ChunkReader::from_reader(Cursor::new(&data[1..]), "fuzz.csv", chunk_size) else {
        return;
    };

    let query = SearchQuery::for_page("a", None, 1, 5);
    let mut acc = PaginationAccumulator::new(&query);
    let mut rows = 0;
    for outcome in reader {
        if let ChunkOutcome::Chunk(chunk) = outcome {
            assert!(chunk.len() <= chunk_size);
            rows += chunk.len();
            acc.consume(chunk);
        }
    }
    let page = acc.into_page(1);
    assert!(page.results.len() <= 5);
    assert!(page.total <= rows);
});

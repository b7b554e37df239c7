#![no_main]

use libfuzzer_sys::fuzz_target;
use visascan::config_file::ConfigFile;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Errors are fine; panics are not
        let _ = ConfigFile::parse_ini_content(input);
    }
});

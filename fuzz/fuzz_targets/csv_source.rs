#![no_main]

use claimscreen::config::ColumnMap;
use claimscreen::source::{parse_amount, parse_count, CsvRecordSource};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Any byte stream either fails to open or yields rows/errors; never panics
    if let Ok(source) = CsvRecordSource::from_reader(data, &ColumnMap::default()) {
        for row in source.flatten() {
            assert!(row.record.total_paid.is_finite());
            assert!(row.record.total_paid >= 0.0);
        }
    }

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = parse_count(text);
        let _ = parse_amount(text);
    }
});

#![no_main]
use libfuzzer_sys::fuzz_target;

use covrun::collect::UnifiedModel;
use covrun::summary::CoverageSummary;

fuzz_target!(|data: &[u8]| {
    // Reading and summarizing must not panic on any input.
    if let Ok(doc) = covrun::model::CoverageDocument::from_slice(data) {
        for file in doc.files() {
            let _ = CoverageSummary::for_file(file);
        }
        let _ = covrun::report::lcov::LcovReport::render(&UnifiedModel::from(doc));
    }
});

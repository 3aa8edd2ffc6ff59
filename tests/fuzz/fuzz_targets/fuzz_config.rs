#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Migration and validation must not panic on any input.
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) {
        let _ = covrun::config::Options::from_value(value);
    }
});

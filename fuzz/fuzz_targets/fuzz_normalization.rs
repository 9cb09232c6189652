#![no_main]
use libfuzzer_sys::fuzz_target;
use sensitive_gateway::normalize::normalize;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // normalize() must never panic on arbitrary UTF-8 input, must never
        // grow the input, and must be idempotent.
        let once = normalize(s);
        assert!(once.chars().count() <= s.chars().count());
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }
});

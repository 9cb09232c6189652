#![no_main]
use libfuzzer_sys::fuzz_target;
use sensitive_gateway::matcher::{AcAutomaton, DfaVerifier};
use std::sync::Arc;

const TERMS: &[&str] = &["暴力", "辱骂", "kill", "k.i.l.l", "ＡＢＣ"];

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let terms: Vec<Arc<str>> = TERMS.iter().map(|t| Arc::from(*t)).collect();
        let ac = AcAutomaton::build(&terms);
        let dfa = DfaVerifier::build(&terms);

        // AC hits must always be drawn from the known term set (property 3).
        let scan = ac.scan(text);
        let known: std::collections::HashSet<&str> = TERMS.iter().copied().collect();
        for hit in &scan.hits {
            assert!(known.contains(hit.as_ref()));
        }

        // DFA must never panic over arbitrary suspicious segments.
        let _ = dfa.verify(scan.suspicious_segments.iter().map(String::as_str));
    }
});

//! Hand-built trie-shaped DFA verifier.
//!
//! Runs over **raw** (unnormalized) text, restricted to the suspicious
//! segments the AC stage suggests — it verifies what AC suggested, it does
//! not independently re-scan the full text. If AC returns no segments, the
//! DFA contributes no hits even if the raw text happens to contain a
//! literal term; that behavior is preserved verbatim from the source
//! system's design and is deliberate, not an oversight.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const ROOT: usize = 0;

#[derive(Debug, Default)]
struct DfaState {
    transitions: HashMap<char, usize>,
    terminal: bool,
}

/// Trie-shaped DFA over a fixed term set, used to confirm literal substring
/// presence in text. Unlike [`super::ac::AcAutomaton`] it has no failure
/// links — a run simply stops the moment no transition exists.
#[derive(Debug)]
pub struct DfaVerifier {
    states: Vec<DfaState>,
}

impl DfaVerifier {
    /// Build a trie of `terms`, assigning each `(state, char)` transition a
    /// fresh state id.
    #[must_use]
    pub fn build(terms: &[Arc<str>]) -> Self {
        let mut states = vec![DfaState::default()];
        for term in terms {
            let mut current = ROOT;
            for ch in term.chars() {
                current = *states[current]
                    .transitions
                    .entry(ch)
                    .or_insert_with(|| {
                        states.push(DfaState::default());
                        states.len() - 1
                    });
            }
            states[current].terminal = true;
        }
        Self { states }
    }

    /// Verify `raw_text` against `segments` (each a substring of the raw,
    /// unnormalized text). Every starting position within every segment is
    /// tried; a run consumes characters until no transition exists or the
    /// segment ends, and every terminal state reached along the way yields
    /// a confirmed hit.
    #[must_use]
    pub fn verify<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
        let mut hits = HashSet::new();
        for segment in segments {
            let chars: Vec<char> = segment.chars().collect();
            for start in 0..chars.len() {
                let mut current = ROOT;
                for (offset, &ch) in chars[start..].iter().enumerate() {
                    let Some(&next) = self.states[current].transitions.get(&ch) else {
                        break;
                    };
                    current = next;
                    if self.states[current].terminal {
                        let matched: String = chars[start..=start + offset].iter().collect();
                        hits.insert(matched);
                    }
                }
            }
        }
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(words: &[&str]) -> Vec<Arc<str>> {
        words.iter().map(|w| Arc::from(*w)).collect()
    }

    #[test]
    fn literal_match_is_confirmed() {
        let dfa = DfaVerifier::build(&terms(&["暴力"]));
        let hits = dfa.verify(["这是暴力行为"]);
        assert!(hits.contains("暴力"));
    }

    #[test]
    fn normalization_exposed_term_is_not_confirmed_on_raw_text() {
        // "k i l l" never contains the literal substring "kill".
        let dfa = DfaVerifier::build(&terms(&["kill"]));
        let hits = dfa.verify(["k i l l"]);
        assert!(hits.is_empty());
    }

    #[test]
    fn empty_segments_yield_no_hits_even_if_raw_text_has_a_literal_term() {
        // This documents the "verify what AC suggested" semantics: DFA never
        // independently scans, even though "kill" appears literally below.
        let dfa = DfaVerifier::build(&terms(&["kill"]));
        let hits = dfa.verify(std::iter::empty());
        assert!(hits.is_empty());
        // Sanity: the same DFA *would* find it if given the segment.
        let hits_with_segment = dfa.verify(["a kill b"]);
        assert!(hits_with_segment.contains("kill"));
    }

    #[test]
    fn no_match_for_unrelated_text() {
        let dfa = DfaVerifier::build(&terms(&["暴力", "辱骂"]));
        let hits = dfa.verify(["今天天气真好"]);
        assert!(hits.is_empty());
    }

    #[test]
    fn punctuation_bearing_terms_match_raw_text() {
        let dfa = DfaVerifier::build(&terms(&["k.i.l.l"]));
        let hits = dfa.verify(["say k.i.l.l now"]);
        assert!(hits.contains("k.i.l.l"));
    }
}

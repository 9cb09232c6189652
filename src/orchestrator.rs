//! [`Orchestrator`] — decides whether to invoke the LLM based on rule-engine
//! output and the caller's mode, and assembles the [`DetectionRecord`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::active_set::ActiveSet;
use crate::llm::{LlmAdapter, LlmVerdict, WarmupTracker};
use crate::normalize;

/// The per-request mode a caller supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Run the rule engine first; only call the LLM if it found something.
    Default,
    /// Skip the rule stages entirely; the LLM alone decides.
    Strict,
    /// Like `Strict`, but the LLM receives normalized rather than raw text.
    /// The fixed mode for document uploads.
    DocumentStrict,
}

/// Which stages participated in producing a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Only the rule engine ran; the LLM was not called.
    RuleOnly,
    /// The rule engine ran and flagged something, so the LLM was called too.
    RuleThenLlm,
    /// `Strict` or `DocumentStrict`: the rule stages were skipped entirely.
    StrictMode,
}

/// The final binary classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Classified as sensitive.
    Sensitive,
    /// Classified as normal.
    Normal,
}

/// What the LLM stage contributed to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmOutcome {
    /// The LLM was not invoked for this request.
    Skipped,
    /// The LLM was invoked and returned this verdict (after coercion).
    Called(Verdict),
}

/// Per-stage timings, millisecond precision, rounded to two decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timings {
    /// Time spent in the normalizer.
    pub normalize_ms: f64,
    /// Time spent scanning with the AC automaton.
    pub ac_ms: f64,
    /// Time spent verifying with the DFA.
    pub dfa_ms: f64,
    /// Time spent waiting on the LLM adapter (0 if skipped).
    pub llm_ms: f64,
    /// Total wall-clock time for the request.
    pub total_ms: f64,
}

fn round_ms(elapsed: std::time::Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

/// The full transient result of one detection request. Hit and segment
/// fields are sets; their iteration order is not observable.
#[derive(Debug, Clone)]
pub struct DetectionRecord {
    /// Text after normalization (empty string for strict mode, which skips
    /// the rule stages).
    pub normalized_text: String,
    /// Terms the AC stage recognized in normalized text.
    pub ac_hits: HashSet<Arc<str>>,
    /// Terms the DFA stage confirmed against raw text.
    pub dfa_hits: HashSet<String>,
    /// Windowed substrings the AC stage flagged for DFA verification.
    pub suspicious_segments: HashSet<String>,
    /// `ac_hits ∪ dfa_hits`, as strings.
    pub merged_hits: HashSet<String>,
    /// What the LLM stage contributed.
    pub llm_verdict: LlmOutcome,
    /// Per-stage timings.
    pub timings: Timings,
    /// Which stages participated.
    pub flow: Flow,
    /// The final binary classification.
    pub final_verdict: Verdict,
}

/// Errors the orchestrator itself can raise. Library and active-set errors
/// are distinct types (see [`crate::library::LibraryError`] and
/// [`crate::active_set::ActiveSetError`]) surfaced at a higher level, not
/// wrapped here — the orchestrator's own contract is narrow.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// The supplied text was empty or whitespace-only.
    #[error("input text is empty")]
    EmptyInput,
}

/// Runs the fixed normalize → AC → DFA → optional-LLM pipeline for a single
/// request.
pub struct Orchestrator<'a> {
    active_set: &'a ActiveSet,
    llm: &'a dyn LlmAdapter,
    warmup: &'a WarmupTracker,
}

impl<'a> Orchestrator<'a> {
    /// Build an orchestrator over a specific `ActiveSet` snapshot and LLM
    /// adapter. Callers acquire the snapshot once (via
    /// [`crate::active_set::ActiveSetHolder::snapshot`]) and hold it for the
    /// whole request.
    #[must_use]
    pub fn new(active_set: &'a ActiveSet, llm: &'a dyn LlmAdapter, warmup: &'a WarmupTracker) -> Self {
        Self {
            active_set,
            llm,
            warmup,
        }
    }

    /// Run detection over `text` in `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::EmptyInput`] if `text` is empty or
    /// whitespace-only.
    pub async fn detect(&self, text: &str, mode: Mode) -> Result<DetectionRecord, OrchestratorError> {
        if text.trim().is_empty() {
            return Err(OrchestratorError::EmptyInput);
        }

        let total_start = Instant::now();

        match mode {
            Mode::Default => self.detect_default(text, total_start).await,
            Mode::Strict => self.detect_strict(text, total_start).await,
            Mode::DocumentStrict => self.detect_document_strict(text, total_start).await,
        }
    }

    async fn detect_default(&self, text: &str, total_start: Instant) -> Result<DetectionRecord, OrchestratorError> {
        let normalize_start = Instant::now();
        let normalized = normalize::normalize(text);
        let normalize_ms = round_ms(normalize_start.elapsed());

        let ac_start = Instant::now();
        let scan = self.active_set.scan(&normalized);
        let ac_ms = round_ms(ac_start.elapsed());

        let dfa_start = Instant::now();
        let dfa_hits = self
            .active_set
            .verify(scan.suspicious_segments.iter().map(String::as_str));
        let dfa_ms = round_ms(dfa_start.elapsed());

        let merged_hits: HashSet<String> = scan
            .hits
            .iter()
            .map(|t| t.to_string())
            .chain(dfa_hits.iter().cloned())
            .collect();

        if merged_hits.is_empty() {
            return Ok(DetectionRecord {
                normalized_text: normalized.into_owned(),
                ac_hits: scan.hits,
                dfa_hits,
                suspicious_segments: scan.suspicious_segments,
                merged_hits,
                llm_verdict: LlmOutcome::Skipped,
                timings: Timings {
                    normalize_ms,
                    ac_ms,
                    dfa_ms,
                    llm_ms: 0.0,
                    total_ms: round_ms(total_start.elapsed()),
                },
                flow: Flow::RuleOnly,
                final_verdict: Verdict::Normal,
            });
        }

        let llm_start = Instant::now();
        let verdict = self.call_llm(text).await;
        let llm_ms = round_ms(llm_start.elapsed());

        Ok(DetectionRecord {
            normalized_text: normalized.into_owned(),
            ac_hits: scan.hits,
            dfa_hits,
            suspicious_segments: scan.suspicious_segments,
            merged_hits,
            llm_verdict: LlmOutcome::Called(verdict),
            timings: Timings {
                normalize_ms,
                ac_ms,
                dfa_ms,
                llm_ms,
                total_ms: round_ms(total_start.elapsed()),
            },
            flow: Flow::RuleThenLlm,
            final_verdict: verdict,
        })
    }

    async fn detect_strict(&self, text: &str, total_start: Instant) -> Result<DetectionRecord, OrchestratorError> {
        let llm_start = Instant::now();
        let verdict = self.call_llm(text).await;
        let llm_ms = round_ms(llm_start.elapsed());

        Ok(DetectionRecord {
            normalized_text: String::new(),
            ac_hits: HashSet::new(),
            dfa_hits: HashSet::new(),
            suspicious_segments: HashSet::new(),
            merged_hits: HashSet::new(),
            llm_verdict: LlmOutcome::Called(verdict),
            timings: Timings {
                normalize_ms: 0.0,
                ac_ms: 0.0,
                dfa_ms: 0.0,
                llm_ms,
                total_ms: round_ms(total_start.elapsed()),
            },
            flow: Flow::StrictMode,
            final_verdict: verdict,
        })
    }

    async fn detect_document_strict(&self, text: &str, total_start: Instant) -> Result<DetectionRecord, OrchestratorError> {
        let normalize_start = Instant::now();
        let normalized = normalize::normalize(text);
        let normalize_ms = round_ms(normalize_start.elapsed());

        let llm_start = Instant::now();
        let verdict = self.call_llm(&normalized).await;
        let llm_ms = round_ms(llm_start.elapsed());

        Ok(DetectionRecord {
            normalized_text: normalized.into_owned(),
            ac_hits: HashSet::new(),
            dfa_hits: HashSet::new(),
            suspicious_segments: HashSet::new(),
            merged_hits: HashSet::new(),
            llm_verdict: LlmOutcome::Called(verdict),
            timings: Timings {
                normalize_ms,
                ac_ms: 0.0,
                dfa_ms: 0.0,
                llm_ms,
                total_ms: round_ms(total_start.elapsed()),
            },
            flow: Flow::StrictMode,
            final_verdict: verdict,
        })
    }

    async fn call_llm(&self, text: &str) -> Verdict {
        let verdict = self.llm.classify(text).await;
        self.warmup.record_call();
        match verdict {
            LlmVerdict::Sensitive => Verdict::Sensitive,
            LlmVerdict::Normal => Verdict::Normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::WordLibraryStore;
    use async_trait::async_trait;

    struct FixedAdapter(LlmVerdict);

    #[async_trait]
    impl LlmAdapter for FixedAdapter {
        async fn classify(&self, _text: &str) -> LlmVerdict {
            self.0
        }
    }

    fn build_set(libs: &[(&str, &[&str])]) -> ActiveSet {
        let dir = tempfile::tempdir().unwrap();
        let store = WordLibraryStore::open(dir.path()).unwrap();
        let mut names = Vec::new();
        for (name, terms) in libs {
            let terms: Vec<String> = terms.iter().map(|s| s.to_string()).collect();
            store.create(name, &terms).unwrap();
            names.push((*name).to_string());
        }
        ActiveSet::build(&store, &names).unwrap()
    }

    #[tokio::test]
    async fn default_mode_with_no_hits_skips_llm() {
        let set = build_set(&[("l1", &["暴力", "辱骂"])]);
        let llm = FixedAdapter(LlmVerdict::Sensitive);
        let warmup = WarmupTracker::new();
        let orchestrator = Orchestrator::new(&set, &llm, &warmup);

        let record = orchestrator.detect("今天天气真好", Mode::Default).await.unwrap();
        assert!(record.ac_hits.is_empty());
        assert!(record.dfa_hits.is_empty());
        assert_eq!(record.flow, Flow::RuleOnly);
        assert_eq!(record.final_verdict, Verdict::Normal);
        assert_eq!(record.llm_verdict, LlmOutcome::Skipped);
    }

    #[tokio::test]
    async fn default_mode_with_a_hit_calls_llm_and_takes_its_verdict() {
        let set = build_set(&[("l1", &["暴力", "辱骂"])]);
        let llm = FixedAdapter(LlmVerdict::Sensitive);
        let warmup = WarmupTracker::new();
        let orchestrator = Orchestrator::new(&set, &llm, &warmup);

        let record = orchestrator.detect("这是暴力行为", Mode::Default).await.unwrap();
        assert!(record.ac_hits.iter().any(|t| &**t == "暴力"));
        assert!(record.dfa_hits.contains("暴力"));
        assert_eq!(record.flow, Flow::RuleThenLlm);
        assert_eq!(record.final_verdict, Verdict::Sensitive);
        assert_eq!(record.llm_verdict, LlmOutcome::Called(Verdict::Sensitive));
    }

    #[tokio::test]
    async fn normalization_obfuscation_is_caught_by_ac_but_not_dfa() {
        let set = build_set(&[("l2", &["kill"])]);
        let llm = FixedAdapter(LlmVerdict::Normal);
        let warmup = WarmupTracker::new();
        let orchestrator = Orchestrator::new(&set, &llm, &warmup);

        let record = orchestrator.detect("k i l l", Mode::Default).await.unwrap();
        assert!(record.ac_hits.iter().any(|t| &**t == "kill"));
        assert!(record.dfa_hits.is_empty());
        assert!(record.merged_hits.contains("kill"));
        assert_eq!(record.flow, Flow::RuleThenLlm);
    }

    #[tokio::test]
    async fn fullwidth_term_is_not_normalized_so_it_never_matches_halfwidth_text() {
        let set = build_set(&[("l3", &["\u{FF21}\u{FF22}\u{FF23}"])]);
        let llm = FixedAdapter(LlmVerdict::Sensitive);
        let warmup = WarmupTracker::new();
        let orchestrator = Orchestrator::new(&set, &llm, &warmup);

        let record = orchestrator.detect("ABC", Mode::Default).await.unwrap();
        assert!(record.ac_hits.is_empty());
        assert_eq!(record.final_verdict, Verdict::Normal);
    }

    #[tokio::test]
    async fn sibling_scenario_ascii_term_matches_fullwidth_text_after_normalization() {
        let set = build_set(&[("l3", &["ABC"])]);
        let llm = FixedAdapter(LlmVerdict::Sensitive);
        let warmup = WarmupTracker::new();
        let orchestrator = Orchestrator::new(&set, &llm, &warmup);

        let record = orchestrator
            .detect("\u{FF21}\u{FF22}\u{FF23}", Mode::Default)
            .await
            .unwrap();
        assert!(record.ac_hits.iter().any(|t| &**t == "ABC"));
    }

    #[tokio::test]
    async fn strict_mode_always_calls_llm_with_empty_rule_fields() {
        let set = build_set(&[("l1", &["暴力"])]);
        let llm = FixedAdapter(LlmVerdict::Normal);
        let warmup = WarmupTracker::new();
        let orchestrator = Orchestrator::new(&set, &llm, &warmup);

        let record = orchestrator.detect("这是暴力行为", Mode::Strict).await.unwrap();
        assert!(record.ac_hits.is_empty());
        assert!(record.dfa_hits.is_empty());
        assert_eq!(record.flow, Flow::StrictMode);
        assert_eq!(record.final_verdict, Verdict::Normal);
    }

    #[tokio::test]
    async fn empty_active_set_default_mode_is_always_normal() {
        let set = ActiveSet::empty();
        let llm = FixedAdapter(LlmVerdict::Sensitive);
        let warmup = WarmupTracker::new();
        let orchestrator = Orchestrator::new(&set, &llm, &warmup);

        let record = orchestrator.detect("这是暴力行为", Mode::Default).await.unwrap();
        assert_eq!(record.flow, Flow::RuleOnly);
        assert_eq!(record.final_verdict, Verdict::Normal);
        assert_eq!(record.llm_verdict, LlmOutcome::Skipped);
    }

    #[tokio::test]
    async fn empty_input_is_rejected_in_every_mode() {
        let set = build_set(&[("l1", &["暴力"])]);
        let llm = FixedAdapter(LlmVerdict::Normal);
        let warmup = WarmupTracker::new();
        let orchestrator = Orchestrator::new(&set, &llm, &warmup);

        for mode in [Mode::Default, Mode::Strict, Mode::DocumentStrict] {
            let err = orchestrator.detect("   ", mode).await.unwrap_err();
            assert_eq!(err, OrchestratorError::EmptyInput);
        }
    }

    #[tokio::test]
    async fn document_strict_mode_sends_normalized_text_to_the_llm() {
        struct CapturingAdapter {
            seen: std::sync::Mutex<Vec<String>>,
        }

        #[async_trait]
        impl LlmAdapter for CapturingAdapter {
            async fn classify(&self, text: &str) -> LlmVerdict {
                self.seen.lock().unwrap().push(text.to_string());
                LlmVerdict::Normal
            }
        }

        let set = build_set(&[("l1", &["暴力"])]);
        let llm = CapturingAdapter { seen: std::sync::Mutex::new(Vec::new()) };
        let warmup = WarmupTracker::new();
        let orchestrator = Orchestrator::new(&set, &llm, &warmup);

        orchestrator
            .detect("k.i.l.l 今天天气！", Mode::DocumentStrict)
            .await
            .unwrap();

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen[0], normalize::normalize("k.i.l.l 今天天气！").into_owned());
    }
}

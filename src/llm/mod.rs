//! The [`LlmAdapter`] contract the orchestrator consumes, and the
//! process-wide [`WarmupStatus`] tracker.
//!
//! The core never depends on a specific inference backend — only on this
//! trait. [`http`] supplies one concrete implementation, gated behind the
//! `moderation-remote` feature, grounded in the single backend this system
//! has historically shipped against.

#[cfg(feature = "moderation-remote")]
pub mod http;

use std::sync::RwLock;
use std::time::SystemTime;

use async_trait::async_trait;

/// The binary verdict an [`LlmAdapter`] returns for a single piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmVerdict {
    /// The adapter judged the text sensitive.
    Sensitive,
    /// The adapter judged the text normal, including every degraded case:
    /// transport failure, timeout, or a malformed/unexpected response. The
    /// orchestrator never learns *why* a verdict came back `Normal` by
    /// degradation versus genuine classification — that distinction is
    /// only visible in the logs.
    Normal,
}

/// Opaque text-in / verdict-out contract. Implementations may call out to a
/// remote inference server; they are expected to enforce their own timeout
/// and to coerce any transport failure or unexpected output to
/// [`LlmVerdict::Normal`] rather than propagating an error — the
/// orchestrator must never fail a detection request because the LLM is
/// unavailable.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Classify `text`, coercing any failure to [`LlmVerdict::Normal`].
    async fn classify(&self, text: &str) -> LlmVerdict;
}

/// Tracks whether the LLM backend has been exercised since process start.
#[derive(Debug, Clone, Copy, Default)]
pub struct WarmupStatus {
    /// Whether at least one warm-up call has succeeded.
    pub warmed_up: bool,
    /// When warm-up first succeeded.
    pub warmed_up_at: Option<SystemTime>,
    /// When the most recent call (warm-up or request-driven) completed.
    pub last_call_at: Option<SystemTime>,
}

/// Process-wide holder for [`WarmupStatus`]. Write-rarely, read-occasionally
/// — a plain lock is the right tool, not an atomic pointer swap.
#[derive(Debug, Default)]
pub struct WarmupTracker {
    status: RwLock<WarmupStatus>,
}

impl WarmupTracker {
    /// A tracker reporting no warm-up has happened yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> WarmupStatus {
        *self.status.read().expect("warmup tracker lock poisoned")
    }

    /// Record that a call (warm-up or request-driven) has just completed
    /// successfully against the backend, updating `last_call_at` and, the
    /// first time this is called, `warmed_up`/`warmed_up_at`.
    pub fn record_call(&self) {
        let now = SystemTime::now();
        let mut status = self.status.write().expect("warmup tracker lock poisoned");
        status.last_call_at = Some(now);
        if !status.warmed_up {
            status.warmed_up = true;
            status.warmed_up_at = Some(now);
        }
    }

    /// Perform warm-up by issuing `probes` benign classification calls
    /// against `adapter`. Failure of any individual probe is non-fatal —
    /// warm-up degrades silently rather than blocking startup, matching the
    /// orchestrator's general "dependency faults degrade" policy.
    pub async fn warm_up(&self, adapter: &dyn LlmAdapter, probes: &[String]) {
        for probe in probes {
            let _ = adapter.classify(probe).await;
            self.record_call();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysNormal;

    #[async_trait]
    impl LlmAdapter for AlwaysNormal {
        async fn classify(&self, _text: &str) -> LlmVerdict {
            LlmVerdict::Normal
        }
    }

    #[tokio::test]
    async fn fresh_tracker_reports_not_warmed_up() {
        let tracker = WarmupTracker::new();
        let status = tracker.status();
        assert!(!status.warmed_up);
        assert!(status.warmed_up_at.is_none());
        assert!(status.last_call_at.is_none());
    }

    #[tokio::test]
    async fn warm_up_marks_tracker_warmed_after_probes() {
        let tracker = WarmupTracker::new();
        let adapter = AlwaysNormal;
        tracker.warm_up(&adapter, &["probe one".to_string(), "probe two".to_string()]).await;
        let status = tracker.status();
        assert!(status.warmed_up);
        assert!(status.warmed_up_at.is_some());
        assert!(status.last_call_at.is_some());
    }

    #[tokio::test]
    async fn warm_up_with_no_probes_is_a_no_op() {
        let tracker = WarmupTracker::new();
        let adapter = AlwaysNormal;
        tracker.warm_up(&adapter, &[]).await;
        assert!(!tracker.status().warmed_up);
    }
}

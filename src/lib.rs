//! ```text
//! GatewayConfig ──► Gateway::open ──┬─► WordLibraryStore ──► ActiveSetHolder
//!                                   │                          │
//!                                   │                          ├─► AcAutomaton
//!                                   │                          └─► DfaVerifier
//!                                   │
//!                                   ├─► Orchestrator ──► normalize → AC → DFA → LlmAdapter?
//!                                   │
//!                                   └─► WarmupTracker
//! ```
//!
//! # sensitive-gateway
//!
//! A content-safety gateway that classifies user-supplied text as
//! **sensitive** or **normal**, combining a high-throughput multi-pattern
//! rule engine with an optional second-stage LLM classifier.
//!
//! The rule engine is a two-stage matcher: an [`matcher::ac::AcAutomaton`]
//! scans [`normalize`]d text for recall, and a [`matcher::dfa::DfaVerifier`]
//! re-checks the raw text to confirm literal matches and suppress false
//! positives the normalizer's folding introduced. The gateway is tuned for
//! low-latency online use — bulk benign traffic never reaches the LLM.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sensitive_gateway::config::GatewayConfigBuilder;
//! use sensitive_gateway::gateway::Gateway;
//! use sensitive_gateway::orchestrator::Mode;
//!
//! let config = GatewayConfigBuilder::new().with_env().build()?;
//! let llm = Arc::new(sensitive_gateway::llm::http::HttpLlmAdapter::new(
//!     Default::default(),
//! ));
//! let gateway = Gateway::open(&config, llm)?;
//! let record = gateway.detect_text("这是暴力行为", Mode::Default).await?;
//! ```
//!
//! ## Modules
//!
//! - [`normalize`] — the cosmetic-variant folding applied to input text only.
//! - [`library`] — persistent CRUD over named word lists ([`library::WordLibraryStore`]).
//! - [`matcher`] — the AC automaton and DFA verifier.
//! - [`active_set`] — the immutable (terms, AC, DFA) snapshot and its atomic hot-reload holder.
//! - [`orchestrator`] — mode handling and LLM-invocation policy.
//! - [`llm`] — the [`llm::LlmAdapter`] contract, warm-up tracking, and the concrete HTTP backend.
//! - [`config`] — the ambient, process-wide [`config::GatewayConfig`].
//! - [`document`] — the trivial `text/plain` document-ingestion shim.
//! - [`gateway`] — the facade wiring everything into the external API.

#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod active_set;
pub mod config;
pub mod document;
pub mod gateway;
pub mod library;
pub mod llm;
pub mod matcher;
pub mod normalize;
pub mod orchestrator;

/// Re-exports for convenient access to the crate's core types.
pub mod prelude {
    pub use crate::active_set::{ActiveSet, ActiveSetHolder, DetectionConfig};
    pub use crate::config::{GatewayConfig, GatewayConfigBuilder};
    pub use crate::gateway::{ActiveSetSummary, Gateway, GatewayError};
    pub use crate::library::{LibraryInfo, Term, WordLibraryStore};
    pub use crate::llm::{LlmAdapter, LlmVerdict, WarmupStatus, WarmupTracker};
    pub use crate::normalize::normalize;
    pub use crate::orchestrator::{DetectionRecord, Flow, Mode, Orchestrator, Verdict};
}

//! The two-stage matcher: an Aho–Corasick automaton for recall over
//! normalized text, and a DFA verifier for precision over raw text.
//!
//! Both are built from exactly the same term set by [`crate::active_set`] and
//! neither is ever mutated after construction — a hot reload builds fresh
//! instances of both and swaps them in together.

pub mod ac;
pub mod dfa;

pub use ac::AcAutomaton;
pub use dfa::DfaVerifier;

//! Hand-built Aho–Corasick automaton.
//!
//! Building this automaton — not merely calling into an existing
//! implementation — is the point: failure links are computed by an explicit
//! breadth-first work queue, never recursion, so construction depth is
//! independent of term length (term lists are operator-supplied and
//! effectively unbounded).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

const ROOT: usize = 0;

/// One node of the trie. `fail` is a non-owning back-reference (an index)
/// into the same node arena; it is only meaningful after [`AcAutomaton::build`]
/// has run its failure-link pass.
#[derive(Debug, Default)]
struct AcNode {
    children: HashMap<char, usize>,
    fail: usize,
    /// Terms accepted when this node is reached, including terms inherited
    /// through failure links during construction.
    output: Vec<Arc<str>>,
}

/// The result of scanning text against an [`AcAutomaton`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Deduplicated terms recognized in the text.
    pub hits: HashSet<Arc<str>>,
    /// Deduplicated suspicious segments: windows of the scanned text around
    /// each hit, handed to the DFA verifier for confirmation against raw
    /// text.
    pub suspicious_segments: HashSet<String>,
}

/// Multi-pattern automaton with failure links, built once per
/// [`crate::active_set::ActiveSet`] and immutable thereafter.
#[derive(Debug)]
pub struct AcAutomaton {
    nodes: Vec<AcNode>,
}

/// Width, in characters, of context kept on either side of a hit when
/// extracting the suspicious segment handed to the DFA verifier.
const HALO: usize = 5;

impl AcAutomaton {
    /// Build an automaton over `terms`. Terms are inserted character by
    /// character from the root; a breadth-first traversal over an explicit
    /// work queue then computes failure links and merges inherited output.
    #[must_use]
    pub fn build(terms: &[Arc<str>]) -> Self {
        let mut nodes = vec![AcNode::default()];

        for term in terms {
            let mut current = ROOT;
            for ch in term.chars() {
                current = *nodes[current].children.entry(ch).or_insert_with(|| {
                    nodes.push(AcNode::default());
                    nodes.len() - 1
                });
            }
            nodes[current].output.push(Arc::clone(term));
        }

        let mut automaton = Self { nodes };
        automaton.compute_failure_links();
        automaton
    }

    fn compute_failure_links(&mut self) {
        let mut queue: VecDeque<usize> = VecDeque::new();

        // Depth-1 nodes fail to the root by definition.
        let root_children: Vec<(char, usize)> = self.nodes[ROOT]
            .children
            .iter()
            .map(|(&c, &n)| (c, n))
            .collect();
        for (_, child) in root_children {
            self.nodes[child].fail = ROOT;
            queue.push_back(child);
        }

        while let Some(current) = queue.pop_front() {
            let children: Vec<(char, usize)> = self.nodes[current]
                .children
                .iter()
                .map(|(&c, &n)| (c, n))
                .collect();
            for (ch, child) in children {
                let mut fallback = self.nodes[current].fail;
                while fallback != ROOT && !self.nodes[fallback].children.contains_key(&ch) {
                    fallback = self.nodes[fallback].fail;
                }
                let fail_target = self.nodes[fallback]
                    .children
                    .get(&ch)
                    .copied()
                    .unwrap_or(ROOT);
                self.nodes[child].fail = fail_target;

                let inherited = self.nodes[fail_target].output.clone();
                self.nodes[child].output.extend(inherited);

                queue.push_back(child);
            }
        }
    }

    /// Scan `text` in a single left-to-right pass, returning deduplicated
    /// hits and the suspicious segments surrounding them.
    #[must_use]
    pub fn scan(&self, text: &str) -> ScanResult {
        let chars: Vec<char> = text.chars().collect();
        let mut result = ScanResult::default();
        let mut current = ROOT;

        for (i, &ch) in chars.iter().enumerate() {
            while current != ROOT && !self.nodes[current].children.contains_key(&ch) {
                current = self.nodes[current].fail;
            }
            current = self.nodes[current]
                .children
                .get(&ch)
                .copied()
                .unwrap_or(ROOT);

            for term in &self.nodes[current].output {
                result.hits.insert(Arc::clone(term));

                let term_len = term.chars().count();
                let start = i.saturating_sub(term_len + HALO);
                let end = (i + HALO).min(chars.len());
                let segment: String = chars[start..end].iter().collect();
                result.suspicious_segments.insert(segment);
            }
        }

        result
    }
}

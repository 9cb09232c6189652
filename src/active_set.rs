//! [`ActiveSet`] — the immutable snapshot of (terms, AC, DFA) used for
//! detection, and [`DetectionConfig`] — the persisted record of which
//! libraries are active across restarts.
//!
//! A reload never rebuilds in place: a new `ActiveSet` is built from scratch,
//! behind a fresh `Arc`, then swapped into the process-wide holder. Requests
//! already in flight keep the `Arc` they acquired at the start of the
//! request, so a concurrent reload never tears their view of the world.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::library::{LibraryError, WordLibraryStore};
use crate::matcher::{AcAutomaton, DfaVerifier};

/// Errors raised while building or persisting an [`ActiveSet`].
#[derive(Debug, Error)]
pub enum ActiveSetError {
    /// A named library could not be read from the store.
    #[error(transparent)]
    Library(#[from] LibraryError),

    /// The persisted `detection_config.json` could not be written.
    #[error("failed to persist detection config: {0}")]
    Persist(#[source] std::io::Error),
}

/// An immutable snapshot of the currently active libraries and the automata
/// built over their combined term set.
pub struct ActiveSet {
    /// Library names that make up this snapshot, in the order requested.
    used_libraries: Vec<String>,
    /// Deduplicated union of terms across `used_libraries`.
    terms: Vec<Arc<str>>,
    ac: AcAutomaton,
    dfa: DfaVerifier,
    built_at: SystemTime,
}

impl ActiveSet {
    /// Build a snapshot over `library_names`, reading each from `store`.
    /// Missing libraries are an error here — callers that want to silently
    /// drop missing names (as the reconfiguration flow does) should filter
    /// `library_names` against `store.list()` first.
    ///
    /// Duplicate terms across libraries are collapsed; which terms were
    /// duplicated, and from which libraries, is logged for observability —
    /// it is not a build failure and is not returned to the caller.
    pub fn build(
        store: &WordLibraryStore,
        library_names: &[String],
    ) -> Result<Self, ActiveSetError> {
        let mut first_seen_in: HashMap<String, String> = HashMap::new();
        let mut terms: Vec<Arc<str>> = Vec::new();

        for name in library_names {
            for term in store.read(name)? {
                match first_seen_in.get(&term) {
                    None => {
                        terms.push(Arc::from(term.as_str()));
                        first_seen_in.insert(term, name.clone());
                    }
                    Some(origin) => {
                        tracing::debug!(
                            term = %term,
                            first_seen_in = %origin,
                            duplicated_in = %name,
                            "duplicate term collapsed while building active set"
                        );
                    }
                }
            }
        }

        let ac = AcAutomaton::build(&terms);
        let dfa = DfaVerifier::build(&terms);

        Ok(Self {
            used_libraries: library_names.to_vec(),
            terms,
            ac,
            dfa,
            built_at: SystemTime::now(),
        })
    }

    /// An empty snapshot: no libraries, no terms, automata over nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            used_libraries: Vec::new(),
            terms: Vec::new(),
            ac: AcAutomaton::build(&[]),
            dfa: DfaVerifier::build(&[]),
            built_at: SystemTime::now(),
        }
    }

    /// Library names composing this snapshot.
    #[must_use]
    pub fn used_libraries(&self) -> &[String] {
        &self.used_libraries
    }

    /// Deduplicated term union across the active libraries.
    #[must_use]
    pub fn terms(&self) -> &[Arc<str>] {
        &self.terms
    }

    /// When this snapshot was built.
    #[must_use]
    pub fn built_at(&self) -> SystemTime {
        self.built_at
    }

    /// Scan normalized text for AC hits and suspicious segments.
    #[must_use]
    pub fn scan(&self, normalized_text: &str) -> crate::matcher::ac::ScanResult {
        self.ac.scan(normalized_text)
    }

    /// Verify suspicious segments against raw text.
    #[must_use]
    pub fn verify<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
        self.dfa.verify(segments)
    }
}

impl std::fmt::Debug for ActiveSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveSet")
            .field("used_libraries", &self.used_libraries)
            .field("term_count", &self.terms.len())
            .field("built_at", &self.built_at)
            .finish()
    }
}

/// Persisted record of which libraries are active, surviving restarts.
///
/// Written atomically (write-temp-then-rename); contents are either fully
/// valid JSON or the file is absent, never a partial write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Library names active at the time of writing.
    pub used_libraries: Vec<String>,
    /// Advisory: the deduplicated term count at write time. The
    /// authoritative count always comes from the live [`ActiveSet`].
    pub word_count: usize,
    /// When this config was written, serialized as an ISO-8601/RFC 3339
    /// string (chrono's default `Serialize` for `DateTime<Utc>`), not
    /// serde's derived `SystemTime` shape.
    pub last_updated: DateTime<Utc>,
}

impl DetectionConfig {
    /// Derive a config record from a freshly built [`ActiveSet`].
    #[must_use]
    pub fn from_active_set(set: &ActiveSet) -> Self {
        Self {
            used_libraries: set.used_libraries().to_vec(),
            word_count: set.terms().len(),
            last_updated: DateTime::<Utc>::from(set.built_at()),
        }
    }

    /// Load `detection_config.json` from `path`. Returns `Ok(None)` both
    /// when the file is absent and when it fails to parse — a corrupt
    /// config is treated the same as a missing one (§7 `ConfigCorrupt`),
    /// logged and then degraded to "no persisted config".
    pub fn load(path: &Path) -> Option<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "failed to read detection config");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "detection config is corrupt; falling back to all libraries");
                None
            }
        }
    }

    /// Persist this config to `path` via temp-file-in-the-same-directory +
    /// `fsync` + rename.
    ///
    /// # Errors
    ///
    /// Returns [`ActiveSetError::Persist`] on any I/O failure.
    pub fn persist(&self, path: &Path) -> Result<(), ActiveSetError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let json = serde_json::to_string_pretty(self).expect("DetectionConfig always serializes");

        let mut tmp = tempfile::Builder::new()
            .prefix(".tmp-detection-config-")
            .tempfile_in(dir)
            .map_err(ActiveSetError::Persist)?;
        tmp.write_all(json.as_bytes())
            .and_then(|()| tmp.as_file_mut().sync_all())
            .map_err(ActiveSetError::Persist)?;
        tmp.persist(path).map_err(|e| ActiveSetError::Persist(e.error))?;
        Ok(())
    }
}

/// The process-wide, read-many/write-one holder for the active `ActiveSet`.
///
/// Readers call [`ActiveSetHolder::snapshot`] once at the start of a request
/// and hold the returned `Arc` for the request's lifetime; a concurrent
/// [`ActiveSetHolder::swap`] never tears that view.
#[derive(Debug)]
pub struct ActiveSetHolder {
    inner: RwLock<Arc<ActiveSet>>,
    config_path: PathBuf,
}

impl ActiveSetHolder {
    /// Initialize the holder from an already-built snapshot.
    #[must_use]
    pub fn new(initial: ActiveSet, config_path: impl Into<PathBuf>) -> Self {
        Self {
            inner: RwLock::new(Arc::new(initial)),
            config_path: config_path.into(),
        }
    }

    /// Acquire a snapshot reference. Cheap: an `Arc` clone under a brief
    /// read lock.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ActiveSet> {
        Arc::clone(&self.inner.read().expect("active set lock poisoned"))
    }

    /// Build a new `ActiveSet` from `library_names` (validated against
    /// `store` — missing names are dropped with a warning, not an error),
    /// swap it in atomically, and persist the corresponding
    /// [`DetectionConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ActiveSetError`] if the build or the persist step fails.
    pub fn reconfigure(
        &self,
        store: &WordLibraryStore,
        library_names: &[String],
    ) -> Result<Arc<ActiveSet>, ActiveSetError> {
        let known: HashSet<String> = store
            .list()?
            .into_iter()
            .map(|info| info.name)
            .collect();

        let survivors: Vec<String> = library_names
            .iter()
            .filter(|name| {
                let exists = known.contains(*name);
                if !exists {
                    tracing::warn!(library = %name, "dropping unknown library from active-set request");
                }
                exists
            })
            .cloned()
            .collect();

        let new_set = Arc::new(ActiveSet::build(store, &survivors)?);
        {
            let mut guard = self.inner.write().expect("active set lock poisoned");
            *guard = Arc::clone(&new_set);
        }

        DetectionConfig::from_active_set(&new_set).persist(&self.config_path)?;
        Ok(new_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(libs: &[(&str, &[&str])]) -> (tempfile::TempDir, WordLibraryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = WordLibraryStore::open(dir.path()).unwrap();
        for (name, terms) in libs {
            let terms: Vec<String> = terms.iter().map(|s| s.to_string()).collect();
            store.create(name, &terms).unwrap();
        }
        (dir, store)
    }

    #[test]
    fn build_dedups_terms_across_libraries() {
        let (_dir, store) = store_with(&[
            ("l1", &["暴力", "辱骂"]),
            ("l2", &["暴力", "色情"]),
        ]);
        let set = ActiveSet::build(&store, &["l1".into(), "l2".into()]).unwrap();
        assert_eq!(set.terms().len(), 3);
    }

    #[test]
    fn empty_active_set_scans_and_verifies_to_nothing() {
        let set = ActiveSet::empty();
        let scan = set.scan("this could be anything");
        assert!(scan.hits.is_empty());
        let verify = set.verify(scan.suspicious_segments.iter().map(String::as_str));
        assert!(verify.is_empty());
    }

    #[test]
    fn terms_match_exactly_the_union_of_the_named_libraries() {
        let (_dir, store) = store_with(&[("l1", &["a", "b"]), ("l2", &["c"])]);
        let set = ActiveSet::build(&store, &["l1".into(), "l2".into()]).unwrap();
        let mut got: Vec<String> = set.terms().iter().map(|t| t.to_string()).collect();
        got.sort();
        assert_eq!(got, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn holder_swap_is_observed_by_new_snapshots_not_old_ones() {
        let (_dir, store) = store_with(&[("l1", &["暴力"])]);
        let config_dir = tempfile::tempdir().unwrap();
        let config_path = config_dir.path().join("detection_config.json");

        let holder = ActiveSetHolder::new(ActiveSet::empty(), &config_path);
        let old_snapshot = holder.snapshot();
        assert!(old_snapshot.terms().is_empty());

        holder.reconfigure(&store, &["l1".to_string()]).unwrap();

        // The handle acquired before the swap still sees the old value.
        assert!(old_snapshot.terms().is_empty());
        // A fresh snapshot sees the new value.
        let new_snapshot = holder.snapshot();
        assert_eq!(new_snapshot.terms().len(), 1);
    }

    #[test]
    fn reconfigure_drops_unknown_library_names() {
        let (_dir, store) = store_with(&[("l1", &["a"])]);
        let config_dir = tempfile::tempdir().unwrap();
        let config_path = config_dir.path().join("detection_config.json");
        let holder = ActiveSetHolder::new(ActiveSet::empty(), &config_path);

        let set = holder
            .reconfigure(&store, &["l1".to_string(), "ghost".to_string()])
            .unwrap();
        assert_eq!(set.used_libraries(), &["l1".to_string()]);
    }

    #[test]
    fn detection_config_round_trips_through_disk() {
        let (_dir, store) = store_with(&[("l1", &["a", "b"])]);
        let set = ActiveSet::build(&store, &["l1".to_string()]).unwrap();
        let config = DetectionConfig::from_active_set(&set);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detection_config.json");
        config.persist(&path).unwrap();

        let loaded = DetectionConfig::load(&path).unwrap();
        assert_eq!(loaded.used_libraries, vec!["l1".to_string()]);
        assert_eq!(loaded.word_count, 2);
        assert_eq!(loaded.last_updated, config.last_updated);
    }

    #[test]
    fn last_updated_is_persisted_as_an_iso8601_string_not_a_serde_struct() {
        let (_dir, store) = store_with(&[("l1", &["a"])]);
        let set = ActiveSet::build(&store, &["l1".to_string()]).unwrap();
        let config = DetectionConfig::from_active_set(&set);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detection_config.json");
        config.persist(&path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value["last_updated"].is_string(), "expected an ISO-8601 string, got {:?}", value["last_updated"]);
        let as_str = value["last_updated"].as_str().unwrap();
        DateTime::parse_from_rfc3339(as_str).expect("last_updated must be RFC 3339");
    }

    #[test]
    fn missing_config_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detection_config.json");
        assert!(DetectionConfig::load(&path).is_none());
    }

    #[test]
    fn corrupt_config_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detection_config.json");
        fs::write(&path, b"{ not valid json").unwrap();
        assert!(DetectionConfig::load(&path).is_none());
    }
}

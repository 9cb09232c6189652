//! [`WordLibraryStore`] — persistent CRUD over named term lists on disk.
//!
//! Each library is a single UTF-8 text file under a configured root
//! directory, one term per line. Writes are crash-safe: content lands in a
//! temp file in the same directory, is `fsync`'d, then renamed over the
//! target, so a crash mid-write never leaves a partially-written library.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use regex::Regex;
use thiserror::Error;

/// A single term loaded from a library file.
///
/// Terms are matched as raw character sequences; [`crate::normalize`] is
/// never applied to them. That asymmetry is intentional — see the crate
/// documentation.
pub type Term = String;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\p{Han}-]{1,64}$").expect("valid regex literal"));

/// Validate a library name against the safe character class.
///
/// Names may not contain path separators or `..`, and are restricted to
/// `[A-Za-z0-9_\p{Han}-]{1,64}` so they can never escape the library root.
fn validate_name(name: &str) -> Result<(), LibraryError> {
    if NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(LibraryError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// Errors raised by [`WordLibraryStore`] operations.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The library name failed the safe-character-class check.
    #[error("invalid library name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// `create` was called with a name that already has a file.
    #[error("library {name:?} already exists")]
    AlreadyExists {
        /// The colliding name.
        name: String,
    },

    /// `read`, `update`, or `delete` named a library with no backing file.
    #[error("library {name:?} not found")]
    NotFound {
        /// The missing name.
        name: String,
    },

    /// `create` or `update` was called with an empty term list.
    #[error("library {name:?} has no terms")]
    Empty {
        /// The offending name.
        name: String,
    },

    /// Underlying filesystem operation failed.
    #[error("I/O error on library {name:?}: {source}")]
    Io {
        /// The library involved.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Metadata about a persisted library, returned by [`WordLibraryStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryInfo {
    /// The library's name (filename stem).
    pub name: String,
    /// Number of non-blank terms in the file.
    pub term_count: usize,
    /// Size of the backing file in bytes.
    pub size_bytes: u64,
    /// Creation time, if the filesystem reports one.
    pub created_at: Option<SystemTime>,
    /// Last modification time, if the filesystem reports one.
    pub modified_at: Option<SystemTime>,
}

/// Persistent CRUD store over named word lists under a single root
/// directory.
#[derive(Debug, Clone)]
pub struct WordLibraryStore {
    root: PathBuf,
}

impl WordLibraryStore {
    /// Open a store rooted at `root`, creating the directory if it does not
    /// exist yet (a one-time bootstrap concern, not a per-operation one).
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Io`] if `root` cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, LibraryError> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root).map_err(|source| LibraryError::Io {
                name: root.display().to_string(),
                source,
            })?;
            tracing::info!(root = %root.display(), "created library root directory");
        }
        Ok(Self { root })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.txt"))
    }

    /// List every library in the root, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Io`] if the root directory cannot be read.
    pub fn list(&self) -> Result<Vec<LibraryInfo>, LibraryError> {
        let entries = fs::read_dir(&self.root).map_err(|source| LibraryError::Io {
            name: self.root.display().to_string(),
            source,
        })?;

        let mut infos = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| LibraryError::Io {
                name: self.root.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let meta = entry.metadata().map_err(|source| LibraryError::Io {
                name: name.to_string(),
                source,
            })?;
            let terms = self.read(name)?;
            infos.push(LibraryInfo {
                name: name.to_string(),
                term_count: terms.len(),
                size_bytes: meta.len(),
                created_at: meta.created().ok(),
                modified_at: meta.modified().ok(),
            });
        }
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    /// Create a new library file. Fails if one already exists under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::InvalidName`], [`LibraryError::Empty`],
    /// [`LibraryError::AlreadyExists`], or [`LibraryError::Io`].
    pub fn create(&self, name: &str, terms: &[Term]) -> Result<(), LibraryError> {
        validate_name(name)?;
        if terms.is_empty() {
            return Err(LibraryError::Empty {
                name: name.to_string(),
            });
        }
        let path = self.path_for(name);
        if path.exists() {
            return Err(LibraryError::AlreadyExists {
                name: name.to_string(),
            });
        }
        self.write_atomic(&path, name, terms)
    }

    /// Read a library's terms, in file order, blank lines stripped.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::InvalidName`] or [`LibraryError::NotFound`].
    pub fn read(&self, name: &str) -> Result<Vec<Term>, LibraryError> {
        validate_name(name)?;
        let path = self.path_for(name);
        let content = fs::read_to_string(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                LibraryError::NotFound {
                    name: name.to_string(),
                }
            } else {
                LibraryError::Io {
                    name: name.to_string(),
                    source,
                }
            }
        })?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Overwrite a library's terms entirely. Fails if the library does not
    /// already exist.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::InvalidName`], [`LibraryError::Empty`],
    /// [`LibraryError::NotFound`], or [`LibraryError::Io`].
    pub fn update(&self, name: &str, terms: &[Term]) -> Result<(), LibraryError> {
        validate_name(name)?;
        if terms.is_empty() {
            return Err(LibraryError::Empty {
                name: name.to_string(),
            });
        }
        let path = self.path_for(name);
        if !path.exists() {
            return Err(LibraryError::NotFound {
                name: name.to_string(),
            });
        }
        self.write_atomic(&path, name, terms)
    }

    /// Delete a library file.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::InvalidName`] or [`LibraryError::NotFound`].
    pub fn delete(&self, name: &str) -> Result<(), LibraryError> {
        validate_name(name)?;
        let path = self.path_for(name);
        fs::remove_file(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                LibraryError::NotFound {
                    name: name.to_string(),
                }
            } else {
                LibraryError::Io {
                    name: name.to_string(),
                    source,
                }
            }
        })
    }

    /// Write `terms` to `path` crash-safely: temp file in the same
    /// directory, `fsync`, rename over the target.
    fn write_atomic(&self, path: &Path, name: &str, terms: &[Term]) -> Result<(), LibraryError> {
        let mut body = String::new();
        for term in terms {
            body.push_str(term);
            body.push('\n');
        }

        let mut tmp = tempfile::Builder::new()
            .prefix(".tmp-")
            .tempfile_in(&self.root)
            .map_err(|source| LibraryError::Io {
                name: name.to_string(),
                source,
            })?;

        use std::io::Write;
        tmp.write_all(body.as_bytes())
            .and_then(|()| tmp.as_file_mut().sync_all())
            .map_err(|source| LibraryError::Io {
                name: name.to_string(),
                source,
            })?;

        tmp.persist(path)
            .map_err(|e| LibraryError::Io {
                name: name.to_string(),
                source: e.error,
            })?;
        Ok(())
    }

    /// The root directory this store is backed by.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, WordLibraryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = WordLibraryStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn create_then_read_round_trips() {
        let (_dir, store) = store();
        let terms = vec!["暴力".to_string(), "辱骂".to_string()];
        store.create("l1", &terms).unwrap();
        assert_eq!(store.read("l1").unwrap(), terms);
    }

    #[test]
    fn create_twice_fails() {
        let (_dir, store) = store();
        store.create("l1", &["a".to_string()]).unwrap();
        let err = store.create("l1", &["b".to_string()]).unwrap_err();
        assert!(matches!(err, LibraryError::AlreadyExists { .. }));
    }

    #[test]
    fn update_then_read_round_trips() {
        let (_dir, store) = store();
        store.create("l1", &["a".to_string()]).unwrap();
        store.update("l1", &["b".to_string(), "c".to_string()]).unwrap();
        assert_eq!(store.read("l1").unwrap(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn update_missing_fails() {
        let (_dir, store) = store();
        let err = store.update("ghost", &["a".to_string()]).unwrap_err();
        assert!(matches!(err, LibraryError::NotFound { .. }));
    }

    #[test]
    fn delete_then_read_not_found() {
        let (_dir, store) = store();
        store.create("l1", &["a".to_string()]).unwrap();
        store.delete("l1").unwrap();
        let err = store.read("l1").unwrap_err();
        assert!(matches!(err, LibraryError::NotFound { .. }));
    }

    #[test]
    fn blank_lines_are_stripped_on_read() {
        let (_dir, store) = store();
        let path = store.path_for("l1");
        fs::write(&path, "a\n\n  \nb\n").unwrap();
        assert_eq!(store.read("l1").unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn rejects_path_escaping_names() {
        let (_dir, store) = store();
        for bad in ["../evil", "a/b", "a\0b", ""] {
            let err = store.create(bad, &["x".to_string()]).unwrap_err();
            assert!(matches!(err, LibraryError::InvalidName { .. }), "name {bad:?} should be rejected");
        }
    }

    #[test]
    fn empty_term_list_rejected() {
        let (_dir, store) = store();
        let err = store.create("l1", &[]).unwrap_err();
        assert!(matches!(err, LibraryError::Empty { .. }));
    }

    #[test]
    fn list_reports_every_library_sorted_by_name() {
        let (_dir, store) = store();
        store.create("zeta", &["z".to_string()]).unwrap();
        store.create("alpha", &["a".to_string()]).unwrap();
        let names: Vec<_> = store.list().unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }
}

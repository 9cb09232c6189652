//! [`Gateway`] — the facade that wires [`WordLibraryStore`], [`ActiveSetHolder`],
//! [`Orchestrator`], and the [`LlmAdapter`]/[`WarmupTracker`] pair into the
//! external interfaces described in §6: `detect_text`, `detect_document`,
//! library CRUD, active-set management, and model warm-up/status.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use thiserror::Error;

use crate::active_set::{ActiveSet, ActiveSetError, ActiveSetHolder, DetectionConfig};
use crate::config::GatewayConfig;
use crate::document::{self, UnsupportedContentType};
use crate::library::{LibraryError, LibraryInfo, Term, WordLibraryStore};
use crate::llm::{LlmAdapter, WarmupStatus, WarmupTracker};
use crate::orchestrator::{DetectionRecord, Mode, Orchestrator, OrchestratorError};

/// The stable error taxonomy surfaced across the external API boundary
/// (§7). Library, active-set, and orchestrator errors all funnel through
/// this type so an embedding HTTP layer has exactly one enum to map onto
/// status codes.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// `text`/`doc` was empty or whitespace-only.
    #[error("input text is empty")]
    EmptyInput,
    /// A library name failed the safe-character-class check.
    #[error("invalid library name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },
    /// A named library does not exist.
    #[error("library {name:?} not found")]
    NotFound {
        /// The missing name.
        name: String,
    },
    /// `create` was called with a name that already has a file.
    #[error("library {name:?} already exists")]
    AlreadyExists {
        /// The colliding name.
        name: String,
    },
    /// `create`/`update` was called with an empty term list.
    #[error("library {name:?} has no terms")]
    Empty {
        /// The offending name.
        name: String,
    },
    /// An uploaded document declared a content type this shim cannot
    /// extract text from.
    #[error(transparent)]
    UnsupportedContentType(#[from] UnsupportedContentType),
    /// Underlying filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),
}

impl From<LibraryError> for GatewayError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::InvalidName { name } => Self::InvalidName { name },
            LibraryError::AlreadyExists { name } => Self::AlreadyExists { name },
            LibraryError::NotFound { name } => Self::NotFound { name },
            LibraryError::Empty { name } => Self::Empty { name },
            LibraryError::Io { source, .. } => Self::Io(source),
        }
    }
}

impl From<ActiveSetError> for GatewayError {
    fn from(err: ActiveSetError) -> Self {
        match err {
            ActiveSetError::Library(inner) => inner.into(),
            ActiveSetError::Persist(source) => Self::Io(source),
        }
    }
}

impl From<OrchestratorError> for GatewayError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::EmptyInput => Self::EmptyInput,
        }
    }
}

/// The shape returned by `set_active`/`get_active` (§6).
#[derive(Debug, Clone)]
pub struct ActiveSetSummary {
    /// Library names composing the active set, in request order.
    pub used_libraries: Vec<String>,
    /// Deduplicated term count across the active set.
    pub word_count: usize,
    /// When this snapshot was built. `None` only ever appears transiently;
    /// a live `ActiveSet` always has a build timestamp.
    pub last_updated: Option<SystemTime>,
}

/// Name given to the stock library created when a fresh `libraries_root`
/// is opened empty.
const STOCK_LIBRARY_NAME: &str = "default";

/// Wires the gateway's components together and exposes the detection and
/// management API described in §6.
pub struct Gateway {
    store: WordLibraryStore,
    active_set: ActiveSetHolder,
    llm: Arc<dyn LlmAdapter>,
    warmup: WarmupTracker,
}

impl Gateway {
    /// Open a gateway over `config`, backed by `llm` as its
    /// [`LlmAdapter`]. On startup: read the persisted `DetectionConfig`; if
    /// present and every named library still exists, build the `ActiveSet`
    /// over them. Otherwise enumerate every library in `libraries_root`
    /// (creating a stock default library first if the root is empty) and
    /// use that instead.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the library root cannot be opened or the
    /// initial `ActiveSet` cannot be built.
    pub fn open(config: &GatewayConfig, llm: Arc<dyn LlmAdapter>) -> Result<Self, GatewayError> {
        let store = WordLibraryStore::open(&config.libraries_root)?;
        let active_set = Self::bootstrap(&store, &config.detection_config_path)?;
        let holder = ActiveSetHolder::new(active_set, &config.detection_config_path);
        Ok(Self {
            store,
            active_set: holder,
            llm,
            warmup: WarmupTracker::new(),
        })
    }

    fn bootstrap(store: &WordLibraryStore, config_path: &Path) -> Result<ActiveSet, GatewayError> {
        let known: Vec<LibraryInfo> = store.list()?;

        if let Some(persisted) = DetectionConfig::load(config_path) {
            let known_names: std::collections::HashSet<&str> =
                known.iter().map(|info| info.name.as_str()).collect();
            let all_present = persisted
                .used_libraries
                .iter()
                .all(|name| known_names.contains(name.as_str()));
            if all_present {
                return Ok(ActiveSet::build(store, &persisted.used_libraries)?);
            }
            tracing::warn!(
                "persisted detection config names a missing library; falling back to all libraries"
            );
        }

        if known.is_empty() {
            store.create(
                STOCK_LIBRARY_NAME,
                &["示例敏感词".to_string()],
            )?;
            tracing::info!("library root was empty; created stock default library");
            return Ok(ActiveSet::build(store, &[STOCK_LIBRARY_NAME.to_string()])?);
        }

        let all_names: Vec<String> = known.into_iter().map(|info| info.name).collect();
        Ok(ActiveSet::build(store, &all_names)?)
    }

    /// Run detection over `text` in `mode`. See [`Orchestrator::detect`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EmptyInput`] if `text` is empty or
    /// whitespace-only.
    pub async fn detect_text(&self, text: &str, mode: Mode) -> Result<DetectionRecord, GatewayError> {
        let snapshot = self.active_set.snapshot();
        let orchestrator = Orchestrator::new(&snapshot, self.llm.as_ref(), &self.warmup);
        Ok(orchestrator.detect(text, mode).await?)
    }

    /// Extract text from an uploaded `(bytes, content_type)` pair and run
    /// detection in the fixed `DocumentStrict` flow (§4.6).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnsupportedContentType`] if `content_type`
    /// isn't one this shim can extract text from, or
    /// [`GatewayError::EmptyInput`] if the extracted text is empty.
    pub async fn detect_document(
        &self,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<DetectionRecord, GatewayError> {
        let text = document::extract_text(bytes, content_type)?;
        let snapshot = self.active_set.snapshot();
        let orchestrator = Orchestrator::new(&snapshot, self.llm.as_ref(), &self.warmup);
        Ok(orchestrator.detect(&text, Mode::DocumentStrict).await?)
    }

    /// List every persisted library.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Io`] if the library root cannot be read.
    pub fn list_libraries(&self) -> Result<Vec<LibraryInfo>, GatewayError> {
        Ok(self.store.list()?)
    }

    /// Create a new library.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidName`], [`GatewayError::Empty`], or
    /// [`GatewayError::AlreadyExists`].
    pub fn create_library(&self, name: &str, terms: &[Term]) -> Result<(), GatewayError> {
        Ok(self.store.create(name, terms)?)
    }

    /// Read a library's terms.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`].
    pub fn read_library(&self, name: &str) -> Result<Vec<Term>, GatewayError> {
        Ok(self.store.read(name)?)
    }

    /// Overwrite a library's terms.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] or [`GatewayError::Empty`].
    pub fn update_library(&self, name: &str, terms: &[Term]) -> Result<(), GatewayError> {
        self.store.update(name, terms)?;
        Ok(())
    }

    /// Delete a library.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`].
    pub fn delete_library(&self, name: &str) -> Result<(), GatewayError> {
        Ok(self.store.delete(name)?)
    }

    /// Reconfigure the active set to `library_names`, dropping any that no
    /// longer exist, swapping the result in atomically, and persisting the
    /// new `DetectionConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Io`] if the store cannot be listed or the
    /// config cannot be persisted.
    pub fn set_active(&self, library_names: &[String]) -> Result<ActiveSetSummary, GatewayError> {
        let set = self.active_set.reconfigure(&self.store, library_names)?;
        Ok(ActiveSetSummary {
            used_libraries: set.used_libraries().to_vec(),
            word_count: set.terms().len(),
            last_updated: Some(set.built_at()),
        })
    }

    /// The currently active library set.
    #[must_use]
    pub fn get_active(&self) -> ActiveSetSummary {
        let set = self.active_set.snapshot();
        ActiveSetSummary {
            used_libraries: set.used_libraries().to_vec(),
            word_count: set.terms().len(),
            last_updated: Some(set.built_at()),
        }
    }

    /// The LLM backend's warm-up status.
    #[must_use]
    pub fn model_status(&self) -> WarmupStatus {
        self.warmup.status()
    }

    /// Issue the configured warm-up probes against the LLM backend.
    /// Failure of any individual probe is non-fatal.
    pub async fn warm_up_model(&self, probes: &[String]) {
        self.warmup.warm_up(self.llm.as_ref(), probes).await;
    }
}

//! Registry error types.

use std::path::PathBuf;

/// Errors that can occur during registry and shop operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Invalid version or version spec input.
    #[error(transparent)]
    Core(#[from] bakery_core::CoreError),

    /// A persisted registry document failed to parse. Fatal: a malformed
    /// document is never silently replaced with an empty registry.
    #[error("corrupt registry document at {path}: {detail}")]
    Corrupt { path: PathBuf, detail: String },

    /// Writing a registry document failed. The previous on-disk state is
    /// left intact.
    #[error("failed to persist {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No entry with this name satisfies the requested spec.
    #[error("no version of '{name}' satisfies '{spec}'")]
    NotFound { name: String, spec: String },

    /// A receipt file disagrees with the content hash recorded in the
    /// receipt index. Fatal: never silently repaired.
    #[error("receipt for project key {key} does not match its index hash")]
    ReceiptMismatch { key: String },

    /// An artifact's embedded descriptor disagrees with the registry entry
    /// claimed for it.
    #[error("artifact claimed as {expected} declares itself as {found}")]
    ArtifactMismatch { expected: String, found: String },

    /// Dependency recursion exceeded the depth guard.
    #[error("dependency depth exceeds {limit} while installing '{name}', possible cycle")]
    DependencyCycle { name: String, limit: usize },

    /// Archive container error.
    #[error(transparent)]
    Archive(#[from] bakery_archive::ArchiveError),

    /// HTTP transport error talking to a shop.
    #[error("shop request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The shop answered with an error response.
    #[error("shop rejected the request ({status}): {}", errors.join("; "))]
    ShopRejected { status: u16, errors: Vec<String> },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Whether this error must abort the whole command rather than just the
    /// package that produced it.
    ///
    /// Registry-integrity and persistence failures are fatal; lookup misses,
    /// transport failures, and bad artifacts are recovered per package so a
    /// shopping list of N pastries degrades gracefully.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RegistryError::Corrupt { .. }
                | RegistryError::Persistence { .. }
                | RegistryError::ReceiptMismatch { .. }
        )
    }
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

//! Archive container error types.

use std::path::PathBuf;

/// Errors that can occur reading or writing pastry archives.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// A required metadata entry is absent from the archive.
    #[error("archive {path} has no '{name}' entry")]
    MissingEntry { name: String, path: PathBuf },

    /// An archive member would extract outside the destination directory.
    #[error("archive entry '{name}' escapes the extraction directory")]
    PathEscape { name: String },

    /// An ingredient file referenced by the manifest does not exist.
    #[error("missing ingredient file: {path}")]
    MissingIngredient { path: PathBuf },

    /// A metadata entry holds malformed JSON.
    #[error("malformed '{name}': {source}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// Zip container error.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

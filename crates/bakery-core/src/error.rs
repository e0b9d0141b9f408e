//! Core error types.

/// Errors produced when parsing versions and version specs.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A version string that is not `MAJOR.MINOR.PATCH[-prerelease][+build]`.
    #[error("invalid version '{input}': {source}")]
    InvalidVersion {
        input: String,
        #[source]
        source: semver::Error,
    },

    /// A malformed version range expression.
    #[error("invalid version spec '{input}': {detail}")]
    InvalidSpec { input: String, detail: String },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

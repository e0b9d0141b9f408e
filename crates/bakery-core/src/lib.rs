//! Core data model for the bakery package manager.
//!
//! A *pastry* is a named, versioned artifact with declared dependencies and
//! packed files (*ingredients*). This crate holds the leaf types shared by
//! the registry, the archive container, and the CLI:
//!
//! - [`Version`] / [`VersionSpec`] — semantic versions and comparator-list
//!   range expressions
//! - [`Pastry`] — the immutable (name, version) descriptor
//! - [`PastryManifest`] — the `pastry.json` record embedded in every artifact
//! - [`Ingredient`] — a tagged file reference packed into an artifact
//!
//! No I/O happens here; persistence and transport live in the registry and
//! archive crates.

pub mod error;
pub mod ingredient;
pub mod pastry;
pub mod version;

pub use error::{CoreError, Result};
pub use ingredient::Ingredient;
pub use pastry::{DependencyRequest, Pastry, PastryManifest};
pub use version::{parse_version, Version, VersionSpec};

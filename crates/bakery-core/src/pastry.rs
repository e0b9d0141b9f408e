//! Pastry descriptors and the embedded artifact manifest.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::version::{parse_version, Version, VersionSpec};

/// The immutable identity of a package: a name and a semantic version.
///
/// Two descriptors are equal iff both fields match exactly. Ordering is by
/// name first, then version; it exists only so max-selection among
/// candidates is deterministic, never for cross-name comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pastry {
    /// Package name (unique within a registry).
    pub name: String,
    /// Semantic version, rendered canonically when serialized.
    pub version: Version,
}

impl Pastry {
    /// Create a descriptor, validating the version string.
    pub fn new(name: impl Into<String>, version: &str) -> Result<Self> {
        Ok(Pastry {
            name: name.into(),
            version: parse_version(version)?,
        })
    }

    /// Create a descriptor from an already-parsed version.
    pub fn from_parts(name: impl Into<String>, version: Version) -> Self {
        Pastry {
            name: name.into(),
            version,
        }
    }

    /// The exact-match spec for this descriptor's version.
    pub fn exact_spec(&self) -> VersionSpec {
        VersionSpec::exact(&self.version)
    }

    /// The deterministic artifact file name for this descriptor:
    /// `<name>_<version>.zip` with unsafe characters collapsed to `_`.
    ///
    /// Two names differing only in disallowed characters can sanitize to the
    /// same file name; that collision is an accepted limitation of the
    /// scheme, not detected here.
    pub fn file_name(&self) -> String {
        let raw = format!("{}_{}", self.name, self.version);
        let mut sanitized: String = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        sanitized.push_str(".zip");
        sanitized
    }
}

impl fmt::Display for Pastry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

impl Ord for Pastry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.version.cmp(&other.version))
    }
}

impl PartialOrd for Pastry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A declared dependency: a package name plus a version spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRequest {
    /// Name of the required package.
    pub name: String,
    /// Version range the dependent accepts.
    pub spec: VersionSpec,
}

impl DependencyRequest {
    pub fn new(name: impl Into<String>, spec: VersionSpec) -> Self {
        DependencyRequest {
            name: name.into(),
            spec,
        }
    }
}

impl fmt::Display for DependencyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.spec)
    }
}

/// The package's own record, stored as `pastry.json` inside every artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PastryManifest {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: Version,
    /// Declared dependencies.
    #[serde(default)]
    pub dependencies: Vec<DependencyRequest>,
}

impl PastryManifest {
    /// Build a manifest for a descriptor with the given dependencies.
    pub fn new(pastry: &Pastry, dependencies: Vec<DependencyRequest>) -> Self {
        PastryManifest {
            name: pastry.name.clone(),
            version: pastry.version.clone(),
            dependencies,
        }
    }

    /// The descriptor this manifest claims to describe.
    pub fn pastry(&self) -> Pastry {
        Pastry::from_parts(self.name.clone(), self.version.clone())
    }
}

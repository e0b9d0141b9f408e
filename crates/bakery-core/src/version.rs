//! Semantic versions and comparator-list version specs.
//!
//! Versions come from the `semver` crate unchanged. Version specs do *not*
//! reuse `semver::VersionReq`: its grammar treats a bare version as a caret
//! requirement ("compatible with"), while this system defines a bare version
//! as an exact match. The spec grammar here is a comma-separated list of
//! comparator clauses (`>=`, `<=`, `>`, `<`, `==`, `!=`), ANDed together.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// A parsed semantic version.
pub type Version = semver::Version;

/// Parse a version string like "1.2.3" or "1.2.3-rc.1+build5".
pub fn parse_version(s: &str) -> Result<Version> {
    Version::parse(s).map_err(|source| CoreError::InvalidVersion {
        input: s.to_string(),
        source,
    })
}

/// A single comparator in a version spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Exact,
    NotEqual,
}

impl Comparator {
    fn symbol(self) -> &'static str {
        match self {
            Comparator::Less => "<",
            Comparator::LessEq => "<=",
            Comparator::Greater => ">",
            Comparator::GreaterEq => ">=",
            Comparator::Exact => "==",
            Comparator::NotEqual => "!=",
        }
    }
}

/// One clause of a version spec: an operator applied to a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub op: Comparator,
    pub version: Version,
}

impl Clause {
    /// Evaluate this clause against a version.
    ///
    /// Comparison follows semver precedence: pre-release sorts below the
    /// corresponding release, build metadata is ignored.
    pub fn matches(&self, version: &Version) -> bool {
        let ord = version.cmp_precedence(&self.version);
        match self.op {
            Comparator::Less => ord == Ordering::Less,
            Comparator::LessEq => ord != Ordering::Greater,
            Comparator::Greater => ord == Ordering::Greater,
            Comparator::GreaterEq => ord != Ordering::Less,
            Comparator::Exact => ord == Ordering::Equal,
            Comparator::NotEqual => ord != Ordering::Equal,
        }
    }
}

/// A predicate over versions, built from ANDed comparator clauses.
///
/// The empty spec matches every version. A bare version string is shorthand
/// for an exact-match clause. Mutually contradictory clauses (for example
/// `>1.0.0,<0.5.0`) are legal to construct and simply never match.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionSpec {
    clauses: Vec<Clause>,
}

impl VersionSpec {
    /// The spec that matches every version.
    pub fn any() -> Self {
        VersionSpec::default()
    }

    /// An exact-match spec for the given version.
    pub fn exact(version: &Version) -> Self {
        VersionSpec {
            clauses: vec![Clause {
                op: Comparator::Exact,
                version: version.clone(),
            }],
        }
    }

    /// Parse a spec string like ">=1.0.0,<2.0.0" or "0.1.0" (exact).
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(VersionSpec::any());
        }

        let mut clauses = Vec::new();
        for raw in trimmed.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                return Err(CoreError::InvalidSpec {
                    input: input.to_string(),
                    detail: "empty clause".to_string(),
                });
            }

            let (op, rest) = if let Some(rest) = raw.strip_prefix(">=") {
                (Comparator::GreaterEq, rest)
            } else if let Some(rest) = raw.strip_prefix("<=") {
                (Comparator::LessEq, rest)
            } else if let Some(rest) = raw.strip_prefix("==") {
                (Comparator::Exact, rest)
            } else if let Some(rest) = raw.strip_prefix("!=") {
                (Comparator::NotEqual, rest)
            } else if let Some(rest) = raw.strip_prefix('>') {
                (Comparator::Greater, rest)
            } else if let Some(rest) = raw.strip_prefix('<') {
                (Comparator::Less, rest)
            } else {
                // Bare version: exact match.
                (Comparator::Exact, raw)
            };

            let version =
                Version::parse(rest.trim()).map_err(|e| CoreError::InvalidSpec {
                    input: input.to_string(),
                    detail: format!("bad version in clause '{raw}': {e}"),
                })?;
            clauses.push(Clause { op, version });
        }

        Ok(VersionSpec { clauses })
    }

    /// True iff every clause is satisfied by `version`.
    pub fn contains(&self, version: &Version) -> bool {
        self.clauses.iter().all(|c| c.matches(version))
    }

    /// True for the match-everything spec.
    pub fn is_any(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The clauses of this spec, in source order.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A single exact clause renders as the bare-version shorthand so the
        // string form round-trips through `parse`.
        if let [clause] = self.clauses.as_slice() {
            if clause.op == Comparator::Exact {
                return write!(f, "{}", clause.version);
            }
        }
        let mut first = true;
        for clause in &self.clauses {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}{}", clause.op.symbol(), clause.version)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for VersionSpec {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        VersionSpec::parse(s)
    }
}

impl serde::Serialize for VersionSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for VersionSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        VersionSpec::parse(&s).map_err(serde::de::Error::custom)
    }
}

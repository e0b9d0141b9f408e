//! Ingredients: tagged file references packed into an artifact.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A single file reference with free-form tags attached, as recorded in an
/// artifact's `ingredients.json`.
///
/// The path is stored relative to the pastry's base directory; it doubles as
/// the member name inside the archive and the extraction target relative to
/// the install destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    /// File path, relative to the pastry base directory.
    pub path: PathBuf,
    /// Free-form tags, e.g. platform or configuration markers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl Ingredient {
    /// An untagged ingredient.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Ingredient {
            path: path.into(),
            tags: BTreeMap::new(),
        }
    }

    /// Attach a tag, builder style.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Strip `root` from an absolute ingredient path. Relative paths are
    /// kept as-is.
    pub fn make_relative_to(&mut self, root: &Path) {
        if self.path.is_absolute() {
            if let Ok(stripped) = self.path.strip_prefix(root) {
                self.path = stripped.to_path_buf();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        let ing = Ingredient::new("bin/engine.dll")
            .with_tag("platform", "win64")
            .with_tag("config", "release");
        let json = serde_json::to_string(&ing).unwrap();
        let back: Ingredient = serde_json::from_str(&json).unwrap();
        assert_eq!(ing, back);
        assert_eq!(back.tags.get("platform").map(String::as_str), Some("win64"));
    }

    #[test]
    fn untagged_ingredient_omits_tags_field() {
        let ing = Ingredient::new("readme.md");
        let json = serde_json::to_string(&ing).unwrap();
        assert!(!json.contains("tags"));
        let back: Ingredient = serde_json::from_str(&json).unwrap();
        assert!(back.tags.is_empty());
    }

    #[test]
    fn make_relative_strips_root() {
        let mut ing = Ingredient::new("/project/out/lib.a");
        ing.make_relative_to(Path::new("/project"));
        assert_eq!(ing.path, PathBuf::from("out/lib.a"));

        // Already-relative paths are untouched.
        let mut rel = Ingredient::new("out/lib.a");
        rel.make_relative_to(Path::new("/project"));
        assert_eq!(rel.path, PathBuf::from("out/lib.a"));
    }
}

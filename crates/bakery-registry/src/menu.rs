//! The menu: a file-backed registry of pastry descriptors.
//!
//! One JSON document on disk maps descriptors to artifact locations:
//!
//! ```text
//! <pastries_root>/
//!   menu.json            — array of {name, version, ...} records
//!   <name>_<version>.zip — artifact files, named by Pastry::file_name
//! ```
//!
//! The menu is held in memory between `open` and `save`; the file is the
//! single source of truth and whoever holds it between those two calls owns
//! it exclusively for that duration. There is no file locking: concurrent
//! external writers produce a lost update, which this design accepts and
//! documents rather than mitigates.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use bakery_core::{Pastry, Version, VersionSpec};

use crate::error::{RegistryError, Result};

/// File name of the menu document inside the pastries root.
pub const MENU_FILE: &str = "menu.json";

/// One registry entry: a descriptor plus any extra record fields found in
/// the document, preserved verbatim across round-trips.
#[derive(Debug, Clone)]
pub struct MenuEntry {
    pub pastry: Pastry,
    extra: serde_json::Map<String, serde_json::Value>,
}

/// The serialized record shape. Unknown fields land in `extra` instead of
/// failing the parse.
#[derive(Debug, Serialize, Deserialize)]
struct MenuRecord {
    name: String,
    version: Version,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// An ordered, persisted collection of pastry descriptors.
#[derive(Debug)]
pub struct Menu {
    root: PathBuf,
    file_path: PathBuf,
    entries: Vec<MenuEntry>,
}

impl Menu {
    /// Open the menu under `pastries_root`, creating an empty persisted
    /// document if none exists yet.
    pub fn open(pastries_root: &Path) -> Result<Self> {
        let file_path = pastries_root.join(MENU_FILE);
        let mut menu = Self::open_at(pastries_root.to_path_buf(), file_path)?;
        if !menu.file_path.exists() {
            menu.save()?;
        }
        Ok(menu)
    }

    /// Open a menu-shaped document at an explicit file path without creating
    /// it. Used for receipts, which are created lazily on first save.
    pub(crate) fn open_at(root: PathBuf, file_path: PathBuf) -> Result<Self> {
        let entries = if file_path.is_file() {
            let data = std::fs::read_to_string(&file_path)?;
            let records: Vec<MenuRecord> =
                serde_json::from_str(&data).map_err(|e| RegistryError::Corrupt {
                    path: file_path.clone(),
                    detail: e.to_string(),
                })?;
            records
                .into_iter()
                .map(|r| MenuEntry {
                    pastry: Pastry::from_parts(r.name, r.version),
                    extra: r.extra,
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(Menu {
            root,
            file_path,
            entries,
        })
    }

    /// The pastries root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the persisted document.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Add a descriptor. If an equal entry already exists this is a no-op
    /// that hands back the existing entry with `false`.
    pub fn add(&mut self, pastry: Pastry) -> (&MenuEntry, bool) {
        if let Some(index) = self.position(&pastry) {
            return (&self.entries[index], false);
        }
        self.entries.push(MenuEntry {
            pastry,
            extra: serde_json::Map::new(),
        });
        (self.entries.last().expect("just pushed"), true)
    }

    /// Remove a descriptor. Returns false if it was absent.
    pub fn remove(&mut self, pastry: &Pastry) -> bool {
        match self.position(pastry) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Exact identity check.
    pub fn exists(&self, pastry: &Pastry) -> bool {
        self.position(pastry).is_some()
    }

    /// Best match: the entry named `name` with the highest version
    /// satisfying `spec`, or `None`.
    ///
    /// Precedence comparison drives the selection; full semver ordering
    /// (build metadata as lexical tie-break) makes the winner deterministic
    /// when two candidates have equal precedence.
    pub fn get(&self, name: &str, spec: &VersionSpec) -> Option<&Pastry> {
        self.entries
            .iter()
            .filter(|e| e.pastry.name == name && spec.contains(&e.pastry.version))
            .max_by(|a, b| {
                a.pastry
                    .version
                    .cmp_precedence(&b.pastry.version)
                    .then_with(|| a.pastry.version.cmp(&b.pastry.version))
            })
            .map(|e| &e.pastry)
    }

    /// Absolute artifact path for a descriptor: the pastries root joined
    /// with its sanitized file name.
    pub fn make_path(&self, pastry: &Pastry) -> PathBuf {
        self.root.join(pastry.file_name())
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &MenuEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all in-memory entries. The on-disk document is untouched until
    /// the next `save`.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Persist the menu atomically: the document is written to a `.tmp`
    /// sibling and renamed over the target, so a failed write never corrupts
    /// the previous file. Records are sorted by (name, version) for a
    /// deterministic document.
    pub fn save(&self) -> Result<()> {
        let mut records: Vec<MenuRecord> = self
            .entries
            .iter()
            .map(|e| MenuRecord {
                name: e.pastry.name.clone(),
                version: e.pastry.version.clone(),
                extra: e.extra.clone(),
            })
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.version.cmp(&b.version)));

        let json = serde_json::to_vec_pretty(&records)?;

        let persist = |path: &Path, source: std::io::Error| RegistryError::Persistence {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| persist(parent, e))?;
        }

        let tmp_path = {
            let mut name = self.file_path.as_os_str().to_os_string();
            name.push(".tmp");
            PathBuf::from(name)
        };
        std::fs::write(&tmp_path, &json).map_err(|e| persist(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &self.file_path)
            .map_err(|e| persist(&self.file_path, e))?;
        Ok(())
    }

    fn position(&self, pastry: &Pastry) -> Option<usize> {
        self.entries.iter().position(|e| &e.pastry == pastry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pastry(name: &str, version: &str) -> Pastry {
        Pastry::new(name, version).unwrap()
    }

    #[test]
    fn open_creates_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let menu = Menu::open(dir.path()).unwrap();
        assert!(menu.is_empty());
        assert!(dir.path().join(MENU_FILE).is_file());
    }

    #[test]
    fn add_then_get_by_exact_spec() {
        let dir = tempfile::tempdir().unwrap();
        let mut menu = Menu::open(dir.path()).unwrap();

        let p = pastry("foo", "0.1.0");
        let (_, inserted) = menu.add(p.clone());
        assert!(inserted);
        assert_eq!(menu.get("foo", &p.exact_spec()), Some(&p));
        assert_eq!(menu.get("bar", &p.exact_spec()), None);
    }

    #[test]
    fn add_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut menu = Menu::open(dir.path()).unwrap();

        let p = pastry("foo", "0.1.0");
        assert!(menu.add(p.clone()).1);
        let (existing, inserted) = menu.add(p.clone());
        assert!(!inserted);
        assert_eq!(existing.pastry, p);
        assert_eq!(menu.len(), 1);
    }

    #[test]
    fn remove_absent_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let mut menu = Menu::open(dir.path()).unwrap();
        menu.add(pastry("foo", "0.1.0"));

        assert!(!menu.remove(&pastry("foo", "0.2.0")));
        assert_eq!(menu.len(), 1);
        assert!(menu.remove(&pastry("foo", "0.1.0")));
        assert!(menu.is_empty());
    }

    #[test]
    fn best_match_selects_highest_in_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut menu = Menu::open(dir.path()).unwrap();
        for v in ["1.0.0", "1.2.0", "2.0.0"] {
            menu.add(pastry("foo", v));
        }

        let spec = VersionSpec::parse(">=1.0.0,<2.0.0").unwrap();
        assert_eq!(menu.get("foo", &spec), Some(&pastry("foo", "1.2.0")));

        let any = VersionSpec::any();
        assert_eq!(menu.get("foo", &any), Some(&pastry("foo", "2.0.0")));
    }

    #[test]
    fn best_match_prefers_release_over_prerelease() {
        let dir = tempfile::tempdir().unwrap();
        let mut menu = Menu::open(dir.path()).unwrap();
        menu.add(pastry("foo", "1.0.0-rc.1"));
        menu.add(pastry("foo", "1.0.0"));

        let spec = VersionSpec::parse("<=1.0.0").unwrap();
        assert_eq!(menu.get("foo", &spec), Some(&pastry("foo", "1.0.0")));
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut menu = Menu::open(dir.path()).unwrap();
        menu.add(pastry("foo", "0.1.0"));
        menu.add(pastry("bar", "1.33.7"));
        menu.save().unwrap();

        menu.clear();
        assert_eq!(menu.len(), 0);

        let reloaded = Menu::open(dir.path()).unwrap();
        assert_eq!(reloaded.len(), 2);
        let spec = VersionSpec::parse("0.1.0").unwrap();
        assert_eq!(reloaded.get("foo", &spec), Some(&pastry("foo", "0.1.0")));
    }

    #[test]
    fn make_path_uses_sanitized_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let menu = Menu::open(dir.path()).unwrap();
        let path = menu.make_path(&pastry("foo", "0.1.0"));
        assert_eq!(path, dir.path().join("foo_0.1.0.zip"));
    }

    #[test]
    fn corrupt_document_is_fatal_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MENU_FILE), b"{not json").unwrap();

        let result = Menu::open(dir.path());
        assert!(matches!(result, Err(RegistryError::Corrupt { .. })));
    }

    #[test]
    fn unknown_record_fields_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let doc = r#"[{"name":"ezEngine","version":"0.6.0","dependencies":[{"name":"base","spec":">=1.0.0"}]}]"#;
        std::fs::write(dir.path().join(MENU_FILE), doc).unwrap();

        let menu = Menu::open(dir.path()).unwrap();
        assert_eq!(menu.len(), 1);
        menu.save().unwrap();

        let saved = std::fs::read_to_string(dir.path().join(MENU_FILE)).unwrap();
        assert!(saved.contains("dependencies"), "extra field lost: {saved}");

        let reloaded = Menu::open(dir.path()).unwrap();
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn saved_document_is_sorted_by_name_then_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut menu = Menu::open(dir.path()).unwrap();
        menu.add(pastry("zeta", "1.0.0"));
        menu.add(pastry("alpha", "2.0.0"));
        menu.add(pastry("alpha", "1.0.0"));
        menu.save().unwrap();

        let doc = std::fs::read_to_string(menu.file_path()).unwrap();
        let records: Vec<serde_json::Value> = serde_json::from_str(&doc).unwrap();
        let names: Vec<&str> = records
            .iter()
            .map(|r| r["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["alpha", "alpha", "zeta"]);
        assert_eq!(records[0]["version"], "1.0.0");
    }
}

//! Receipts: per-project installed-state registries.
//!
//! A receipt records which pastries are currently installed for one project.
//! Projects are identified by a stable hash of the absolute path of their
//! shopping-list file, so two checkouts of the same project get distinct
//! receipts. Layout under the pastries root:
//!
//! ```text
//! <pastries_root>/receipts/
//!   index.json     — project key → content hash of the receipt document
//!   <key>.json     — menu-shaped document of installed descriptors
//! ```
//!
//! The index cross-references every receipt for integrity checking: a
//! receipt whose content hash disagrees with its index entry is a fatal
//! consistency error, never silently repaired.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use bakery_core::Pastry;

use crate::error::{RegistryError, Result};
use crate::menu::Menu;

/// Directory under the pastries root holding receipts and their index.
pub const RECEIPTS_DIR: &str = "receipts";

/// File name of the receipt index inside the receipts directory.
pub const INDEX_FILE: &str = "index.json";

/// A content hash (SHA-256 hex digest).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHash(String);

impl ContentHash {
    /// Compute the SHA-256 hash of the given data.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let digest = hasher.finalize();
        ContentHash(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Derive the stable project key for a shopping-list path.
///
/// The path is made absolute first so the key does not depend on the
/// working directory of the invoking process.
pub fn project_key(shopping_list: &Path) -> String {
    let absolute = if shopping_list.is_absolute() {
        shopping_list.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(shopping_list))
            .unwrap_or_else(|_| shopping_list.to_path_buf())
    };
    ContentHash::compute(absolute.to_string_lossy().as_bytes())
        .as_str()
        .to_string()
}

/// The installed-state registry for one project.
#[derive(Debug)]
pub struct Receipt {
    key: String,
    menu: Menu,
    index_path: PathBuf,
}

impl Receipt {
    /// Open the receipt for `key`, verifying it against the receipt index.
    ///
    /// A receipt that has never been saved yields an empty registry; one
    /// that exists on disk must match the content hash recorded in the
    /// index (a receipt file without an index entry counts as a mismatch).
    pub fn open(pastries_root: &Path, key: &str) -> Result<Self> {
        let receipts_dir = pastries_root.join(RECEIPTS_DIR);
        let file_path = receipts_dir.join(format!("{key}.json"));
        let index_path = receipts_dir.join(INDEX_FILE);

        if file_path.is_file() {
            let data = std::fs::read(&file_path)?;
            let actual = ContentHash::compute(&data);
            let index = load_index(&index_path)?;
            match index.get(key) {
                Some(expected) if expected == actual.as_str() => {}
                _ => {
                    return Err(RegistryError::ReceiptMismatch {
                        key: key.to_string(),
                    })
                }
            }
        }

        let menu = Menu::open_at(pastries_root.to_path_buf(), file_path)?;
        Ok(Receipt {
            key: key.to_string(),
            menu,
            index_path,
        })
    }

    /// The project key this receipt belongs to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Record an installed descriptor. No-op if already recorded.
    pub fn add(&mut self, pastry: Pastry) -> bool {
        self.menu.add(pastry).1
    }

    /// Forget an installed descriptor.
    pub fn remove(&mut self, pastry: &Pastry) -> bool {
        self.menu.remove(pastry)
    }

    /// Exact identity check against the installed set.
    pub fn exists(&self, pastry: &Pastry) -> bool {
        self.menu.exists(pastry)
    }

    pub fn len(&self) -> usize {
        self.menu.len()
    }

    pub fn is_empty(&self) -> bool {
        self.menu.is_empty()
    }

    /// Persist the receipt and update its index entry.
    pub fn save(&self) -> Result<()> {
        self.menu.save()?;

        let data = std::fs::read(self.menu.file_path())?;
        let hash = ContentHash::compute(&data);

        let mut index = load_index(&self.index_path)?;
        index.insert(self.key.clone(), hash.as_str().to_string());
        let json = serde_json::to_vec_pretty(&index)?;

        let tmp_path = {
            let mut name = self.index_path.as_os_str().to_os_string();
            name.push(".tmp");
            PathBuf::from(name)
        };
        let persist = |path: &Path, source: std::io::Error| RegistryError::Persistence {
            path: path.to_path_buf(),
            source,
        };
        std::fs::write(&tmp_path, &json).map_err(|e| persist(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &self.index_path)
            .map_err(|e| persist(&self.index_path, e))?;
        Ok(())
    }
}

fn load_index(index_path: &Path) -> Result<BTreeMap<String, String>> {
    if !index_path.is_file() {
        return Ok(BTreeMap::new());
    }
    let data = std::fs::read_to_string(index_path)?;
    serde_json::from_str(&data).map_err(|e| RegistryError::Corrupt {
        path: index_path.to_path_buf(),
        detail: e.to_string(),
    })
}

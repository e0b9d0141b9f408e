//! The pastry artifact container.
//!
//! Every artifact is a zip archive with exactly two reserved metadata
//! entries plus the packed files at their relative paths:
//!
//! ```text
//! <name>_<version>.zip
//!   pastry.json        — the package's own {name, version, dependencies}
//!   ingredients.json   — list of packed file records
//!   <relative paths>   — the files themselves
//! ```
//!
//! The two metadata names are reserved: they are written by [`pack`] and
//! skipped by [`extract_payload`]. Writes are transactional — the archive is
//! assembled under a `.tmp` suffix and renamed into place only once every
//! member has been written.

pub mod error;

use std::ffi::OsString;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use bakery_core::{Ingredient, PastryManifest};

pub use error::{ArchiveError, Result};

/// Reserved entry name for the package's own record.
pub const MANIFEST_ENTRY: &str = "pastry.json";

/// Reserved entry name for the packed-file records.
pub const INGREDIENTS_ENTRY: &str = "ingredients.json";

/// Pack `ingredients` (paths relative to `base_dir`) and the manifest into a
/// zip archive at `dest`.
///
/// The file appears at `dest` only after all members were written; a partial
/// write leaves at most a stale `.tmp` sibling behind.
pub fn pack(
    dest: &Path,
    manifest: &PastryManifest,
    ingredients: &[Ingredient],
    base_dir: &Path,
) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_sibling(dest);
    let result = write_members(&tmp_path, manifest, ingredients, base_dir);
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
        return result;
    }

    std::fs::rename(&tmp_path, dest)?;
    Ok(())
}

fn write_members(
    tmp_path: &Path,
    manifest: &PastryManifest,
    ingredients: &[Ingredient],
    base_dir: &Path,
) -> Result<()> {
    let mut writer = ZipWriter::new(File::create(tmp_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest_json = serde_json::to_vec_pretty(manifest).map_err(|source| {
        ArchiveError::Json {
            name: MANIFEST_ENTRY.to_string(),
            source,
        }
    })?;
    writer.start_file(MANIFEST_ENTRY, options)?;
    writer.write_all(&manifest_json)?;

    let ingredients_json =
        serde_json::to_vec_pretty(ingredients).map_err(|source| ArchiveError::Json {
            name: INGREDIENTS_ENTRY.to_string(),
            source,
        })?;
    writer.start_file(INGREDIENTS_ENTRY, options)?;
    writer.write_all(&ingredients_json)?;

    for ingredient in ingredients {
        let source_path = base_dir.join(&ingredient.path);
        if !source_path.is_file() {
            return Err(ArchiveError::MissingIngredient { path: source_path });
        }
        writer.start_file(entry_name(&ingredient.path), options)?;
        let mut file = File::open(&source_path)?;
        std::io::copy(&mut file, &mut writer)?;
    }

    writer.finish()?;
    Ok(())
}

/// Read the embedded `pastry.json` record from an archive.
pub fn read_manifest(archive_path: &Path) -> Result<PastryManifest> {
    let bytes = read_entry(archive_path, MANIFEST_ENTRY)?;
    serde_json::from_slice(&bytes).map_err(|source| ArchiveError::Json {
        name: MANIFEST_ENTRY.to_string(),
        source,
    })
}

/// Read the embedded `ingredients.json` records from an archive.
pub fn read_ingredients(archive_path: &Path) -> Result<Vec<Ingredient>> {
    let bytes = read_entry(archive_path, INGREDIENTS_ENTRY)?;
    serde_json::from_slice(&bytes).map_err(|source| ArchiveError::Json {
        name: INGREDIENTS_ENTRY.to_string(),
        source,
    })
}

/// Unpack all archive members except the two reserved metadata entries into
/// `dest_dir`. Returns the number of files written.
///
/// Entries that would resolve outside `dest_dir` are rejected rather than
/// extracted.
pub fn extract_payload(archive_path: &Path, dest_dir: &Path) -> Result<usize> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    std::fs::create_dir_all(dest_dir)?;

    let mut extracted = 0;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        if name == MANIFEST_ENTRY || name == INGREDIENTS_ENTRY {
            continue;
        }

        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ArchiveError::PathEscape { name: name.clone() })?;
        let target = dest_dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;
        extracted += 1;
    }

    Ok(extracted)
}

fn read_entry(archive_path: &Path, name: &str) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ArchiveError::MissingEntry {
                name: name.to_string(),
                path: archive_path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Normalize a relative path into a forward-slash archive entry name.
fn entry_name(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    parts.join("/")
}

fn temp_sibling(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bakery_core::{DependencyRequest, Pastry, VersionSpec};

    fn sample_manifest(deps: Vec<DependencyRequest>) -> PastryManifest {
        let pastry = Pastry::new("sample", "1.0.0").unwrap();
        PastryManifest::new(&pastry, deps)
    }

    fn write_source_tree(dir: &Path) -> Vec<Ingredient> {
        std::fs::create_dir_all(dir.join("bin")).unwrap();
        std::fs::write(dir.join("bin/app"), b"binary bits").unwrap();
        std::fs::write(dir.join("readme.md"), b"docs").unwrap();
        vec![
            Ingredient::new("bin/app").with_tag("platform", "linux64"),
            Ingredient::new("readme.md"),
        ]
    }

    #[test]
    fn pack_and_read_back_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let ingredients = write_source_tree(dir.path());
        let manifest = sample_manifest(vec![DependencyRequest::new(
            "base",
            VersionSpec::parse(">=1.0.0").unwrap(),
        )]);

        let archive_path = dir.path().join("sample_1.0.0.zip");
        pack(&archive_path, &manifest, &ingredients, dir.path()).unwrap();
        assert!(archive_path.is_file());

        let read = read_manifest(&archive_path).unwrap();
        assert_eq!(read, manifest);

        let read_ings = read_ingredients(&archive_path).unwrap();
        assert_eq!(read_ings, ingredients);
    }

    #[test]
    fn extract_skips_reserved_entries() {
        let dir = tempfile::tempdir().unwrap();
        let ingredients = write_source_tree(dir.path());
        let manifest = sample_manifest(Vec::new());

        let archive_path = dir.path().join("sample.zip");
        pack(&archive_path, &manifest, &ingredients, dir.path()).unwrap();

        let out = dir.path().join("install");
        let count = extract_payload(&archive_path, &out).unwrap();
        assert_eq!(count, 2);
        assert!(out.join("bin/app").is_file());
        assert!(out.join("readme.md").is_file());
        assert!(!out.join(MANIFEST_ENTRY).exists());
        assert!(!out.join(INGREDIENTS_ENTRY).exists());
        assert_eq!(std::fs::read(out.join("bin/app")).unwrap(), b"binary bits");
    }

    #[test]
    fn pack_fails_on_missing_ingredient_and_leaves_no_archive() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = sample_manifest(Vec::new());
        let ingredients = vec![Ingredient::new("does/not/exist")];

        let archive_path = dir.path().join("broken.zip");
        let result = pack(&archive_path, &manifest, &ingredients, dir.path());
        assert!(matches!(
            result,
            Err(ArchiveError::MissingIngredient { .. })
        ));
        assert!(!archive_path.exists());
    }

    #[test]
    fn missing_manifest_entry_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // A zip with no pastry.json at all.
        let path = dir.path().join("bare.zip");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        writer
            .start_file("some_file.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"payload").unwrap();
        writer.finish().unwrap();

        let result = read_manifest(&path);
        assert!(matches!(result, Err(ArchiveError::MissingEntry { .. })));
    }

    #[test]
    fn nested_paths_survive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        std::fs::write(dir.path().join("a/b/c/deep.txt"), b"deep").unwrap();
        let ingredients = vec![Ingredient::new("a/b/c/deep.txt")];
        let manifest = sample_manifest(Vec::new());

        let archive_path = dir.path().join("deep.zip");
        pack(&archive_path, &manifest, &ingredients, dir.path()).unwrap();

        let out = dir.path().join("out");
        extract_payload(&archive_path, &out).unwrap();
        assert_eq!(std::fs::read(out.join("a/b/c/deep.txt")).unwrap(), b"deep");
    }
}

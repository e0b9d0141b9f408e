//! Shop backends: where pastries are fetched from and uploaded to.
//!
//! The [`ShopBackend`] trait abstracts over remote sources. [`LocalShop`] is
//! the filesystem-backed implementation used for development, tests, and as
//! the storage behind the HTTP server; [`crate::client::HttpShop`] speaks
//! the wire contract to a remote shop.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use bakery_core::{Pastry, VersionSpec};

use crate::error::{RegistryError, Result};
use crate::menu::Menu;

/// Response header carrying the concrete version resolved by the shop.
pub const VERSION_HEADER: &str = "X-Pastry-Version";

/// Route for resolving and downloading a pastry.
pub const GET_PASTRY_ROUTE: &str = "/get_pastry";

/// Route for uploading a pastry archive.
pub const UPLOAD_PASTRY_ROUTE: &str = "/upload_pastry";

/// JSON body of shop responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopResponse {
    pub result: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ShopResponse {
    pub fn ok() -> Self {
        ShopResponse {
            result: "Ok".to_string(),
            errors: Vec::new(),
        }
    }

    pub fn error(errors: Vec<String>) -> Self {
        ShopResponse {
            result: "Error".to_string(),
            errors,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result == "Ok"
    }
}

/// Bytes-transferred callback for downloads: `(transferred, total_if_known)`.
///
/// Advisory only; it drives progress display and has no effect on
/// correctness.
pub type ProgressFn<'a> = &'a mut dyn FnMut(u64, Option<u64>);

/// A resolved and downloaded artifact, parked in a scratch location until
/// the caller commits it into a menu.
#[derive(Debug)]
pub struct FetchedPastry {
    /// The concrete descriptor the shop resolved the request to.
    pub pastry: Pastry,
    /// Where the archive bytes were written.
    pub archive_path: PathBuf,
}

/// A source of pastries.
pub trait ShopBackend {
    /// Resolve `name` + `spec` to the best matching concrete version and
    /// stream its archive into `scratch_dir`.
    fn fetch(
        &self,
        name: &str,
        spec: &VersionSpec,
        scratch_dir: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<FetchedPastry>;

    /// Upload an archive for `pastry`. The archive's embedded descriptor
    /// must agree with `pastry`. An already-stocked descriptor is a no-op
    /// unless `force` is set.
    fn upload(&mut self, pastry: &Pastry, archive: &[u8], force: bool) -> Result<()>;
}

/// A filesystem shop: a menu plus artifact files under one directory.
#[derive(Debug)]
pub struct LocalShop {
    menu: Menu,
}

impl LocalShop {
    /// Open (or initialize) a shop rooted at the given directory.
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(LocalShop {
            menu: Menu::open(root)?,
        })
    }

    /// Resolve a request against the stock without downloading anything.
    pub fn resolve(&self, name: &str, spec: &VersionSpec) -> Result<Pastry> {
        self.menu
            .get(name, spec)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
                spec: spec.to_string(),
            })
    }

    /// The artifact path for a stocked descriptor.
    pub fn archive_path(&self, pastry: &Pastry) -> PathBuf {
        self.menu.make_path(pastry)
    }

    /// The menu backing this shop.
    pub fn menu(&self) -> &Menu {
        &self.menu
    }
}

impl ShopBackend for LocalShop {
    fn fetch(
        &self,
        name: &str,
        spec: &VersionSpec,
        scratch_dir: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<FetchedPastry> {
        let pastry = self.resolve(name, spec)?;
        let source = self.archive_path(&pastry);
        if !source.is_file() {
            return Err(RegistryError::Corrupt {
                path: source,
                detail: format!("menu lists {pastry} but its artifact file is missing"),
            });
        }

        std::fs::create_dir_all(scratch_dir)?;
        let dest = scratch_dir.join(pastry.file_name());
        let total = std::fs::metadata(&source)?.len();
        let mut reader = std::fs::File::open(&source)?;
        let mut writer = std::fs::File::create(&dest)?;
        copy_with_progress(&mut reader, &mut writer, Some(total), progress)?;

        debug!(%pastry, path = %dest.display(), "fetched from local shop");
        Ok(FetchedPastry {
            pastry,
            archive_path: dest,
        })
    }

    fn upload(&mut self, pastry: &Pastry, archive: &[u8], force: bool) -> Result<()> {
        if self.menu.exists(pastry) && !force {
            debug!(%pastry, "already stocked, ignoring upload");
            return Ok(());
        }

        let dest = self.menu.make_path(pastry);
        let tmp_path = {
            let mut name = dest.as_os_str().to_os_string();
            name.push(".tmp");
            PathBuf::from(name)
        };
        std::fs::write(&tmp_path, archive)?;

        // The archive must carry the identity it is being stocked under.
        let declared = match bakery_archive::read_manifest(&tmp_path) {
            Ok(manifest) => manifest.pastry(),
            Err(e) => {
                let _ = std::fs::remove_file(&tmp_path);
                return Err(e.into());
            }
        };
        if &declared != pastry {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(RegistryError::ArtifactMismatch {
                expected: pastry.to_string(),
                found: declared.to_string(),
            });
        }

        std::fs::rename(&tmp_path, &dest)?;

        self.menu.add(pastry.clone());
        self.menu.save()?;
        debug!(%pastry, "stocked");
        Ok(())
    }
}

/// Copy `reader` into `writer` in chunks, reporting transferred bytes.
pub(crate) fn copy_with_progress(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    total: Option<u64>,
    progress: ProgressFn<'_>,
) -> Result<u64> {
    let mut buffer = [0u8; 8 * 1024];
    let mut transferred = 0u64;
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n])?;
        transferred += n as u64;
        progress(transferred, total);
    }
    writer.flush()?;
    Ok(transferred)
}

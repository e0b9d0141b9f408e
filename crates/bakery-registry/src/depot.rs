//! Upload orchestration: hand a finished artifact to a shop.

use std::path::Path;

use tracing::info;

use bakery_core::Pastry;

use crate::error::Result;
use crate::shop::ShopBackend;

/// Upload the artifact at `archive_path` to the shop.
///
/// The descriptor is taken from the archive's own embedded manifest, so a
/// caller cannot publish an artifact under a different identity than it
/// declares. Returns the descriptor that was deposited.
pub fn deposit(shop: &mut dyn ShopBackend, archive_path: &Path, force: bool) -> Result<Pastry> {
    let manifest = bakery_archive::read_manifest(archive_path)?;
    let pastry = manifest.pastry();
    let archive = std::fs::read(archive_path)?;
    shop.upload(&pastry, &archive, force)?;
    info!(%pastry, bytes = archive.len(), "deposited");
    Ok(pastry)
}

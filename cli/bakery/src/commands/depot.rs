//! `bakery depot`: upload baked artifacts to a shop.

use std::path::{Path, PathBuf};

use bakery_registry::{deposit, HttpShop};

use crate::config::ShopConfig;

pub fn run(archives: &[PathBuf], config_path: &Path, force: bool) -> anyhow::Result<()> {
    let config = ShopConfig::load_or_default(config_path)?;
    let mut shop = HttpShop::new(&config.client_url())?;

    let mut failed = 0usize;
    for archive in archives {
        match deposit(&mut shop, archive, force) {
            Ok(pastry) => println!("deposited {pastry}"),
            Err(error) => {
                eprintln!("failed {}: {error}", archive.display());
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} archives failed", archives.len());
    }
    Ok(())
}

//! `bakery basket`: install the shopping list's pastries from the shop.

use std::io::Write;
use std::path::Path;

use bakery_registry::{project_key, Basket, BasketOptions, HttpShop, Menu, PastryRequest, Receipt};

use crate::config::ShoppingListConfig;

pub fn run(config_path: &Path, force_download: bool, force_install: bool) -> anyhow::Result<()> {
    let config = ShoppingListConfig::load(config_path)?;
    if config.pastries.is_empty() {
        anyhow::bail!("{} requests no pastries", config_path.display());
    }

    let requests: Vec<PastryRequest> = config
        .pastries
        .iter()
        .map(|entry| {
            PastryRequest::new(
                entry.name.as_str(),
                entry.version.clone(),
                entry.destination.as_path(),
            )
        })
        .collect();

    let key = project_key(config_path);
    let mut menu = Menu::open(&config.pastries_root)?;
    let mut receipt = Receipt::open(&config.pastries_root, &key)?;
    let shop = HttpShop::new(&config.shop_url)?;
    let options = BasketOptions {
        force_download,
        force_install,
    };

    let mut basket = Basket::new(&mut menu, &mut receipt, &shop, options).on_progress(
        |name, transferred, total| {
            let mut stderr = std::io::stderr();
            let _ = match total {
                Some(total) => write!(stderr, "\r{name}: {transferred}/{total} bytes"),
                None => write!(stderr, "\r{name}: {transferred} bytes"),
            };
        },
    );
    let report = basket.restock(&requests)?;
    eprintln!();

    for pastry in &report.installed {
        println!("installed {pastry}");
    }
    for pastry in &report.skipped {
        println!("skipped {pastry} (already installed)");
    }
    if !report.is_success() {
        for (name, error) in &report.errors {
            eprintln!("failed {name}: {error}");
        }
        anyhow::bail!("{} package(s) failed", report.errors.len());
    }
    Ok(())
}

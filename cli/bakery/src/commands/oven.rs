//! `bakery oven`: bake the recipe's pastries into the local menu.

use std::path::{Path, PathBuf};

use bakery_registry::{bake, Menu, Pot, RecipeSet};

use crate::config::RecipeConfig;

pub fn run(config_path: &Path, force: bool) -> anyhow::Result<()> {
    let config = RecipeConfig::load(config_path)?;
    if config.pastries.is_empty() {
        anyhow::bail!("{} declares no pastries", config_path.display());
    }

    let base_dir = config.base_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let mut recipes = RecipeSet::new();
    for entry in config.pastries {
        let base = base_dir.clone();
        recipes.register(Box::new(move |pot: &mut Pot| {
            let builder = pot.pastry(&entry.name, &entry.version)?;
            for ingredient in entry.ingredients {
                let mut ingredient = ingredient.into_ingredient();
                ingredient.make_relative_to(&base);
                builder.add_ingredient(ingredient);
            }
            for dependency in entry.dependencies {
                builder.add_dependency(&dependency.name, dependency.spec);
            }
            Ok(())
        }));
    }
    let pot = recipes.prepare()?;
    let total = pot.len();

    let mut menu = Menu::open(&config.pastries_root)?;
    let report = bake(&mut menu, pot, &base_dir, force)?;

    for pastry in &report.baked {
        println!("baked {pastry}");
    }
    for pastry in &report.skipped {
        println!("skipped {pastry} (already on the menu)");
    }
    if !report.is_success() {
        for (pastry, error) in &report.errors {
            eprintln!("failed {pastry}: {error}");
        }
        anyhow::bail!("{} of {total} pastries failed", report.errors.len());
    }
    Ok(())
}

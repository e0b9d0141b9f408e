//! Build-side publishing: assemble pastries from recipes and commit them
//! to a menu.
//!
//! Recipes are registered explicitly on a [`RecipeSet`] and run against a
//! [`Pot`], the in-memory accumulator of pastries under construction. There
//! is no ambient global recipe state; whoever drives a bake owns the set.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, warn};

use bakery_core::{DependencyRequest, Ingredient, Pastry, PastryManifest, VersionSpec};

use crate::error::Result;
use crate::menu::Menu;

/// One pastry under construction: its ingredients and declared
/// dependencies.
#[derive(Debug)]
pub struct PastryBuilder {
    pastry: Pastry,
    ingredients: Vec<Ingredient>,
    dependencies: Vec<DependencyRequest>,
}

impl PastryBuilder {
    fn new(pastry: Pastry) -> Self {
        PastryBuilder {
            pastry,
            ingredients: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// The descriptor this builder assembles.
    pub fn pastry(&self) -> &Pastry {
        &self.pastry
    }

    /// Add a file to be packed into the artifact.
    pub fn add_ingredient(&mut self, ingredient: Ingredient) -> &mut Self {
        self.ingredients.push(ingredient);
        self
    }

    /// Declare a dependency on another pastry.
    pub fn add_dependency(&mut self, name: &str, spec: VersionSpec) -> &mut Self {
        self.dependencies.push(DependencyRequest::new(name, spec));
        self
    }

    pub fn ingredients(&self) -> &[Ingredient] {
        &self.ingredients
    }

    /// The manifest embedded into the artifact.
    pub fn manifest(&self) -> PastryManifest {
        PastryManifest::new(&self.pastry, self.dependencies.clone())
    }
}

/// In-memory accumulator of pastries under construction, keyed by
/// descriptor. Asking twice for the same (name, version) yields the same
/// builder, so recipes contributing to one pastry merge.
#[derive(Debug, Default)]
pub struct Pot {
    builders: BTreeMap<Pastry, PastryBuilder>,
}

impl Pot {
    pub fn new() -> Self {
        Pot::default()
    }

    /// The builder for `name` at `version`, created on first use.
    pub fn pastry(&mut self, name: &str, version: &str) -> Result<&mut PastryBuilder> {
        let pastry = Pastry::new(name, version)?;
        Ok(self
            .builders
            .entry(pastry.clone())
            .or_insert_with(|| PastryBuilder::new(pastry)))
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PastryBuilder> {
        self.builders.values()
    }
}

/// Recipe callback: contributes pastries to a pot.
pub type Recipe = Box<dyn FnOnce(&mut Pot) -> Result<()>>;

/// An explicit collection of recipes. Running it produces the pot to bake.
#[derive(Default)]
pub struct RecipeSet {
    recipes: Vec<Recipe>,
}

impl RecipeSet {
    pub fn new() -> Self {
        RecipeSet::default()
    }

    pub fn register(&mut self, recipe: Recipe) {
        self.recipes.push(recipe);
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Run every recipe into a fresh pot.
    pub fn prepare(self) -> Result<Pot> {
        let mut pot = Pot::new();
        for recipe in self.recipes {
            recipe(&mut pot)?;
        }
        Ok(pot)
    }
}

/// Outcome of one bake run.
#[derive(Debug, Default)]
pub struct BakeReport {
    /// Pastries packed and committed to the menu.
    pub baked: Vec<Pastry>,
    /// Pastries already on the menu, left untouched.
    pub skipped: Vec<Pastry>,
    /// Per-pastry failures. Siblings still bake.
    pub errors: Vec<(Pastry, crate::error::RegistryError)>,
}

impl BakeReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Bake every pastry in the pot into the menu.
///
/// Each pastry commits independently: its archive is packed at
/// `menu.make_path`, then the entry is added and the menu saved. A failure
/// on one pastry is recorded in the report and does not roll back
/// already-committed siblings. Menu persistence failures are fatal and
/// abort the run.
pub fn bake(menu: &mut Menu, pot: Pot, base_dir: &Path, force: bool) -> Result<BakeReport> {
    let mut report = BakeReport::default();

    for (pastry, builder) in pot.builders {
        if menu.exists(&pastry) && !force {
            info!(%pastry, "already on the menu, skipping");
            report.skipped.push(pastry);
            continue;
        }

        let dest = menu.make_path(&pastry);
        let manifest = builder.manifest();
        match bakery_archive::pack(&dest, &manifest, &builder.ingredients, base_dir) {
            Ok(()) => {}
            Err(e) => {
                warn!(%pastry, error = %e, "failed to pack");
                report.errors.push((pastry, e.into()));
                continue;
            }
        }

        menu.add(pastry.clone());
        menu.save()?;
        info!(%pastry, path = %dest.display(), "baked");
        report.baked.push(pastry);
    }

    Ok(report)
}

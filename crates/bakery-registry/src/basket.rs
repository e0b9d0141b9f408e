//! Install-side resolution: fill a basket from local stock and the shop.
//!
//! Each requested pastry goes through the same pipeline: resolve against the
//! local menu (shop fallback), verify the artifact's embedded descriptor,
//! install declared dependencies first, then extract the payload into the
//! destination and record it on the project's receipt. Failures are scoped
//! to the branch that produced them: a failed dependency aborts extraction
//! of everything that depends on it, while unrelated siblings keep going
//! and every error lands in the report.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use bakery_core::{Pastry, PastryManifest, VersionSpec};

use crate::error::{RegistryError, Result};
use crate::menu::Menu;
use crate::receipt::Receipt;
use crate::shop::ShopBackend;

/// Depth guard for dependency recursion. Honest dependency chains stay far
/// below this; hitting it means a cycle the visiting stack did not catch.
pub const MAX_DEPTH: usize = 16;

/// One requested install: what to get and where to put it.
#[derive(Debug, Clone)]
pub struct PastryRequest {
    pub name: String,
    pub spec: VersionSpec,
    pub destination: PathBuf,
}

impl PastryRequest {
    pub fn new(name: impl Into<String>, spec: VersionSpec, destination: impl Into<PathBuf>) -> Self {
        PastryRequest {
            name: name.into(),
            spec,
            destination: destination.into(),
        }
    }
}

/// Knobs for one restock run.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasketOptions {
    /// Fetch from the shop even when a satisfying artifact is stocked
    /// locally.
    pub force_download: bool,
    /// Extract even when the receipt already records the descriptor.
    pub force_install: bool,
}

/// Outcome of one restock run.
#[derive(Debug, Default)]
pub struct InstallReport {
    /// Pastries extracted and recorded on the receipt, dependencies before
    /// their dependents.
    pub installed: Vec<Pastry>,
    /// Pastries already on the receipt, left untouched.
    pub skipped: Vec<Pastry>,
    /// Per-branch failures, keyed by the package name that failed.
    pub errors: Vec<(String, RegistryError)>,
}

impl InstallReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// The install engine: local menu, project receipt, and a shop to fall
/// back to.
pub struct Basket<'a> {
    menu: &'a mut Menu,
    receipt: &'a mut Receipt,
    shop: &'a dyn ShopBackend,
    options: BasketOptions,
    progress: Box<dyn FnMut(&str, u64, Option<u64>) + 'a>,
}

impl<'a> Basket<'a> {
    pub fn new(
        menu: &'a mut Menu,
        receipt: &'a mut Receipt,
        shop: &'a dyn ShopBackend,
        options: BasketOptions,
    ) -> Self {
        Basket {
            menu,
            receipt,
            shop,
            options,
            progress: Box::new(|_, _, _| {}),
        }
    }

    /// Install a download progress hook: `(name, transferred, total)`.
    pub fn on_progress(mut self, hook: impl FnMut(&str, u64, Option<u64>) + 'a) -> Self {
        self.progress = Box::new(hook);
        self
    }

    /// Install every request. Per-package failures are collected in the
    /// report; registry-integrity failures abort the run. The receipt is
    /// persisted once at the end.
    pub fn restock(&mut self, requests: &[PastryRequest]) -> Result<InstallReport> {
        let mut report = InstallReport::default();

        for request in requests {
            let mut visiting = Vec::new();
            let result = self.install(
                &request.name,
                &request.spec,
                &request.destination,
                &mut visiting,
                &mut report,
            );
            match result {
                // `Ok(false)` means the branch failed and already put its
                // error in the report.
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(name = %request.name, error = %e, "install failed");
                    report.errors.push((request.name.clone(), e));
                }
            }
        }

        self.receipt.save()?;
        Ok(report)
    }

    /// Install one branch of the dependency tree. Returns `Ok(true)` when
    /// `name` (and everything below it) is present in the destination, and
    /// `Ok(false)` when the branch failed with its error already recorded
    /// in the report; a failed branch is never extracted or put on the
    /// receipt.
    fn install(
        &mut self,
        name: &str,
        spec: &VersionSpec,
        destination: &Path,
        visiting: &mut Vec<String>,
        report: &mut InstallReport,
    ) -> Result<bool> {
        if visiting.iter().any(|n| n == name) || visiting.len() >= MAX_DEPTH {
            return Err(RegistryError::DependencyCycle {
                name: name.to_string(),
                limit: MAX_DEPTH,
            });
        }

        let (pastry, archive_path, manifest) = self.acquire(name, spec)?;

        if self.receipt.exists(&pastry) && !self.options.force_install {
            debug!(%pastry, "already installed, skipping");
            report.skipped.push(pastry);
            return Ok(true);
        }

        visiting.push(name.to_string());
        let mut dependencies_ok = true;
        for dependency in &manifest.dependencies {
            let result = self.install(
                &dependency.name,
                &dependency.spec,
                destination,
                visiting,
                report,
            );
            match result {
                Ok(true) => {}
                Ok(false) => dependencies_ok = false,
                Err(e) if e.is_fatal() => {
                    visiting.pop();
                    return Err(e);
                }
                Err(e) => {
                    warn!(dependency = %dependency, error = %e, "dependency failed");
                    report.errors.push((dependency.name.clone(), e));
                    dependencies_ok = false;
                }
            }
        }
        visiting.pop();

        if !dependencies_ok {
            warn!(%pastry, "not installed, a dependency failed");
            return Ok(false);
        }

        let files = bakery_archive::extract_payload(&archive_path, destination)?;
        self.receipt.add(pastry.clone());
        info!(%pastry, files, dest = %destination.display(), "installed");
        report.installed.push(pastry);
        Ok(true)
    }

    /// Get the artifact for `name` + `spec` into local stock: resolve
    /// against the menu first, fall back to the shop, and verify the
    /// embedded descriptor either way.
    fn acquire(
        &mut self,
        name: &str,
        spec: &VersionSpec,
    ) -> Result<(Pastry, PathBuf, PastryManifest)> {
        if !self.options.force_download {
            if let Some(pastry) = self.menu.get(name, spec).cloned() {
                let path = self.menu.make_path(&pastry);
                if path.is_file() {
                    let manifest = verified_manifest(&path, &pastry)?;
                    debug!(%pastry, "resolved from local stock");
                    return Ok((pastry, path, manifest));
                }
                // Entry without its artifact file: fall through to the shop.
                warn!(%pastry, "stocked entry has no artifact file, refetching");
            }
        }

        let scratch = self.menu.root().join("scratch");
        let shop = self.shop;
        let progress = &mut self.progress;
        let mut on_bytes = |transferred, total| progress(name, transferred, total);
        let fetched = shop.fetch(name, spec, &scratch, &mut on_bytes)?;

        let manifest = match verified_manifest(&fetched.archive_path, &fetched.pastry) {
            Ok(manifest) => manifest,
            Err(e) => {
                let _ = std::fs::remove_file(&fetched.archive_path);
                return Err(e);
            }
        };

        let dest = self.menu.make_path(&fetched.pastry);
        std::fs::rename(&fetched.archive_path, &dest)?;
        self.menu.add(fetched.pastry.clone());
        self.menu.save()?;
        Ok((fetched.pastry, dest, manifest))
    }
}

/// Read an artifact's embedded manifest and check that it describes the
/// descriptor it was obtained as.
fn verified_manifest(archive_path: &Path, expected: &Pastry) -> Result<PastryManifest> {
    let manifest = bakery_archive::read_manifest(archive_path)?;
    let found = manifest.pastry();
    if &found != expected {
        return Err(RegistryError::ArtifactMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
    Ok(manifest)
}

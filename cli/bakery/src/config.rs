//! Configuration files for the bakery commands.
//!
//! Three TOML files drive the CLI: `recipe.toml` (what `oven` bakes),
//! `shopping_list.toml` (what `basket` installs), and `shop_config.toml`
//! (where `shop` listens and `depot` uploads). All fields have defaults and
//! are resolved once at load time; relative paths inside a file are taken
//! relative to the file's own directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use bakery_core::{Ingredient, VersionSpec};

fn default_pastries_root() -> PathBuf {
    PathBuf::from("pastries")
}

fn default_destination() -> PathBuf {
    PathBuf::from("install")
}

fn default_shop_url() -> String {
    "http://localhost:8570".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8570
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn config_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf()
}

/// `recipe.toml`: the pastries `oven` bakes.
///
/// ```toml
/// pastries_root = "pastries"
///
/// [[pastry]]
/// name = "game"
/// version = "1.0.0"
/// ingredients = ["game/main.dat", { path = "bin/game", tags = { platform = "linux64" } }]
/// dependencies = [{ name = "engine", spec = ">=0.5.0,<0.7.0" }]
/// ```
#[derive(Debug, Deserialize)]
pub struct RecipeConfig {
    /// Where the menu and baked artifacts go.
    #[serde(default = "default_pastries_root")]
    pub pastries_root: PathBuf,
    /// Ingredient paths are relative to this directory. Defaults to the
    /// recipe file's directory.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(default, rename = "pastry")]
    pub pastries: Vec<RecipeEntry>,
}

#[derive(Debug, Deserialize)]
pub struct RecipeEntry {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub ingredients: Vec<IngredientEntry>,
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
}

/// An ingredient is either a bare path or a path with tags.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IngredientEntry {
    Path(PathBuf),
    Tagged {
        path: PathBuf,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
}

impl IngredientEntry {
    pub fn into_ingredient(self) -> Ingredient {
        match self {
            IngredientEntry::Path(path) => Ingredient::new(path),
            IngredientEntry::Tagged { path, tags } => {
                let mut ingredient = Ingredient::new(path);
                for (key, value) in tags {
                    ingredient = ingredient.with_tag(key, value);
                }
                ingredient
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DependencyEntry {
    pub name: String,
    #[serde(default = "VersionSpec::any")]
    pub spec: VersionSpec,
}

impl RecipeConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config: RecipeConfig = read_toml(path)?;
        let dir = config_dir(path);
        config.pastries_root = dir.join(&config.pastries_root);
        config.base_dir = Some(match config.base_dir.take() {
            Some(base) => dir.join(base),
            None => dir,
        });
        Ok(config)
    }

    /// The resolved ingredient base directory.
    pub fn base_dir(&self) -> &Path {
        // Always Some after load.
        self.base_dir.as_deref().unwrap_or_else(|| Path::new("."))
    }
}

/// `shopping_list.toml`: the pastries `basket` installs.
///
/// ```toml
/// shop_url = "http://localhost:8570"
/// pastries_root = "pastries"
///
/// [[pastry]]
/// name = "game"
/// version = ">=1.0.0,<2.0.0"
/// destination = "install"
/// ```
#[derive(Debug, Deserialize)]
pub struct ShoppingListConfig {
    #[serde(default = "default_shop_url")]
    pub shop_url: String,
    #[serde(default = "default_pastries_root")]
    pub pastries_root: PathBuf,
    #[serde(default, rename = "pastry")]
    pub pastries: Vec<ShoppingEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ShoppingEntry {
    pub name: String,
    /// Acceptable version range; any version when omitted.
    #[serde(default = "VersionSpec::any")]
    pub version: VersionSpec,
    #[serde(default = "default_destination")]
    pub destination: PathBuf,
}

impl ShoppingListConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config: ShoppingListConfig = read_toml(path)?;
        let dir = config_dir(path);
        config.pastries_root = dir.join(&config.pastries_root);
        for entry in &mut config.pastries {
            entry.destination = dir.join(&entry.destination);
        }
        Ok(config)
    }
}

/// `shop_config.toml`: shared by the `shop` server and `depot` uploads.
///
/// ```toml
/// host = "127.0.0.1"
/// port = 8570
/// pastries_root = "pastries"
/// # depot connects to `url` when set, http://<host>:<port> otherwise
/// url = "http://shop.example.com"
/// ```
#[derive(Debug, Deserialize)]
pub struct ShopConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_pastries_root")]
    pub pastries_root: PathBuf,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for ShopConfig {
    fn default() -> Self {
        ShopConfig {
            host: default_host(),
            port: default_port(),
            pastries_root: default_pastries_root(),
            url: None,
        }
    }
}

impl ShopConfig {
    /// Load the config, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.is_file() {
            return Ok(ShopConfig::default());
        }
        let mut config: ShopConfig = read_toml(path)?;
        config.pastries_root = config_dir(path).join(&config.pastries_root);
        Ok(config)
    }

    /// The URL clients connect to.
    pub fn client_url(&self) -> String {
        self.url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }

    /// The address the server binds.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_parses_with_tagged_and_bare_ingredients() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipe.toml");
        std::fs::write(
            &path,
            r#"
[[pastry]]
name = "game"
version = "1.0.0"
ingredients = ["game/main.dat", { path = "bin/game", tags = { platform = "linux64" } }]
dependencies = [{ name = "engine", spec = ">=0.5.0,<0.7.0" }]

[[pastry]]
name = "engine"
version = "0.6.0"
ingredients = ["engine/core.dat"]
"#,
        )
        .unwrap();

        let config = RecipeConfig::load(&path).unwrap();
        assert_eq!(config.pastries_root, dir.path().join("pastries"));
        assert_eq!(config.base_dir(), dir.path());
        assert_eq!(config.pastries.len(), 2);

        let game = &config.pastries[0];
        assert_eq!(game.ingredients.len(), 2);
        assert_eq!(game.dependencies[0].spec.to_string(), ">=0.5.0,<0.7.0");
    }

    #[test]
    fn shopping_list_defaults_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shopping_list.toml");
        std::fs::write(
            &path,
            r#"
[[pastry]]
name = "game"
"#,
        )
        .unwrap();

        let config = ShoppingListConfig::load(&path).unwrap();
        assert_eq!(config.shop_url, "http://localhost:8570");
        assert_eq!(config.pastries[0].destination, dir.path().join("install"));
        assert!(config.pastries[0].version.is_any());
    }

    #[test]
    fn shop_config_defaults_when_file_is_absent() {
        let config = ShopConfig::load_or_default(Path::new("/no/such/shop_config.toml")).unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:8570");
        assert_eq!(config.client_url(), "http://127.0.0.1:8570");
        assert_eq!(config.pastries_root, PathBuf::from("pastries"));
    }

    #[test]
    fn explicit_url_wins_for_clients() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop_config.toml");
        std::fs::write(&path, "url = \"http://shop.example.com\"\nport = 9000\n").unwrap();

        let config = ShopConfig::load_or_default(&path).unwrap();
        assert_eq!(config.client_url(), "http://shop.example.com");
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn invalid_spec_fails_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shopping_list.toml");
        std::fs::write(
            &path,
            r#"
[[pastry]]
name = "game"
version = "not a spec"
"#,
        )
        .unwrap();

        assert!(ShoppingListConfig::load(&path).is_err());
    }
}

//! End-to-end flow: bake pastries from recipes, stock a shop, and restock
//! a project basket from it.

use std::path::Path;

use bakery_core::{Ingredient, VersionSpec};
use bakery_registry::{
    bake, deposit, project_key, Basket, BasketOptions, LocalShop, Menu, PastryRequest, Pot,
    Receipt, RecipeSet,
};

fn write_file(dir: &Path, name: &str, contents: &str) {
    if let Some(parent) = dir.join(name).parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(dir.join(name), contents).unwrap();
}

#[test]
fn bake_deposit_and_restock_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source");
    std::fs::create_dir_all(&source).unwrap();
    write_file(&source, "engine/core.dat", "engine bits");
    write_file(&source, "game/main.dat", "game bits");

    // Bake: two pastries, the game depending on the engine.
    let mut recipes = RecipeSet::new();
    recipes.register(Box::new(|pot: &mut Pot| {
        pot.pastry("engine", "0.6.0")?
            .add_ingredient(Ingredient::new("engine/core.dat"));
        Ok(())
    }));
    recipes.register(Box::new(|pot: &mut Pot| {
        pot.pastry("game", "1.0.0")?
            .add_ingredient(Ingredient::new("game/main.dat"))
            .add_dependency("engine", VersionSpec::parse(">=0.5.0,<0.7.0").unwrap());
        Ok(())
    }));
    let pot = recipes.prepare().unwrap();

    let build_root = dir.path().join("build");
    let mut build_menu = Menu::open(&build_root).unwrap();
    let report = bake(&mut build_menu, pot, &source, false).unwrap();
    assert!(report.is_success());
    assert_eq!(report.baked.len(), 2);

    // Deposit both artifacts into a shop.
    let mut shop = LocalShop::open(&dir.path().join("shop")).unwrap();
    for pastry in &report.baked {
        deposit(&mut shop, &build_menu.make_path(pastry), false).unwrap();
    }

    // Restock a fresh project from the shop.
    let local_root = dir.path().join("pastries");
    let dest = dir.path().join("install");
    let key = project_key(&dir.path().join("shopping_list.toml"));

    let mut menu = Menu::open(&local_root).unwrap();
    let mut receipt = Receipt::open(&local_root, &key).unwrap();
    let mut downloads = Vec::new();
    let mut basket = Basket::new(&mut menu, &mut receipt, &shop, BasketOptions::default())
        .on_progress(|name, transferred, _| downloads.push((name.to_string(), transferred)));

    let requests = [PastryRequest::new(
        "game",
        VersionSpec::parse("1.0.0").unwrap(),
        &dest,
    )];
    let report = basket.restock(&requests).unwrap();
    drop(basket);

    assert!(report.is_success());
    assert_eq!(report.installed.len(), 2);
    assert_eq!(report.installed[0].name, "engine");
    assert_eq!(report.installed[1].name, "game");
    assert_eq!(
        std::fs::read(dest.join("engine/core.dat")).unwrap(),
        b"engine bits"
    );
    assert_eq!(
        std::fs::read(dest.join("game/main.dat")).unwrap(),
        b"game bits"
    );
    assert!(!downloads.is_empty());

    // The project receipt survives a reopen.
    let reopened = Receipt::open(&local_root, &key).unwrap();
    assert_eq!(reopened.len(), 2);
}

#[test]
fn restock_prefers_highest_stocked_version() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source");
    std::fs::create_dir_all(&source).unwrap();
    write_file(&source, "lib.dat", "lib");

    let mut pot = Pot::new();
    for version in ["0.1.0", "0.2.0", "0.2.1", "0.3.0"] {
        pot.pastry("lib", version)
            .unwrap()
            .add_ingredient(Ingredient::new("lib.dat"));
    }

    let shop_root = dir.path().join("shop");
    let mut shop_menu = Menu::open(&shop_root).unwrap();
    bake(&mut shop_menu, pot, &source, false).unwrap();
    let shop = LocalShop::open(&shop_root).unwrap();

    let local_root = dir.path().join("pastries");
    let dest = dir.path().join("install");
    let key = project_key(&dir.path().join("list.toml"));
    let mut menu = Menu::open(&local_root).unwrap();
    let mut receipt = Receipt::open(&local_root, &key).unwrap();
    let mut basket = Basket::new(&mut menu, &mut receipt, &shop, BasketOptions::default());

    let requests = [PastryRequest::new(
        "lib",
        VersionSpec::parse(">0.1.0,<0.3.0,!=0.2.0").unwrap(),
        &dest,
    )];
    let report = basket.restock(&requests).unwrap();

    assert!(report.is_success());
    assert_eq!(report.installed[0].version.to_string(), "0.2.1");
}

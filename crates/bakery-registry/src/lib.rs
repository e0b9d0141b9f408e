//! Registry, receipts, and shop orchestration for the bakery package
//! manager.
//!
//! The pieces fit together like this:
//!
//! - [`Menu`] is the file-backed registry mapping pastry descriptors to
//!   artifact files under one directory.
//! - [`Receipt`] is the per-project installed-state registry, integrity
//!   checked against a content-hash index.
//! - [`ShopBackend`] abstracts over pastry sources: [`LocalShop`] serves
//!   from a directory, [`HttpShop`] speaks the shop wire contract.
//! - [`oven`] bakes pastries from recipes into a menu, [`Basket`] installs
//!   them (dependencies first) into a destination, and [`depot`] uploads
//!   finished artifacts.

pub mod basket;
pub mod client;
pub mod depot;
pub mod error;
pub mod menu;
pub mod oven;
pub mod receipt;
pub mod shop;

pub use basket::{Basket, BasketOptions, InstallReport, PastryRequest};
pub use client::HttpShop;
pub use depot::deposit;
pub use error::{RegistryError, Result};
pub use menu::{Menu, MenuEntry, MENU_FILE};
pub use oven::{bake, BakeReport, PastryBuilder, Pot, Recipe, RecipeSet};
pub use receipt::{project_key, ContentHash, Receipt};
pub use shop::{
    FetchedPastry, LocalShop, ProgressFn, ShopBackend, ShopResponse, GET_PASTRY_ROUTE,
    UPLOAD_PASTRY_ROUTE, VERSION_HEADER,
};

//! Bakery CLI: bake, stock, and install pastry packages.

mod commands;
mod config;
mod server;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bakery", version, about = "Bake, stock, and install pastry packages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bake the recipe's pastries into the local menu
    Oven {
        /// Recipe file
        #[arg(short, long, default_value = "recipe.toml")]
        config: PathBuf,
        /// Rebuild pastries already on the menu
        #[arg(long)]
        force: bool,
    },
    /// Install the shopping list's pastries
    Basket {
        /// Shopping list file
        #[arg(short, long, default_value = "shopping_list.toml")]
        config: PathBuf,
        /// Fetch from the shop even when stocked locally
        #[arg(long)]
        force_download: bool,
        /// Extract even when already installed
        #[arg(long)]
        force_install: bool,
    },
    /// Upload baked artifacts to a shop
    Depot {
        /// Artifact files to upload
        #[arg(required = true)]
        archives: Vec<PathBuf>,
        /// Shop config file
        #[arg(short, long, default_value = "shop_config.toml")]
        config: PathBuf,
        /// Replace already-stocked versions
        #[arg(long)]
        force: bool,
    },
    /// Serve the shop over HTTP
    Shop {
        /// Shop config file
        #[arg(short, long, default_value = "shop_config.toml")]
        config: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bakery=info,tower_http=info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Oven { config, force } => commands::oven::run(&config, force),
        Commands::Basket {
            config,
            force_download,
            force_install,
        } => commands::basket::run(&config, force_download, force_install),
        Commands::Depot {
            archives,
            config,
            force,
        } => commands::depot::run(&archives, &config, force),
        Commands::Shop { config } => server::run(&config),
    }
}

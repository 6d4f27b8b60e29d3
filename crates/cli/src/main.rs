//! Bazaar CLI - Marketplace client from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password from --password or BAZAAR_PASSWORD)
//! bazaar login -e ada@example.com
//!
//! # Inspect and change the cart
//! bazaar cart show
//! bazaar cart add 64f1c0ffee --quantity 2 --size M
//! bazaar cart qty 650aa1b2c3 3
//!
//! # Wishlist and shops
//! bazaar wishlist toggle 64f1c0ffee
//! bazaar shop follow 64e0deadbeef
//!
//! # Search suggestions, typed one character at a time
//! bazaar suggest "linen shirt"
//! ```
//!
//! # Commands
//!
//! - `login`, `register`, `logout`, `whoami` - Session management
//! - `cart` - Show, add, remove, change quantity, clear
//! - `wishlist` - Show, toggle, remove
//! - `shop` - Show, list, follow
//! - `suggest` - Debounced product suggestions

#![cfg_attr(not(test), forbid(unsafe_code))]

use bazaar_client::{ClientConfig, ClientError, ConfigError, Notifier, Storefront, notice};
use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

mod commands;

const DEFAULT_LOG_FILTER: &str = "bazaar_client=info,bazaar_cli=info";

#[derive(Parser)]
#[command(name = "bazaar")]
#[command(author, version, about = "Bazaar marketplace client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "BAZAAR_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "BAZAAR_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out on this machine
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Browse and follow shops
    Shop {
        #[command(subcommand)]
        action: ShopAction,
    },
    /// Show search suggestions for TEXT
    Suggest {
        /// Search text
        text: String,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// List cart lines and totals
    Show,
    /// Add a product
    Add {
        /// Product ID
        product_id: String,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: i64,

        /// Size variant
        #[arg(long)]
        size: Option<String>,

        /// Color variant
        #[arg(long)]
        color: Option<String>,
    },
    /// Remove a cart line
    Remove {
        /// Cart line ID
        item_id: String,
    },
    /// Set a cart line's quantity
    Qty {
        /// Cart line ID
        item_id: String,

        /// New quantity (at least 1)
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum WishlistAction {
    /// List wishlist products
    Show,
    /// Add or remove a product
    Toggle {
        /// Product ID
        product_id: String,
    },
    /// Remove a product
    Remove {
        /// Product ID
        product_id: String,
    },
}

#[derive(Subcommand)]
enum ShopAction {
    /// Show one shop
    Show {
        /// Shop ID
        shop_id: String,
    },
    /// List shops
    List,
    /// Follow or unfollow a shop
    Follow {
        /// Shop ID
        shop_id: String,
    },
}

/// Errors that end a CLI run.
#[derive(Debug, Error)]
enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{}", .0.user_message())]
    Client(#[from] ClientError),
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = ClientConfig::from_env()?;
    let (notifier, mut notices) = Notifier::channel();
    let storefront = Storefront::connect(config, notifier).await?;

    let result = dispatch(&storefront, cli.command).await;

    for notice in notice::drain(&mut notices) {
        commands::print_notice(&notice);
    }
    result
}

async fn dispatch(storefront: &Storefront, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Login { email, password } => {
            commands::session::login(storefront, &email, password).await?;
        }
        Commands::Register {
            name,
            email,
            password,
        } => commands::session::register(storefront, &name, &email, password).await?,
        Commands::Logout => commands::session::logout(storefront).await,
        Commands::Whoami => commands::session::whoami(storefront).await?,
        Commands::Cart { action } => {
            storefront.cart().load().await?;
            match action {
                CartAction::Show => commands::cart::show(storefront),
                CartAction::Add {
                    product_id,
                    quantity,
                    size,
                    color,
                } => commands::cart::add(storefront, &product_id, quantity, size, color).await?,
                CartAction::Remove { item_id } => commands::cart::remove(storefront, &item_id).await?,
                CartAction::Qty { item_id, quantity } => {
                    commands::cart::set_quantity(storefront, &item_id, quantity).await?;
                }
                CartAction::Clear => commands::cart::clear(storefront).await?,
            }
        }
        Commands::Wishlist { action } => {
            storefront.wishlist().load().await?;
            match action {
                WishlistAction::Show => commands::wishlist::show(storefront),
                WishlistAction::Toggle { product_id } => {
                    commands::wishlist::toggle(storefront, &product_id).await?;
                }
                WishlistAction::Remove { product_id } => {
                    commands::wishlist::remove(storefront, &product_id).await?;
                }
            }
        }
        Commands::Shop { action } => match action {
            ShopAction::Show { shop_id } => commands::shops::show(storefront, &shop_id).await?,
            ShopAction::List => commands::shops::list(storefront).await?,
            ShopAction::Follow { shop_id } => commands::shops::follow(storefront, &shop_id).await?,
        },
        Commands::Suggest { text } => commands::suggest::run(storefront, &text).await,
    }
    Ok(())
}

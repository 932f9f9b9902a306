//! Wellspring - browse fundraising projects and donate from the terminal.
//!
//! This binary is the composition root: it loads configuration and opens the
//! session store. The single `ApiClient` is built by `App` the first time a
//! command needs the network.

mod commands;

use std::io;
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wellspring_core::{Config, CredentialStore, FileStore, KeyringStore, SessionManager};

use commands::App;

const USAGE: &str = "\
Usage: wellspring <command> [args]

Browsing:
  home                               Featured projects and your cart
  products [page] [category]         List projects
  product <id>                       Show one project

Account:
  register <name> <phone> [email]    Create an account (sends a code)
  login <phone>                      Send a sign-in code
  verify <phone> <code>              Complete sign-in
  resend <phone>                     Send the code again
  skip-login                         Browse as a guest
  logout
  profile                            Show your profile
  profile set-name <name>
  profile set-email <email>

Donating:
  cart                               Show your cart
  cart add <product_id> [qty] [amount]
  cart set <item_id> <qty>
  cart remove <item_id>
  donate [dedication]                Start checkout for the cart

Settings:
  lang [ar|en]                       Show or switch the language";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn open_store(config: &Config) -> Result<Arc<dyn CredentialStore>> {
    if config.secure_store {
        Ok(Arc::new(KeyringStore::new()))
    } else {
        Ok(Arc::new(FileStore::new(config.store_path()?)))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || matches!(args[0].as_str(), "-h" | "--help" | "help") {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load()?;
    let sessions = SessionManager::new(open_store(&config)?);
    debug!(environment = ?config.environment, "Wellspring starting");

    let app = App::new(config, sessions);
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    if let Err(e) = app.run(&args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

//! Command-line arguments, shared by the one-shot CLI and the shell.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::store::Theme;

#[derive(Parser, Debug)]
#[command(name = "flx")]
#[command(about = "Command-line client for the product demo API")]
#[command(version)]
pub struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/flx/config.yaml)
  #[arg(short, long)]
  pub config: Option<PathBuf>,

  /// API base URL, overrides config and FLX_API_BASE_URL
  #[arg(long)]
  pub base_url: Option<String>,

  /// Command to run; starts the interactive shell when omitted
  #[command(subcommand)]
  pub command: Option<Command>,
}

/// One line typed into the shell.
#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
  /// Sign in and remember the session
  Login {
    #[arg(short, long)]
    username: String,
    /// Password (default: FLX_PASSWORD)
    #[arg(short, long)]
    password: Option<String>,
  },
  /// Forget the current session
  Logout,
  /// Show the signed-in user
  Whoami {
    /// Ask the server instead of reading the stored session
    #[arg(long)]
    remote: bool,
  },
  /// Renew the access token with the stored refresh token
  Refresh,
  /// Product catalogue
  Products {
    #[command(subcommand)]
    action: ProductsCommand,
  },
  /// Preferences
  Settings {
    #[command(subcommand)]
    action: Option<SettingsCommand>,
  },
  /// Interactive shell sharing one cache between commands
  Shell,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProductsCommand {
  /// List one page of products
  List {
    #[arg(short, long, default_value_t = 10)]
    limit: u32,
    #[arg(short, long, default_value_t = 0)]
    skip: u32,
    /// Comma-separated fields to return
    #[arg(long)]
    select: Option<String>,
  },
  /// Show one product
  Get {
    #[arg(allow_negative_numbers = true)]
    id: i64,
  },
  /// Full-text search
  Search { query: String },
  /// Create a product
  Add {
    #[arg(long)]
    title: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    price: f64,
    #[arg(long)]
    brand: Option<String>,
    #[arg(long)]
    category: Option<String>,
  },
  /// Change fields of a product
  Update {
    id: i64,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    price: Option<f64>,
    #[arg(long)]
    brand: Option<String>,
    #[arg(long)]
    category: Option<String>,
  },
  /// Delete a product
  Delete { id: i64 },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SettingsCommand {
  /// Print all settings
  Show,
  /// Switch between light and dark
  Theme { theme: Theme },
  /// Set the interface language
  Language { language: String },
  /// Set any preference; the value is parsed as JSON, else kept as a string
  Set { key: String, value: String },
}

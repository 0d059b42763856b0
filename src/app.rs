use crate::api::{
  CreateProductRequest, Product, ProductsQuery, ProductsResponse, UpdateProductRequest,
};
use crate::app_state::AppState;
use crate::cache::CacheResult;
use crate::cli::{Command, ProductsCommand, SettingsCommand, ShellLine};
use crate::commands::{self, COMMANDS};
use crate::config::Config;
use crate::format::{format_currency, format_date};
use crate::store::{Settings, User};
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::fmt::Write as _;
use std::io::Write as _;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Environment variable read when `login` gets no `--password`.
pub const PASSWORD_ENV: &str = "FLX_PASSWORD";

const LOGIN_REQUIRED_NOTICE: &str = "Your session has expired. Sign in again with `login`.";

/// Prices from the demo backend are in US dollars
const CURRENCY: &str = "USD";

/// Result of one shell line
#[derive(Debug, PartialEq, Eq)]
pub enum ShellOutcome {
  Output(String),
  Quit,
}

/// Main application
pub struct App {
  state: AppState,
}

impl App {
  pub fn new(config: &Config) -> Result<Self> {
    Ok(Self {
      state: AppState::new(config)?,
    })
  }

  pub fn with_state(state: AppState) -> Self {
    Self { state }
  }

  /// Run one command, or the shell when there is none.
  pub async fn run(&self, command: Option<Command>) -> Result<()> {
    match command {
      None | Some(Command::Shell) => self.run_shell().await,
      Some(command) => {
        let result = self.execute(command).await;
        if self.state.take_login_required() {
          eprintln!("{}", LOGIN_REQUIRED_NOTICE);
        }
        let output = result?;
        if !output.is_empty() {
          println!("{}", output);
        }
        Ok(())
      }
    }
  }

  /// Execute a command and return what should be printed.
  pub async fn execute(&self, command: Command) -> Result<String> {
    match command {
      Command::Login { username, password } => {
        let password = password
          .or_else(|| std::env::var(PASSWORD_ENV).ok())
          .ok_or_else(|| eyre!("Password required: pass --password or set {}", PASSWORD_ENV))?;
        let user = self.state.login(&username, &password).await?;
        Ok(format!("Signed in as {}", user.display_name()))
      }
      Command::Logout => {
        self.state.logout();
        Ok("Signed out".to_string())
      }
      Command::Whoami { remote } => {
        if remote {
          let result = self.state.api.me().await?;
          Ok(render_user(&result.data))
        } else {
          match self.state.auth.user() {
            Some(user) => Ok(render_user(&user)),
            None => Ok("Not signed in".to_string()),
          }
        }
      }
      Command::Refresh => {
        if self.state.refresh().await? {
          Ok("Access token renewed".to_string())
        } else {
          Ok("No refresh token stored, sign in first".to_string())
        }
      }
      Command::Products { action } => self.execute_products(action).await,
      Command::Settings { action } => {
        self.execute_settings(action.unwrap_or(SettingsCommand::Show))
      }
      Command::Shell => Ok("Already in the shell".to_string()),
    }
  }

  async fn execute_products(&self, action: ProductsCommand) -> Result<String> {
    let api = &self.state.api;
    match action {
      ProductsCommand::List {
        limit,
        skip,
        select,
      } => {
        let query = ProductsQuery {
          select,
          ..ProductsQuery::page(limit, skip)
        };
        let result = api.products(&query).await?;
        Ok(render_page(&result))
      }
      ProductsCommand::Get { id } => match api.product(id).await? {
        Some(result) => Ok(with_source(render_product(&result.data), &result)),
        None => Ok(format!("Invalid product id {}", id)),
      },
      ProductsCommand::Search { query } => {
        let result = api.search_products(&query).await?;
        Ok(render_page(&result))
      }
      ProductsCommand::Add {
        title,
        description,
        price,
        brand,
        category,
      } => {
        let request = CreateProductRequest {
          title,
          description,
          price,
          brand,
          category,
        };
        let product = api.create_product(&request).await?;
        Ok(format!("Created product {}: {}", product.id, product.title))
      }
      ProductsCommand::Update {
        id,
        title,
        description,
        price,
        brand,
        category,
      } => {
        let request = UpdateProductRequest {
          title,
          description,
          price,
          brand,
          category,
        };
        if request.is_empty() {
          return Err(eyre!("Nothing to update: pass at least one field"));
        }
        let product = api.update_product(id, &request).await?;
        Ok(format!("Updated product {}\n{}", product.id, render_product(&product)))
      }
      ProductsCommand::Delete { id } => {
        let product = api.delete_product(id).await?;
        let when = product
          .deleted_on
          .as_deref()
          .map(|d| format!(" on {}", format_date(d)))
          .unwrap_or_default();
        Ok(format!("Deleted product {}: {}{}", product.id, product.title, when))
      }
    }
  }

  fn execute_settings(&self, action: SettingsCommand) -> Result<String> {
    let settings = &self.state.settings;
    match action {
      SettingsCommand::Show => {}
      SettingsCommand::Theme { theme } => settings.set_theme(theme),
      SettingsCommand::Language { language } => settings.set_language(language),
      SettingsCommand::Set { key, value } => {
        let value = serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
        settings.set_preference(&key, value)?;
      }
    }
    Ok(render_settings(&settings.snapshot()))
  }

  fn prompt(&self) -> String {
    match self.state.auth.user() {
      Some(user) => format!("flx ({})> ", user.username.unwrap_or(user.email)),
      None => "flx> ".to_string(),
    }
  }

  async fn run_shell(&self) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    println!("flx shell against {}. Type `help` for commands.", self.state.api.client().base_url());

    loop {
      print!("{}", self.prompt());
      stdout.flush()?;

      let Some(line) = lines.next_line().await? else {
        println!();
        break;
      };

      match self.handle_line(&line).await {
        Ok(ShellOutcome::Quit) => break,
        Ok(ShellOutcome::Output(text)) => {
          if !text.is_empty() {
            println!("{}", text);
          }
        }
        Err(e) => eprintln!("Error: {}", e),
      }

      if self.state.take_login_required() {
        println!("{}", LOGIN_REQUIRED_NOTICE);
      }
    }

    Ok(())
  }

  /// Interpret one shell line.
  pub async fn handle_line(&self, line: &str) -> Result<ShellOutcome> {
    let mut words = commands::split_words(line);
    let Some(first) = words.first() else {
      return Ok(ShellOutcome::Output(String::new()));
    };

    let Some(name) = commands::resolve(first) else {
      let suggestions: Vec<_> = commands::get_suggestions(first)
        .iter()
        .map(|c| c.name)
        .collect();
      let mut message = format!("Unknown command '{}'.", first);
      if !suggestions.is_empty() {
        let _ = write!(message, " Did you mean: {}?", suggestions.join(", "));
      }
      return Ok(ShellOutcome::Output(message));
    };

    match name {
      "quit" => return Ok(ShellOutcome::Quit),
      "help" => return Ok(ShellOutcome::Output(render_help())),
      _ => {}
    }

    words[0] = name.to_string();
    let parsed = match ShellLine::try_parse_from(&words) {
      Ok(parsed) => parsed,
      // Usage errors and --help output are both meant for the user
      Err(e) => return Ok(ShellOutcome::Output(e.to_string().trim_end().to_string())),
    };

    self.execute(parsed.command).await.map(ShellOutcome::Output)
  }
}

fn render_help() -> String {
  let mut out = String::from("Commands:\n");
  for cmd in COMMANDS {
    let aliases = if cmd.aliases.is_empty() {
      String::new()
    } else {
      format!(" ({})", cmd.aliases.join(", "))
    };
    let _ = writeln!(out, "  {:<10}{}{}", cmd.name, cmd.description, aliases);
  }
  out.push_str("Run `<command> --help` for details.");
  out
}

fn with_source<T>(text: String, result: &CacheResult<T>) -> String {
  match result.cached_at {
    Some(at) if result.is_cached() => {
      format!("{}\n(cached {})", text, at.format("%H:%M:%S"))
    }
    _ => text,
  }
}

fn render_page(result: &CacheResult<ProductsResponse>) -> String {
  let page = &result.data;
  if page.products.is_empty() {
    return with_source("No products found".to_string(), result);
  }

  let mut out = String::new();
  for product in &page.products {
    let _ = writeln!(
      out,
      "{:>5}  {:<40}  {:>12}",
      product.id,
      truncate(&product.title, 40),
      format_currency(product.price, CURRENCY)
    );
  }
  let first = page.skip + 1;
  let last = page.skip + page.products.len() as u64;
  let _ = write!(out, "Showing {}-{} of {}", first, last, page.total);
  with_source(out, result)
}

fn render_product(product: &Product) -> String {
  let mut out = format!("#{} {}", product.id, product.title);
  if let Some(brand) = &product.brand {
    let _ = write!(out, " by {}", brand);
  }
  let _ = write!(out, "\n  Price:    {}", format_currency(product.price, CURRENCY));
  if product.discount_percentage > 0.0 {
    let _ = write!(out, " (-{:.1}%)", product.discount_percentage);
  }
  if !product.category.is_empty() {
    let _ = write!(out, "\n  Category: {}", product.category);
  }
  if product.rating > 0.0 {
    let _ = write!(out, "\n  Rating:   {:.2}", product.rating);
  }
  let _ = write!(out, "\n  Stock:    {}", product.stock);
  if !product.description.is_empty() {
    let _ = write!(out, "\n  {}", product.description);
  }
  out
}

fn render_user(user: &User) -> String {
  let mut out = format!("{} <{}>", user.display_name(), user.email);
  if let Some(username) = &user.username {
    let _ = write!(out, "\n  Username: {}", username);
  }
  let _ = write!(out, "\n  Id:       {}", user.id);
  if let Some(roles) = &user.roles {
    let _ = write!(out, "\n  Roles:    {}", roles.join(", "));
  }
  out
}

fn render_settings(settings: &Settings) -> String {
  let mut out = format!("theme = {}\nlanguage = {}", settings.theme, settings.language);
  for (key, value) in &settings.preferences {
    let _ = write!(out, "\n{} = {}", key, value);
  }
  out
}

fn truncate(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    return s.to_string();
  }
  let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
  out.push('…');
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{ApiConfig, QueryConfig};
  use crate::store::MemoryStorage;
  use serde_json::json;
  use std::sync::Arc;
  use wiremock::matchers::{header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn app_for(server: &MockServer) -> App {
    let api = ApiConfig {
      base_url: server.uri(),
      ..ApiConfig::default()
    };
    let storage = Arc::new(MemoryStorage::new());
    let state = AppState::with_storage(&api, &QueryConfig::default(), storage).unwrap();
    App::with_state(state)
  }

  fn output(outcome: ShellOutcome) -> String {
    match outcome {
      ShellOutcome::Output(text) => text,
      ShellOutcome::Quit => panic!("unexpected quit"),
    }
  }

  #[tokio::test]
  async fn test_shell_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/auth/login"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "id": 1,
        "username": "emilys",
        "email": "emily.johnson@x.dummyjson.com",
        "firstName": "Emily",
        "lastName": "Johnson",
        "accessToken": "T",
        "refreshToken": "R"
      })))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/products"))
      .and(header("Authorization", "Bearer T"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "products": [{"id": 1, "title": "Essence Mascara Lash Princess", "price": 9.99}],
        "total": 194,
        "skip": 0,
        "limit": 1
      })))
      .expect(1)
      .mount(&server)
      .await;

    let app = app_for(&server);

    let text = output(app.handle_line("login -u emilys -p emilyspass").await.unwrap());
    assert_eq!(text, "Signed in as Emily Johnson");
    assert_eq!(app.prompt(), "flx (emilys)> ");

    let first = output(app.handle_line("p list --limit 1").await.unwrap());
    assert!(first.contains("Essence Mascara"));
    assert!(first.contains("$9.99"));
    assert!(first.contains("Showing 1-1 of 194"));
    assert!(!first.contains("(cached"));

    // Same page again comes from the cache
    let second = output(app.handle_line("products list --limit 1").await.unwrap());
    assert!(second.contains("(cached"));

    assert_eq!(
      output(app.handle_line("logout").await.unwrap()),
      "Signed out"
    );
    assert_eq!(app.prompt(), "flx> ");
  }

  #[tokio::test]
  async fn test_invalid_product_id_is_not_requested() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    let text = output(app.handle_line("products get 0").await.unwrap());
    assert_eq!(text, "Invalid product id 0");
    let text = output(app.handle_line("products get -3").await.unwrap());
    assert_eq!(text, "Invalid product id -3");
    assert!(server.received_requests().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_unknown_command_suggests() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    let text = output(app.handle_line("log").await.unwrap());
    assert_eq!(text, "Unknown command 'log'. Did you mean: login, logout?");
    assert_eq!(app.handle_line("exit").await.unwrap(), ShellOutcome::Quit);
    assert!(output(app.handle_line("help").await.unwrap()).contains("products"));
    assert_eq!(output(app.handle_line("   ").await.unwrap()), "");
  }

  #[tokio::test]
  async fn test_settings_commands() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    let text = output(app.handle_line("settings theme dark").await.unwrap());
    assert!(text.contains("theme = dark"));

    let text = output(app.handle_line("set set pageSize 25").await.unwrap());
    assert!(text.contains("pageSize = 25"));

    assert!(app.handle_line("settings set theme '\"neon\"'").await.is_err());
  }

  #[tokio::test]
  async fn test_update_requires_a_field() {
    let server = MockServer::start().await;
    let app = app_for(&server);

    assert!(app.handle_line("products update 1").await.is_err());
    assert!(server.received_requests().await.unwrap().is_empty());
  }

  #[test]
  fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("abcdefghij", 5), "abcd…");
  }
}

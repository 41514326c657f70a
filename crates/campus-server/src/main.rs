//! campus-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `CAMPUS_*` environment variables, opens the SQLite store, and serves the
//! JSON API and realtime channel over HTTP.
//!
//! # Creating an admin
//!
//! Self-registration never grants `admin`. Create one from the command line:
//!
//! ```text
//! campus-server create-user --name "Site Admin" --email admin@campus.edu --role admin
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use campus_core::Role;
use campus_server::{AppState, ServerConfig, auth};
use campus_store_sqlite::SqliteStore;
use clap::{Parser, Subcommand};
use tokio::{net::TcpListener, signal};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Campus portal server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve HTTP and realtime traffic (the default).
  Serve,
  /// Create an account of any role. The password is read from stdin.
  CreateUser {
    #[arg(long)]
    name:  String,
    #[arg(long)]
    email: String,
    #[arg(long, default_value = "student")]
    role:  Role,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let config = load_config(&cli.config)?;

  let store_path = expand_tilde(&config.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(store, config).await,
    Command::CreateUser { name, email, role } => {
      let password = read_password()?;
      let user = auth::create_account(&store, auth::Registration {
        name,
        email,
        password,
        role: Some(role),
      })
      .await
      .context("failed to create user")?;
      println!("created {} {} ({})", user.role, user.email, user.user_id);
      Ok(())
    }
  }
}

fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
  let settings = config::Config::builder()
    .add_source(config::File::from(path.to_path_buf()).required(false))
    .add_source(
      config::Environment::with_prefix("CAMPUS")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("allowed_origins"),
    )
    .build()
    .context("failed to read config file")?;

  settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")
}

async fn serve(store: SqliteStore, config: ServerConfig) -> anyhow::Result<()> {
  let address = format!("{}:{}", config.host, config.port);
  let state = AppState::new(store, config);
  tracing::info!(
    claim_write_mode = ?state.config.claim_write_mode,
    origins = state.config.allowed_origins.len(),
    "portal configured"
  );
  let app = campus_server::router(state);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  tracing::info!("server stopped");
  Ok(())
}

/// Resolve on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = signal::ctrl_c().await {
      tracing::warn!(error = %e, "failed to listen for Ctrl+C");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        tracing::warn!(error = %e, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
  tracing::info!("shutting down");
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  eprint!("Password: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_owned())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

//! peerform server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the survey API over HTTP under
//! `/api`.
//!
//! # Token issuance
//!
//! The engine verifies bearer tokens but never stores credentials. To mint a
//! token for a user:
//!
//! ```
//! cargo run -p peerform-server -- --issue-token <USER_ID> --role professor
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use peerform_api::{AppState, AuthConfig, issue_token};
use peerform_core::user::Role;
use peerform_store_sqlite::SqliteStore;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
struct ServerConfig {
  host:         String,
  port:         u16,
  store_path:   PathBuf,
  token_secret: String,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum TokenRole {
  Student,
  Professor,
}

#[derive(Parser)]
#[command(author, version, about = "peerform survey server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print a bearer token for the given user id and exit.
  #[arg(long, value_name = "USER_ID")]
  issue_token: Option<Uuid>,

  /// Role embedded in the issued token.
  #[arg(long, default_value = "student")]
  role: TokenRole,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("store_path", "peerform.db")?
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("PEERFORM"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Helper mode: mint a bearer token and exit.
  if let Some(user_id) = cli.issue_token {
    let role = match cli.role {
      TokenRole::Student => Role::Student,
      TokenRole::Professor => Role::Professor,
    };
    println!("{}", issue_token(&server_cfg.token_secret, user_id, role));
    return Ok(());
  }

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Build application state.
  let state = AppState {
    store: Arc::new(store),
    auth:  Arc::new(AuthConfig {
      token_secret: server_cfg.token_secret.clone(),
    }),
  };

  let app = axum::Router::new()
    .nest("/api", peerform_api::api_router(state))
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
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

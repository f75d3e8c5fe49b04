//! weft-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the space
//! data directory, and serves the sync protocol over HTTP.
//!
//! # Session tokens
//!
//! `sessions` in config.toml maps SHA-256 token digests to sessions. To
//! print the digest for a new token:
//!
//! ```text
//! cargo run -p weft-server -- --hash-token
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use weft_server::{AppState, ServerConfig, session::StaticSessions};

#[derive(Parser)]
#[command(author, version, about = "Weft sync server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the digest for a token entered on stdin and exit.
  #[arg(long)]
  hash_token: bool,
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

  if cli.hash_token {
    let token = read_line("Token: ")?;
    println!("{}", StaticSessions::digest(token.trim()));
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("WEFT"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  std::fs::create_dir_all(&server_cfg.data_dir).with_context(|| {
    format!("failed to create data dir {:?}", server_cfg.data_dir)
  })?;

  let state = AppState::new(&server_cfg);
  let app = weft_server::router(state);

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

fn read_line(prompt: &str) -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("{prompt}");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line)
}

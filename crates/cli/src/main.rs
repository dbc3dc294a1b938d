//! `spritegen` -- command-line front end for the sprite generation API.
//!
//! Submits image and sprite-sheet generations, browses and deletes
//! history, lists models, uploads reference images and renders the
//! sprite-grid overlay of a finished sheet as SVG.
//!
//! # Environment variables
//!
//! | Variable                         | Default                     | Description                         |
//! |----------------------------------|-----------------------------|-------------------------------------|
//! | `SPRITEGEN_API_URL`              | `http://localhost:8000/api` | Base URL of the API (`--api-url`)   |
//! | `SPRITEGEN_REQUEST_TIMEOUT_SECS` | `120`                       | Deadline for every request          |
//! | `SPRITEGEN_HISTORY_PAGE_SIZE`    | `12`                        | Default `history --page-size`       |
//! | `SPRITEGEN_HISTORY_STALE_SECS`   | `30`                        | History freshness window            |
//! | `SPRITEGEN_MODELS_STALE_SECS`    | `300`                       | Model catalog freshness window      |
//! | `RUST_LOG`                       | see below                   | `tracing` filter                    |

mod commands;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spritegen_app::AppContext;
use spritegen_client::ClientConfig;

use crate::commands::Command;

const DEFAULT_LOG_FILTER: &str =
    "spritegen_cli=info,spritegen_app=info,spritegen_client=info,spritegen_cache=info";

#[derive(Debug, Parser)]
#[command(name = "spritegen", version, about = "Generate images and sprite sheets")]
struct Cli {
    /// Base URL of the API; overrides `SPRITEGEN_API_URL`.
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(api_url) = cli.api_url {
        config = config.with_api_url(api_url);
    }

    let ctx = AppContext::connect(config)?;
    commands::run(&ctx, cli.command).await
}

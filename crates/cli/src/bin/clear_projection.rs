use anyhow::{Context, Result, bail};
use clap::Parser;
use persistence::{HttpProjectionStore, ProjectionStore};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "clear-projection",
    about = "Delete every stored projection category (inputs, pins and derived results)."
)]
struct Args {
    /// Path to settings.json; falls back to ./settings.json, then built-in defaults
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Required confirmation; nothing is deleted without it
    #[arg(long, default_value_t = false)]
    yes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "persistence=info".into()),
        )
        .init();

    let args = Args::parse();
    let settings = settings_loader::load_effective_settings(args.settings.as_ref())?;
    if !args.yes {
        bail!(
            "refusing to clear all projection data at {} without --yes",
            settings.api_base_url
        );
    }

    let store = HttpProjectionStore::new(&settings)
        .with_context(|| format!("creating client for {}", settings.api_base_url))?;
    store
        .clear_all()
        .await
        .with_context(|| format!("clearing projection data at {}", settings.api_base_url))?;

    println!("Cleared all projection data at {}", settings.api_base_url);
    Ok(())
}

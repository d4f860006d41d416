use anyhow::{Context, Result};
use clap::Parser;
use persistence::{HttpProjectionStore, PersistenceBridge, ProjectionStore, SyncReport, SyncVerifier};
use projection_engine::ProjectionEngine;
use std::{path::PathBuf, sync::Arc};

#[derive(Parser, Debug)]
#[command(
    name = "verify-sync",
    about = "Recompute every category from the stored projection and compare it with the stored copies."
)]
struct Args {
    /// Path to settings.json; falls back to ./settings.json, then built-in defaults
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Print the full reports as JSON instead of a summary
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Default)]
struct Report {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Report {
    fn from_sync(reports: &[SyncReport], failed_loads: &[models::CategoryKey]) -> Self {
        let mut rep = Report::default();
        for category in failed_loads {
            rep.warnings.push(format!("{category}: load failed, compared against defaults"));
        }
        for report in reports.iter().filter(|r| !r.in_sync) {
            for diff in &report.diffs {
                let at = diff.month.map(|m| format!("[{m}]")).unwrap_or_default();
                rep.errors.push(format!(
                    "{}: {}{} local={} stored={}",
                    report.category, diff.field, at, diff.local, diff.persisted
                ));
            }
        }
        rep
    }

    fn print(&self, source: &str) {
        for w in &self.warnings {
            println!("[WARN] {}: {}", source, w);
        }
        for e in &self.errors {
            println!("[ERROR] {}: {}", source, e);
        }
    }

    fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "persistence=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = settings_loader::load_effective_settings(args.settings.as_ref())?;
    let store: Arc<dyn ProjectionStore> = Arc::new(
        HttpProjectionStore::new(&settings)
            .with_context(|| format!("creating client for {}", settings.api_base_url))?,
    );

    let loaded = PersistenceBridge::new(store.clone()).load_all().await;
    let engine = ProjectionEngine::from_snapshot(&loaded.projection)
        .context("building projection engine")?;
    let reports = SyncVerifier::new(store)
        .verify_all(&engine)
        .await
        .context("verifying stored categories")?;

    let rep = Report::from_sync(&reports, &loaded.failed);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        rep.print(&settings.api_base_url);
        let in_sync = reports.iter().filter(|r| r.in_sync).count();
        println!("{} of {} categories in sync", in_sync, reports.len());
    }

    if rep.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

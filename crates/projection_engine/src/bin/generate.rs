use anyhow::{Context, Result};
use clap::Parser;
use projection_engine::{generate_report, write_report_json};
use std::path::PathBuf;

/// Computes every projection category from a `projection` aggregate file.
#[derive(Debug, Parser)]
#[command(name = "generate-projection", author, version, about = "Generate the twelve-month projection report", long_about = None)]
struct Args {
    /// Path to the projection aggregate (base series, growth, overrides)
    #[arg(short = 'i', long = "input", default_value = "projection.json")]
    input: PathBuf,

    /// Where to write the report
    #[arg(short = 'o', long = "out", default_value = "report/projection_report.json")]
    out: PathBuf,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "projection_engine=info".into()),
        )
        .init();

    let args = Args::parse();

    println!(
        "Generating projection...\n  input : {}\n  output: {}",
        args.input.display(),
        args.out.display()
    );

    let report = generate_report(&args.input).context("generate projection")?;
    write_report_json(&report, &args.out, args.pretty).context("write projection report")?;

    for key in ["faturamento-total", "budget", "resultado"] {
        if let Some(totals) = report.annual_totals.get(key) {
            println!(
                "  {:<18} previsto {:>14.2}  medio {:>14.2}  maximo {:>14.2}",
                key, totals.previsto, totals.medio, totals.maximo
            );
        }
    }
    println!("Done. Generated at {}", report.metadata.generated_at);
    Ok(())
}

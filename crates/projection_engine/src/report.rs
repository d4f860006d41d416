use anyhow::{Context, Result};
use chrono::Local;
use models::{AnnualTotals, CategoryKey, CategorySnapshot, ProjectionSnapshot};
use serde::Serialize;
use std::collections::BTreeMap;
use std::{fs, path::Path};

use crate::engine::ProjectionEngine;

#[derive(Debug, Serialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub overridden_cells: usize,
}

/// Every persisted category computed from one `projection` aggregate.
#[derive(Debug, Serialize)]
pub struct ProjectionReport {
    pub metadata: ReportMetadata,
    pub categories: BTreeMap<String, CategorySnapshot>,
    pub annual_totals: BTreeMap<String, AnnualTotals>,
}

impl ProjectionReport {
    pub fn from_engine(engine: &ProjectionEngine) -> Self {
        let mut categories = BTreeMap::new();
        let mut annual_totals = BTreeMap::new();
        for key in CategoryKey::ALL {
            let snapshot = engine.snapshot(key);
            if let CategorySnapshot::Triple(triple) = &snapshot {
                annual_totals.insert(key.to_string(), triple.annual_totals());
            }
            categories.insert(key.to_string(), snapshot);
        }
        Self {
            metadata: ReportMetadata {
                generated_at: Local::now().to_rfc3339(),
                overridden_cells: engine.overrides().len(),
            },
            categories,
            annual_totals,
        }
    }
}

pub fn generate_report(projection_path: &Path) -> Result<ProjectionReport> {
    let raw = fs::read_to_string(projection_path)
        .with_context(|| format!("Reading {}", projection_path.display()))?;
    let snapshot: ProjectionSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("Parsing projection JSON in {}", projection_path.display()))?;
    let engine = ProjectionEngine::from_snapshot(&snapshot)?;
    Ok(ProjectionReport::from_engine(&engine))
}

pub fn write_report_json(report: &ProjectionReport, out_path: &Path, pretty: bool) -> Result<()> {
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    fs::write(out_path, json)?;
    Ok(())
}

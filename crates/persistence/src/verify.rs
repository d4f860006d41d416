use models::{round2, BaseSeriesId, CategoryKey, CategorySnapshot, GrowthField, Scenario, MONTHS};
use projection_engine::ProjectionEngine;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::store::ProjectionStore;

/// One mismatching cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncDiff {
    pub field: String,
    pub month: Option<usize>,
    pub local: f64,
    pub persisted: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub category: CategoryKey,
    pub in_sync: bool,
    pub diffs: Vec<SyncDiff>,
}

impl SyncReport {
    fn new(category: CategoryKey, diffs: Vec<SyncDiff>) -> Self {
        Self {
            category,
            in_sync: diffs.is_empty(),
            diffs,
        }
    }
}

fn push_series(diffs: &mut Vec<SyncDiff>, field: &str, local: &[f64], persisted: &[f64]) {
    for month in 0..MONTHS {
        let (l, p) = (round2(local[month]), round2(persisted[month]));
        if l != p {
            diffs.push(SyncDiff {
                field: field.to_string(),
                month: Some(month),
                local: l,
                persisted: p,
            });
        }
    }
}

/// Cell-by-cell comparison after rounding both sides to two decimals.
///
/// Pins are compared as a set keyed by (category, scenario, month); a pin
/// present on one side only shows up with the missing side as zero.
pub fn compare_snapshots(
    category: CategoryKey,
    local: &CategorySnapshot,
    persisted: &CategorySnapshot,
) -> SyncReport {
    let mut diffs = Vec::new();
    match (local, persisted) {
        (CategorySnapshot::Triple(l), CategorySnapshot::Triple(p)) => {
            for scenario in Scenario::ALL {
                push_series(
                    &mut diffs,
                    scenario.as_str(),
                    l.get(scenario).values(),
                    p.get(scenario).values(),
                );
            }
        }
        (CategorySnapshot::Projection(l), CategorySnapshot::Projection(p)) => {
            for id in BaseSeriesId::ALL {
                push_series(&mut diffs, id.as_str(), l.series(id).values(), p.series(id).values());
            }
            for field in [GrowthField::Minimo, GrowthField::Medio, GrowthField::Maximo] {
                let (lv, pv) = (round2(l.growth.get(field)), round2(p.growth.get(field)));
                if lv != pv {
                    diffs.push(SyncDiff {
                        field: format!("growth.{field:?}").to_lowercase(),
                        month: None,
                        local: lv,
                        persisted: pv,
                    });
                }
            }
            let pins = |entries: &[models::OverrideEntry]| {
                entries
                    .iter()
                    .map(|e| ((e.category, e.scenario, e.month), round2(e.value)))
                    .collect::<std::collections::BTreeMap<_, _>>()
            };
            let (lp, pp) = (pins(&l.overrides), pins(&p.overrides));
            let keys: std::collections::BTreeSet<_> = lp.keys().chain(pp.keys()).copied().collect();
            for key in keys {
                let (lv, pv) = (lp.get(&key).copied(), pp.get(&key).copied());
                if lv != pv {
                    let (cat, scenario, month) = key;
                    diffs.push(SyncDiff {
                        field: format!("override.{}.{}", cat.as_str(), scenario.as_str()),
                        month: Some(month),
                        local: lv.unwrap_or(0.0),
                        persisted: pv.unwrap_or(0.0),
                    });
                }
            }
        }
        _ => diffs.push(SyncDiff {
            field: "shape".to_string(),
            month: None,
            local: 0.0,
            persisted: 0.0,
        }),
    }
    SyncReport::new(category, diffs)
}

/// Reports whether working state and the store agree.
pub struct SyncVerifier {
    store: Arc<dyn ProjectionStore>,
}

impl SyncVerifier {
    pub fn new(store: Arc<dyn ProjectionStore>) -> Self {
        Self { store }
    }

    pub async fn verify(&self, engine: &ProjectionEngine, category: CategoryKey) -> Result<SyncReport> {
        let persisted = self.store.load(category).await?;
        let report = compare_snapshots(category, &engine.snapshot(category), &persisted);
        if !report.in_sync {
            warn!(%category, diffs = report.diffs.len(), "category out of sync");
        }
        Ok(report)
    }

    /// Verifies every persisted category; stops at the first load failure.
    pub async fn verify_all(&self, engine: &ProjectionEngine) -> Result<Vec<SyncReport>> {
        let mut reports = Vec::with_capacity(CategoryKey::ALL.len());
        for category in CategoryKey::ALL {
            reports.push(self.verify(engine, category).await?);
        }
        let out_of_sync = reports.iter().filter(|r| !r.in_sync).count();
        info!(checked = reports.len(), out_of_sync, "sync verification finished");
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryProjectionStore;
    use models::{DerivedCategory, MonthlySeries, OverrideEntry, ProjectionSnapshot, ScenarioTriple};

    #[test]
    fn test_compare_ignores_sub_cent_noise() {
        let local = CategorySnapshot::Triple(ScenarioTriple {
            medio: MonthlySeries::filled(10.001),
            ..ScenarioTriple::default()
        });
        let persisted = CategorySnapshot::Triple(ScenarioTriple {
            medio: MonthlySeries::filled(10.0),
            ..ScenarioTriple::default()
        });
        assert!(compare_snapshots(CategoryKey::Budget, &local, &persisted).in_sync);
    }

    #[test]
    fn test_compare_lists_each_differing_cell() {
        let mut l = ScenarioTriple::default();
        l.maximo.0[3] = 7.5;
        let report = compare_snapshots(
            CategoryKey::Resultado,
            &CategorySnapshot::Triple(l),
            &CategorySnapshot::Triple(ScenarioTriple::default()),
        );
        assert!(!report.in_sync);
        assert_eq!(
            report.diffs,
            vec![SyncDiff {
                field: "maximo".to_string(),
                month: Some(3),
                local: 7.5,
                persisted: 0.0,
            }]
        );
    }

    #[test]
    fn test_compare_projection_pins_and_growth() {
        let mut local = ProjectionSnapshot::default();
        local.growth.medio = 5.0;
        local.overrides.push(OverrideEntry {
            category: DerivedCategory::Budget,
            scenario: Scenario::Previsto,
            month: 1,
            value: 3.0,
        });
        let report = compare_snapshots(
            CategoryKey::Projection,
            &CategorySnapshot::Projection(local),
            &CategorySnapshot::Projection(ProjectionSnapshot::default()),
        );
        assert_eq!(report.diffs.len(), 2);
        assert_eq!(report.diffs[0].field, "growth.medio");
        assert_eq!(report.diffs[1].month, Some(1));
    }

    #[tokio::test]
    async fn test_verify_all_detects_drift() {
        let store = Arc::new(InMemoryProjectionStore::new());
        let mut engine = ProjectionEngine::new().unwrap();
        engine.set_base_series(BaseSeriesId::RevenueReg, MonthlySeries::filled(20.0));

        let verifier = SyncVerifier::new(store.clone());
        let reports = verifier.verify_all(&engine).await.unwrap();
        let drifted: Vec<CategoryKey> = reports.iter().filter(|r| !r.in_sync).map(|r| r.category).collect();
        assert_eq!(
            drifted,
            vec![
                CategoryKey::Projection,
                CategoryKey::FaturamentoReg,
                CategoryKey::FaturamentoTotal,
                CategoryKey::Resultado,
            ]
        );

        for category in CategoryKey::ALL {
            store.save(category, engine.snapshot(category)).await.unwrap();
        }
        let reports = verifier.verify_all(&engine).await.unwrap();
        assert!(reports.iter().all(|r| r.in_sync));
    }
}

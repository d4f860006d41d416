//! Formulas for every derived category.
//!
//! All families share [`resolve_cell`]: a pinned cell returns its pinned value,
//! anything else evaluates the category formula and rounds it to two decimals.

use models::{
    round2, BaseSeriesId, DerivedCategory, GrowthPercentages, MonthlySeries, Scenario,
    ScenarioTriple, MONTHS,
};
use std::collections::HashMap;

use crate::base_series::BaseSeries;
use crate::overrides::OverrideTracker;

/// Step applied each quarter to fixed expenses and between their scenarios.
pub const FIXED_EXPENSE_STEP: f64 = 1.10;

/// Everything a formula may read.
pub struct RuleInputs<'a> {
    pub base: &'a BaseSeries,
    pub overrides: &'a OverrideTracker,
    pub derived: &'a HashMap<DerivedCategory, ScenarioTriple>,
}

impl RuleInputs<'_> {
    fn derived(&self, category: DerivedCategory) -> ScenarioTriple {
        self.derived.get(&category).copied().unwrap_or_default()
    }
}

/// Pinned value if the cell is overridden, otherwise the rounded formula result.
pub fn resolve_cell(
    overrides: &OverrideTracker,
    category: DerivedCategory,
    scenario: Scenario,
    month: usize,
    formula: impl FnOnce() -> f64,
) -> f64 {
    match overrides.get(category, scenario, month) {
        Some(pinned) => pinned,
        None => round2(formula()),
    }
}

/// Evaluates the full 3 x 12 triple of `category`.
pub fn derive(category: DerivedCategory, inputs: &RuleInputs<'_>) -> ScenarioTriple {
    let growth = inputs.base.growth();
    let overrides = inputs.overrides;
    match category {
        DerivedCategory::FixedExpenses => {
            stepped_carryover(category, &inputs.base.get(BaseSeriesId::FixedExpenses), overrides)
        }
        DerivedCategory::VariableExpenses => percentage_growth(
            category,
            &inputs.base.get(BaseSeriesId::VariableExpenses),
            &growth,
            overrides,
        ),
        DerivedCategory::Investments => percentage_growth(
            category,
            &inputs.base.get(BaseSeriesId::Investments),
            &growth,
            overrides,
        ),
        DerivedCategory::RevenueReurb
        | DerivedCategory::RevenueGeo
        | DerivedCategory::RevenuePlan
        | DerivedCategory::RevenueReg
        | DerivedCategory::RevenueNn => {
            let source = revenue_source(category);
            percentage_growth(category, &inputs.base.get(source), &growth, overrides)
        }
        DerivedCategory::Marketing => marketing(
            category,
            [
                inputs.base.get(BaseSeriesId::MarketingTraffic),
                inputs.base.get(BaseSeriesId::MarketingSocialMedia),
                inputs.base.get(BaseSeriesId::MarketingContentProduction),
            ],
            &growth,
            overrides,
        ),
        DerivedCategory::FixedVariable => sum_of(
            category,
            &[
                inputs.derived(DerivedCategory::FixedExpenses),
                inputs.derived(DerivedCategory::VariableExpenses),
            ],
            overrides,
        ),
        DerivedCategory::RevenueTotal => {
            let streams: Vec<ScenarioTriple> = DerivedCategory::REVENUE_STREAMS
                .into_iter()
                .map(|c| inputs.derived(c))
                .collect();
            sum_of(category, &streams, overrides)
        }
        DerivedCategory::Budget => sum_of(
            category,
            &[
                inputs.derived(DerivedCategory::FixedVariable),
                inputs.derived(DerivedCategory::Marketing),
                inputs.derived(DerivedCategory::Investments),
            ],
            overrides,
        ),
        DerivedCategory::Result => difference(
            category,
            &inputs.derived(DerivedCategory::RevenueTotal),
            &inputs.derived(DerivedCategory::Budget),
            overrides,
        ),
    }
}

/// Base series feeding a revenue stream.
pub fn revenue_source(category: DerivedCategory) -> BaseSeriesId {
    match category {
        DerivedCategory::RevenueGeo => BaseSeriesId::RevenueGeo,
        DerivedCategory::RevenuePlan => BaseSeriesId::RevenuePlan,
        DerivedCategory::RevenueReg => BaseSeriesId::RevenueReg,
        DerivedCategory::RevenueNn => BaseSeriesId::RevenueNn,
        _ => BaseSeriesId::RevenueReurb,
    }
}

fn with_growth(value: f64, percent: f64) -> f64 {
    value + value * percent / 100.0
}

/// `base + base * growth / 100`, with Previsto reading the minimum percentage.
pub fn percentage_growth(
    category: DerivedCategory,
    base: &MonthlySeries,
    growth: &GrowthPercentages,
    overrides: &OverrideTracker,
) -> ScenarioTriple {
    let mut out = ScenarioTriple::default();
    for scenario in Scenario::ALL {
        let percent = growth.for_scenario(scenario);
        let series = out.get_mut(scenario);
        for month in 0..MONTHS {
            series.0[month] = resolve_cell(overrides, category, scenario, month, || {
                with_growth(base.get(month), percent)
            });
        }
    }
    out
}

/// Quarter-stepped carryover from the prior December (index 11 of the base
/// series): January is December +10%, every third month steps another 10% and
/// the months in between repeat the previous month. Médio and Máximo compound
/// one more step each on top of the previous scenario.
pub fn stepped_carryover(
    category: DerivedCategory,
    prior_year: &MonthlySeries,
    overrides: &OverrideTracker,
) -> ScenarioTriple {
    let prior_december = prior_year.get(MONTHS - 1);
    let mut out = ScenarioTriple::default();

    for month in 0..MONTHS {
        let previous = if month == 0 {
            prior_december
        } else {
            out.previsto.0[month - 1]
        };
        out.previsto.0[month] = resolve_cell(overrides, category, Scenario::Previsto, month, || {
            if month % 3 == 0 {
                previous * FIXED_EXPENSE_STEP
            } else {
                previous
            }
        });
    }

    for (scenario, lower) in [(Scenario::Medio, Scenario::Previsto), (Scenario::Maximo, Scenario::Medio)] {
        let source = *out.get(lower);
        let series = out.get_mut(scenario);
        for month in 0..MONTHS {
            series.0[month] = resolve_cell(overrides, category, scenario, month, || {
                source.get(month) * FIXED_EXPENSE_STEP
            });
        }
    }
    out
}

/// Raw component sum for Previsto; Médio and Máximo add growth on top of it.
pub fn marketing(
    category: DerivedCategory,
    components: [MonthlySeries; 3],
    growth: &GrowthPercentages,
    overrides: &OverrideTracker,
) -> ScenarioTriple {
    let mut out = ScenarioTriple::default();
    for scenario in Scenario::ALL {
        let series = out.get_mut(scenario);
        for month in 0..MONTHS {
            series.0[month] = resolve_cell(overrides, category, scenario, month, || {
                let raw: f64 = components.iter().map(|c| c.get(month)).sum();
                match scenario {
                    Scenario::Previsto => raw,
                    _ => with_growth(raw, growth.for_scenario(scenario)),
                }
            });
        }
    }
    out
}

/// Scenario-matched elementwise sum.
pub fn sum_of(
    category: DerivedCategory,
    parts: &[ScenarioTriple],
    overrides: &OverrideTracker,
) -> ScenarioTriple {
    let mut out = ScenarioTriple::default();
    for scenario in Scenario::ALL {
        let series = out.get_mut(scenario);
        for month in 0..MONTHS {
            series.0[month] = resolve_cell(overrides, category, scenario, month, || {
                parts.iter().map(|p| p.value(scenario, month)).sum()
            });
        }
    }
    out
}

/// Scenario-matched elementwise `minuend - subtrahend`.
pub fn difference(
    category: DerivedCategory,
    minuend: &ScenarioTriple,
    subtrahend: &ScenarioTriple,
    overrides: &OverrideTracker,
) -> ScenarioTriple {
    let mut out = ScenarioTriple::default();
    for scenario in Scenario::ALL {
        let series = out.get_mut(scenario);
        for month in 0..MONTHS {
            series.0[month] = resolve_cell(overrides, category, scenario, month, || {
                minuend.value(scenario, month) - subtrahend.value(scenario, month)
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn growth(minimo: f64, medio: f64, maximo: f64) -> GrowthPercentages {
        GrowthPercentages { minimo, medio, maximo }
    }

    #[test]
    fn test_percentage_growth_uses_mapped_fields() {
        let base = MonthlySeries::filled(1000.0);
        let out = percentage_growth(
            DerivedCategory::VariableExpenses,
            &base,
            &growth(10.0, 20.0, 30.0),
            &OverrideTracker::new(),
        );
        assert_eq!(out.previsto.get(0), 1100.0);
        assert_eq!(out.medio.get(0), 1200.0);
        assert_eq!(out.maximo.get(0), 1300.0);
        assert_eq!(out.maximo.get(11), 1300.0);
    }

    #[test]
    fn test_percentage_growth_rounds_to_cents() {
        let base = MonthlySeries::filled(333.33);
        let out = percentage_growth(
            DerivedCategory::Investments,
            &base,
            &growth(3.3, 0.0, -12.5),
            &OverrideTracker::new(),
        );
        assert_eq!(out.previsto.get(5), round2(333.33 + 333.33 * 3.3 / 100.0));
        assert_eq!(out.previsto.get(5), 344.33);
        assert_eq!(out.medio.get(5), 333.33);
        assert_eq!(out.maximo.get(5), round2(333.33 - 333.33 * 12.5 / 100.0));
    }

    #[test]
    fn test_stepped_carryover_quarter_groups() {
        let mut prior = MonthlySeries::zeros();
        prior.0[11] = 1000.0;
        let out = stepped_carryover(DerivedCategory::FixedExpenses, &prior, &OverrideTracker::new());

        assert_eq!(
            out.previsto.0,
            [
                1100.0, 1100.0, 1100.0, 1210.0, 1210.0, 1210.0, 1331.0, 1331.0, 1331.0, 1464.1,
                1464.1, 1464.1
            ]
        );
        assert_eq!(out.medio.get(0), 1210.0);
        assert_eq!(out.maximo.get(0), 1331.0);
        for month in 0..MONTHS {
            assert_eq!(out.medio.get(month), round2(out.previsto.get(month) * 1.10));
            assert_eq!(out.maximo.get(month), round2(out.medio.get(month) * 1.10));
        }
    }

    #[test]
    fn test_stepped_carryover_only_reads_december() {
        let mut prior = MonthlySeries::filled(5000.0);
        prior.0[11] = 1000.0;
        let out = stepped_carryover(DerivedCategory::FixedExpenses, &prior, &OverrideTracker::new());
        assert_eq!(out.previsto.get(0), 1100.0);
    }

    #[test]
    fn test_stepped_carryover_builds_on_pinned_month() {
        let mut prior = MonthlySeries::zeros();
        prior.0[11] = 1000.0;
        let mut overrides = OverrideTracker::new();
        overrides
            .set_override(DerivedCategory::FixedExpenses, Scenario::Previsto, 3, 2000.0)
            .unwrap();

        let out = stepped_carryover(DerivedCategory::FixedExpenses, &prior, &overrides);
        assert_eq!(out.previsto.get(2), 1100.0);
        assert_eq!(out.previsto.get(3), 2000.0);
        assert_eq!(out.previsto.get(4), 2000.0);
        assert_eq!(out.previsto.get(6), 2200.0);
        assert_eq!(out.medio.get(3), 2200.0);
    }

    #[test]
    fn test_marketing_previsto_has_no_growth() {
        let components = [
            MonthlySeries::filled(100.0),
            MonthlySeries::filled(50.0),
            MonthlySeries::filled(50.0),
        ];
        let out = marketing(
            DerivedCategory::Marketing,
            components,
            &growth(10.0, 20.0, 50.0),
            &OverrideTracker::new(),
        );
        assert_eq!(out.previsto.get(0), 200.0);
        assert_eq!(out.medio.get(0), 240.0);
        assert_eq!(out.maximo.get(0), 300.0);
    }

    #[test]
    fn test_sum_and_difference_are_scenario_matched() {
        let a = ScenarioTriple {
            previsto: MonthlySeries::filled(1.0),
            medio: MonthlySeries::filled(2.0),
            maximo: MonthlySeries::filled(3.0),
        };
        let b = ScenarioTriple {
            previsto: MonthlySeries::filled(10.0),
            medio: MonthlySeries::filled(20.0),
            maximo: MonthlySeries::filled(30.0),
        };
        let none = OverrideTracker::new();

        let sum = sum_of(DerivedCategory::Budget, &[a, b], &none);
        assert_eq!(sum.previsto.get(0), 11.0);
        assert_eq!(sum.medio.get(0), 22.0);
        assert_eq!(sum.maximo.get(0), 33.0);

        let diff = difference(DerivedCategory::Result, &a, &b, &none);
        assert_eq!(diff.previsto.get(7), -9.0);
        assert_eq!(diff.maximo.get(7), -27.0);
    }

    #[test]
    fn test_resolve_cell_prefers_pin() {
        let mut overrides = OverrideTracker::new();
        overrides
            .set_override(DerivedCategory::Budget, Scenario::Medio, 1, 42.0)
            .unwrap();
        let pinned = resolve_cell(&overrides, DerivedCategory::Budget, Scenario::Medio, 1, || {
            panic!("formula must not run for a pinned cell")
        });
        assert_eq!(pinned, 42.0);
        let computed =
            resolve_cell(&overrides, DerivedCategory::Budget, Scenario::Medio, 2, || 1.234);
        assert_eq!(computed, 1.23);
    }
}

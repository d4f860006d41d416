use models::{
    BaseSeriesId, CategoryKey, CategorySnapshot, DerivedCategory, GrowthField, GrowthPercentages,
    MonthlySeries, ProjectionSnapshot, Scenario, ScenarioTriple,
};
use std::collections::HashMap;
use tracing::debug;

use crate::base_series::BaseSeries;
use crate::error::Result;
use crate::graph::{DependencyGraph, Root};
use crate::overrides::OverrideTracker;
use crate::rules::{self, RuleInputs};

/// In-memory projection state: the inputs, the pins, and the cached derived
/// triples kept consistent with them by [`ProjectionEngine::recompute`].
///
/// Every mutation recomputes synchronously and returns the derived categories
/// whose cached triple changed, in evaluation order.
#[derive(Debug, Clone)]
pub struct ProjectionEngine {
    base: BaseSeries,
    overrides: OverrideTracker,
    graph: DependencyGraph,
    derived: HashMap<DerivedCategory, ScenarioTriple>,
}

impl ProjectionEngine {
    pub fn new() -> Result<Self> {
        Self::from_snapshot(&ProjectionSnapshot::default())
    }

    pub fn from_snapshot(snapshot: &ProjectionSnapshot) -> Result<Self> {
        let mut engine = Self {
            base: BaseSeries::from_snapshot(snapshot),
            overrides: OverrideTracker::from_entries(&snapshot.overrides),
            graph: DependencyGraph::standard()?,
            derived: HashMap::new(),
        };
        engine.recompute_all();
        Ok(engine)
    }

    pub fn base(&self) -> &BaseSeries {
        &self.base
    }

    pub fn overrides(&self) -> &OverrideTracker {
        &self.overrides
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn growth(&self) -> GrowthPercentages {
        self.base.growth()
    }

    pub fn derived(&self, category: DerivedCategory) -> ScenarioTriple {
        self.derived.get(&category).copied().unwrap_or_default()
    }

    pub fn value(&self, category: DerivedCategory, scenario: Scenario, month: usize) -> f64 {
        self.derived(category).value(scenario, month)
    }

    pub fn is_overridden(&self, category: DerivedCategory, scenario: Scenario, month: usize) -> bool {
        self.overrides.is_overridden(category, scenario, month)
    }

    // Mutations

    pub fn set_base_value(
        &mut self,
        id: BaseSeriesId,
        month: usize,
        value: f64,
    ) -> Result<Vec<DerivedCategory>> {
        if !self.base.set_value(id, month, value)? {
            return Ok(Vec::new());
        }
        Ok(self.recompute(&[Root::Base(id)]))
    }

    pub fn set_base_series(&mut self, id: BaseSeriesId, values: MonthlySeries) -> Vec<DerivedCategory> {
        if !self.base.set_series(id, values) {
            return Vec::new();
        }
        self.recompute(&[Root::Base(id)])
    }

    pub fn set_growth(&mut self, field: GrowthField, value: f64) -> Vec<DerivedCategory> {
        if !self.base.set_growth(field, value) {
            return Vec::new();
        }
        self.recompute(&[Root::Growth])
    }

    pub fn set_growth_percentages(&mut self, growth: GrowthPercentages) -> Vec<DerivedCategory> {
        if !self.base.set_growth_percentages(growth) {
            return Vec::new();
        }
        self.recompute(&[Root::Growth])
    }

    /// Pins a derived cell to `value` and cascades to its dependents.
    pub fn set_override(
        &mut self,
        category: DerivedCategory,
        scenario: Scenario,
        month: usize,
        value: f64,
    ) -> Result<Vec<DerivedCategory>> {
        if !self.overrides.set_override(category, scenario, month, value)? {
            return Ok(Vec::new());
        }
        Ok(self.recompute(&[Root::Overrides(category)]))
    }

    /// Empties every base series, zeroes growth and removes every pin.
    pub fn clear_all(&mut self) -> Vec<DerivedCategory> {
        self.base.clear();
        self.overrides.clear_all();
        self.recompute_all()
    }

    /// Replaces inputs and pins with a canonical `projection` aggregate.
    pub fn replace_projection(&mut self, snapshot: &ProjectionSnapshot) -> Vec<DerivedCategory> {
        self.base = BaseSeries::from_snapshot(snapshot);
        self.overrides = OverrideTracker::from_entries(&snapshot.overrides);
        self.recompute_all()
    }

    /// Overwrites the cached triple of `category` with an externally supplied
    /// canonical value and recomputes its dependents.
    pub fn apply_derived(&mut self, category: DerivedCategory, triple: ScenarioTriple) -> Vec<DerivedCategory> {
        let triple = triple.rounded();
        if self.derived(category) == triple {
            return Vec::new();
        }
        self.derived.insert(category, triple);
        self.recompute(&[Root::Derived(category)])
    }

    /// Applies a snapshot for any persisted key.
    pub fn apply_snapshot(&mut self, key: CategoryKey, snapshot: &CategorySnapshot) -> Vec<DerivedCategory> {
        match (snapshot, key.derived()) {
            (CategorySnapshot::Projection(projection), _) => self.replace_projection(projection),
            (CategorySnapshot::Triple(triple), Some(category)) => self.apply_derived(category, *triple),
            (CategorySnapshot::Triple(_), None) => Vec::new(),
        }
    }

    // Scheduler

    /// Recomputes, in evaluation order, every category reachable from `roots`
    /// over all months and scenarios. Returns the categories that changed.
    pub fn recompute(&mut self, roots: &[Root]) -> Vec<DerivedCategory> {
        let affected = self.graph.affected_by(roots);
        let mut changed = Vec::new();
        for category in affected {
            let next = {
                let inputs = RuleInputs {
                    base: &self.base,
                    overrides: &self.overrides,
                    derived: &self.derived,
                };
                rules::derive(category, &inputs)
            };
            if self.derived.get(&category) != Some(&next) {
                self.derived.insert(category, next);
                changed.push(category);
            }
        }
        debug!(?roots, ?changed, "recomputed projection cascade");
        changed
    }

    /// Recomputes every category from scratch.
    pub fn recompute_all(&mut self) -> Vec<DerivedCategory> {
        let mut roots: Vec<Root> = BaseSeriesId::ALL.into_iter().map(Root::Base).collect();
        roots.push(Root::Growth);
        roots.extend(DerivedCategory::ALL.into_iter().map(Root::Overrides));
        self.recompute(&roots)
    }

    // Snapshots

    pub fn projection_snapshot(&self) -> ProjectionSnapshot {
        let mut snapshot = ProjectionSnapshot {
            overrides: self.overrides.entries(),
            ..ProjectionSnapshot::default()
        };
        self.base.write_into(&mut snapshot);
        snapshot
    }

    pub fn snapshot(&self, key: CategoryKey) -> CategorySnapshot {
        match key.derived() {
            Some(category) => CategorySnapshot::Triple(self.derived(category)),
            None => CategorySnapshot::Projection(self.projection_snapshot()),
        }
    }

    /// Persisted keys touched by a set of changed derived categories.
    pub fn keys_for(changed: &[DerivedCategory]) -> Vec<CategoryKey> {
        changed.iter().filter_map(|c| c.key()).collect()
    }
}

use models::{DerivedCategory, OverrideEntry, Scenario, MONTHS};
use std::collections::BTreeMap;

use crate::error::{EngineError, Result};

type CellKey = (DerivedCategory, Scenario, usize);

/// Manually pinned derived cells. A pinned cell keeps its value through every
/// recompute until [`OverrideTracker::clear_all`] runs; there is no per-cell unpin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideTracker {
    cells: BTreeMap<CellKey, f64>,
}

impl OverrideTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the tracker from persisted entries, skipping malformed ones.
    pub fn from_entries(entries: &[OverrideEntry]) -> Self {
        let cells = entries
            .iter()
            .filter(|e| e.month < MONTHS && e.value.is_finite())
            .map(|e| ((e.category, e.scenario, e.month), e.value))
            .collect();
        Self { cells }
    }

    /// Pins a cell. Pinning an already pinned cell replaces its value.
    /// Returns whether the stored value changed.
    pub fn set_override(
        &mut self,
        category: DerivedCategory,
        scenario: Scenario,
        month: usize,
        value: f64,
    ) -> Result<bool> {
        if month >= MONTHS {
            return Err(EngineError::MonthOutOfRange(month));
        }
        if !value.is_finite() {
            return Err(EngineError::NonFiniteValue(value));
        }
        let previous = self.cells.insert((category, scenario, month), value);
        Ok(previous != Some(value))
    }

    pub fn is_overridden(&self, category: DerivedCategory, scenario: Scenario, month: usize) -> bool {
        self.cells.contains_key(&(category, scenario, month))
    }

    pub fn get(&self, category: DerivedCategory, scenario: Scenario, month: usize) -> Option<f64> {
        self.cells.get(&(category, scenario, month)).copied()
    }

    /// Removes every pin at once.
    pub fn clear_all(&mut self) {
        self.cells.clear();
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Categories holding at least one pinned cell.
    pub fn pinned_categories(&self) -> Vec<DerivedCategory> {
        let mut out: Vec<DerivedCategory> = self.cells.keys().map(|(c, _, _)| *c).collect();
        out.dedup();
        out
    }

    /// Pinned `(scenario, month)` cells of one category, for highlighting edited cells.
    pub fn overridden_cells(&self, category: DerivedCategory) -> Vec<(Scenario, usize)> {
        self.cells
            .keys()
            .filter(|(c, _, _)| *c == category)
            .map(|(_, s, m)| (*s, *m))
            .collect()
    }

    /// Persisted form, ordered by category, scenario and month.
    pub fn entries(&self) -> Vec<OverrideEntry> {
        self.cells
            .iter()
            .map(|(&(category, scenario, month), &value)| OverrideEntry {
                category,
                scenario,
                month,
                value,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_query_override() {
        let mut tracker = OverrideTracker::new();
        assert!(!tracker.is_overridden(DerivedCategory::Budget, Scenario::Medio, 4));

        assert_eq!(
            tracker.set_override(DerivedCategory::Budget, Scenario::Medio, 4, -250.5),
            Ok(true)
        );
        assert!(tracker.is_overridden(DerivedCategory::Budget, Scenario::Medio, 4));
        assert_eq!(tracker.get(DerivedCategory::Budget, Scenario::Medio, 4), Some(-250.5));
        assert!(!tracker.is_overridden(DerivedCategory::Budget, Scenario::Maximo, 4));
    }

    #[test]
    fn test_repinning_replaces_value() {
        let mut tracker = OverrideTracker::new();
        tracker.set_override(DerivedCategory::Marketing, Scenario::Previsto, 0, 1.0).unwrap();
        assert_eq!(
            tracker.set_override(DerivedCategory::Marketing, Scenario::Previsto, 0, 1.0),
            Ok(false)
        );
        tracker.set_override(DerivedCategory::Marketing, Scenario::Previsto, 0, 2.0).unwrap();
        assert_eq!(tracker.get(DerivedCategory::Marketing, Scenario::Previsto, 0), Some(2.0));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_rejects_invalid_cells() {
        let mut tracker = OverrideTracker::new();
        assert_eq!(
            tracker.set_override(DerivedCategory::Result, Scenario::Previsto, 12, 1.0),
            Err(EngineError::MonthOutOfRange(12))
        );
        assert!(matches!(
            tracker.set_override(DerivedCategory::Result, Scenario::Previsto, 0, f64::NAN),
            Err(EngineError::NonFiniteValue(_))
        ));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_clear_all_removes_every_pin() {
        let mut tracker = OverrideTracker::new();
        for category in DerivedCategory::ALL {
            for scenario in Scenario::ALL {
                tracker.set_override(category, scenario, 11, 7.0).unwrap();
            }
        }
        assert_eq!(tracker.len(), 39);
        tracker.clear_all();
        assert!(tracker.is_empty());
        assert!(tracker.pinned_categories().is_empty());
    }

    #[test]
    fn test_entries_round_trip() {
        let mut tracker = OverrideTracker::new();
        tracker.set_override(DerivedCategory::RevenueNn, Scenario::Maximo, 2, 3.5).unwrap();
        tracker.set_override(DerivedCategory::FixedExpenses, Scenario::Previsto, 0, 9.0).unwrap();

        let entries = tracker.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].category, DerivedCategory::FixedExpenses);
        assert_eq!(OverrideTracker::from_entries(&entries), tracker);
        assert_eq!(
            tracker.overridden_cells(DerivedCategory::RevenueNn),
            vec![(Scenario::Maximo, 2)]
        );
    }
}

use models::{BaseSeriesId, GrowthField, GrowthPercentages, MonthlySeries, ProjectionSnapshot, MONTHS};
use std::collections::BTreeMap;

use crate::error::{EngineError, Result};

/// Raw user-entered monthly inputs plus the organization-wide growth percentages.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseSeries {
    series: BTreeMap<BaseSeriesId, MonthlySeries>,
    growth: GrowthPercentages,
}

impl Default for BaseSeries {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseSeries {
    /// Zero-filled inputs, as on first load.
    pub fn new() -> Self {
        let series = BaseSeriesId::ALL
            .into_iter()
            .map(|id| (id, MonthlySeries::zeros()))
            .collect();
        Self {
            series,
            growth: GrowthPercentages::default(),
        }
    }

    pub fn from_snapshot(snapshot: &ProjectionSnapshot) -> Self {
        let series = BaseSeriesId::ALL
            .into_iter()
            .map(|id| (id, *snapshot.series(id)))
            .collect();
        Self {
            series,
            growth: snapshot.growth,
        }
    }

    /// Copies the inputs into the `projection` aggregate (overrides are left untouched).
    pub fn write_into(&self, snapshot: &mut ProjectionSnapshot) {
        for id in BaseSeriesId::ALL {
            *snapshot.series_mut(id) = self.get(id);
        }
        snapshot.growth = self.growth;
    }

    pub fn get(&self, id: BaseSeriesId) -> MonthlySeries {
        self.series.get(&id).copied().unwrap_or_default()
    }

    pub fn growth(&self) -> GrowthPercentages {
        self.growth
    }

    /// Returns whether the stored value changed.
    pub fn set_value(&mut self, id: BaseSeriesId, month: usize, value: f64) -> Result<bool> {
        if month >= MONTHS {
            return Err(EngineError::MonthOutOfRange(month));
        }
        let value = finite_or_zero(value);
        let series = self.series.entry(id).or_default();
        if series.0[month] == value {
            return Ok(false);
        }
        series.0[month] = value;
        Ok(true)
    }

    pub fn set_series(&mut self, id: BaseSeriesId, values: MonthlySeries) -> bool {
        let values = MonthlySeries::from_slice(values.values());
        let previous = self.series.insert(id, values);
        previous != Some(values)
    }

    pub fn set_growth(&mut self, field: GrowthField, value: f64) -> bool {
        let value = finite_or_zero(value);
        if self.growth.get(field) == value {
            return false;
        }
        self.growth.set(field, value);
        true
    }

    pub fn set_growth_percentages(&mut self, growth: GrowthPercentages) -> bool {
        let growth = GrowthPercentages {
            minimo: finite_or_zero(growth.minimo),
            medio: finite_or_zero(growth.medio),
            maximo: finite_or_zero(growth.maximo),
        };
        if self.growth == growth {
            return false;
        }
        self.growth = growth;
        true
    }

    /// Empties every series and zeroes the growth percentages.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zero_filled() {
        let base = BaseSeries::new();
        for id in BaseSeriesId::ALL {
            assert_eq!(base.get(id), MonthlySeries::zeros());
        }
        assert_eq!(base.growth(), GrowthPercentages::default());
    }

    #[test]
    fn test_set_value_reports_change() {
        let mut base = BaseSeries::new();
        assert_eq!(base.set_value(BaseSeriesId::RevenueGeo, 3, 250.0), Ok(true));
        assert_eq!(base.set_value(BaseSeriesId::RevenueGeo, 3, 250.0), Ok(false));
        assert_eq!(base.get(BaseSeriesId::RevenueGeo).get(3), 250.0);
        assert_eq!(
            base.set_value(BaseSeriesId::RevenueGeo, 12, 1.0),
            Err(EngineError::MonthOutOfRange(12))
        );
    }

    #[test]
    fn test_non_finite_inputs_become_zero() {
        let mut base = BaseSeries::new();
        base.set_value(BaseSeriesId::Investments, 0, 5.0).unwrap();
        assert_eq!(base.set_value(BaseSeriesId::Investments, 0, f64::NAN), Ok(true));
        assert_eq!(base.get(BaseSeriesId::Investments).get(0), 0.0);
        assert!(!base.set_growth(GrowthField::Medio, f64::INFINITY));
    }

    #[test]
    fn test_snapshot_round_trip_keeps_growth() {
        let mut base = BaseSeries::new();
        base.set_series(BaseSeriesId::FixedExpenses, MonthlySeries::filled(900.0));
        base.set_growth(GrowthField::Maximo, 30.0);

        let mut snapshot = ProjectionSnapshot::default();
        base.write_into(&mut snapshot);
        assert_eq!(snapshot.fixed_expenses, MonthlySeries::filled(900.0));
        assert_eq!(snapshot.growth.maximo, 30.0);
        assert_eq!(BaseSeries::from_snapshot(&snapshot), base);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut base = BaseSeries::new();
        base.set_series(BaseSeriesId::MarketingTraffic, MonthlySeries::filled(10.0));
        base.set_growth(GrowthField::Minimo, 5.0);
        base.clear();
        assert_eq!(base, BaseSeries::new());
    }
}

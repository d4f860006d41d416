
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of months in a projection year (index 0 = January).
pub const MONTHS: usize = 12;

/// Rounds to two decimals, half away from zero.
pub fn round2(v: f64) -> f64 {
	(v * 100.0).round() / 100.0
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown category: {0}")]
pub struct UnknownCategory(pub String);

// Monthly values
/// Exactly twelve monthly values. Decoding is lenient: missing or non-numeric
/// entries become 0, short arrays are zero-padded and long ones truncated.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MonthlySeries(pub [f64; MONTHS]);

impl MonthlySeries {
	pub fn zeros() -> Self {
		Self([0.0; MONTHS])
	}

	pub fn filled(value: f64) -> Self {
		Self([value; MONTHS])
	}

	/// Builds a series from any slice, padding or truncating to twelve months.
	pub fn from_slice(values: &[f64]) -> Self {
		let mut out = [0.0; MONTHS];
		for (slot, v) in out.iter_mut().zip(values.iter()) {
			*slot = if v.is_finite() { *v } else { 0.0 };
		}
		Self(out)
	}

	pub fn get(&self, month: usize) -> f64 {
		self.0.get(month).copied().unwrap_or(0.0)
	}

	pub fn values(&self) -> &[f64; MONTHS] {
		&self.0
	}

	pub fn total(&self) -> f64 {
		round2(self.0.iter().sum())
	}

	pub fn rounded(self) -> Self {
		Self(self.0.map(round2))
	}
}

impl Serialize for MonthlySeries {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.0.serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for MonthlySeries {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw: Option<Vec<Value>> = Option::deserialize(deserializer)?;
		let values: Vec<f64> = raw
			.unwrap_or_default()
			.iter()
			.map(lenient_number)
			.collect();
		Ok(Self::from_slice(&values))
	}
}

fn lenient_number(v: &Value) -> f64 {
	let n = match v {
		Value::Number(n) => n.as_f64().unwrap_or(0.0),
		Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
		_ => 0.0,
	};
	if n.is_finite() { n } else { 0.0 }
}

// Scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
	Previsto,
	Medio,
	Maximo,
}

impl Scenario {
	pub const ALL: [Scenario; 3] = [Scenario::Previsto, Scenario::Medio, Scenario::Maximo];

	pub fn as_str(&self) -> &'static str {
		match self {
			Scenario::Previsto => "previsto",
			Scenario::Medio => "medio",
			Scenario::Maximo => "maximo",
		}
	}
}

impl fmt::Display for Scenario {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScenarioTriple {
	#[serde(default)]
	pub previsto: MonthlySeries,
	#[serde(default)]
	pub medio: MonthlySeries,
	#[serde(default)]
	pub maximo: MonthlySeries,
}

impl ScenarioTriple {
	pub fn get(&self, scenario: Scenario) -> &MonthlySeries {
		match scenario {
			Scenario::Previsto => &self.previsto,
			Scenario::Medio => &self.medio,
			Scenario::Maximo => &self.maximo,
		}
	}

	pub fn get_mut(&mut self, scenario: Scenario) -> &mut MonthlySeries {
		match scenario {
			Scenario::Previsto => &mut self.previsto,
			Scenario::Medio => &mut self.medio,
			Scenario::Maximo => &mut self.maximo,
		}
	}

	pub fn value(&self, scenario: Scenario, month: usize) -> f64 {
		self.get(scenario).get(month)
	}

	pub fn annual_totals(&self) -> AnnualTotals {
		AnnualTotals {
			previsto: self.previsto.total(),
			medio: self.medio.total(),
			maximo: self.maximo.total(),
		}
	}

	pub fn rounded(self) -> Self {
		Self {
			previsto: self.previsto.rounded(),
			medio: self.medio.rounded(),
			maximo: self.maximo.rounded(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnualTotals {
	pub previsto: f64,
	pub medio: f64,
	pub maximo: f64,
}

/// Organization-wide growth percentages.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GrowthPercentages {
	#[serde(default)]
	pub minimo: f64,
	#[serde(default)]
	pub medio: f64,
	#[serde(default)]
	pub maximo: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthField {
	Minimo,
	Medio,
	Maximo,
}

impl GrowthPercentages {
	/// Previsto reads the *minimum* percentage; this pairing is business terminology.
	pub fn for_scenario(&self, scenario: Scenario) -> f64 {
		match scenario {
			Scenario::Previsto => self.minimo,
			Scenario::Medio => self.medio,
			Scenario::Maximo => self.maximo,
		}
	}

	pub fn get(&self, field: GrowthField) -> f64 {
		match field {
			GrowthField::Minimo => self.minimo,
			GrowthField::Medio => self.medio,
			GrowthField::Maximo => self.maximo,
		}
	}

	pub fn set(&mut self, field: GrowthField, value: f64) {
		match field {
			GrowthField::Minimo => self.minimo = value,
			GrowthField::Medio => self.medio = value,
			GrowthField::Maximo => self.maximo = value,
		}
	}
}

// Categories
/// Directly user-entered monthly inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseSeriesId {
	VariableExpenses,
	FixedExpenses,
	Investments,
	MarketingTraffic,
	MarketingSocialMedia,
	MarketingContentProduction,
	RevenueReurb,
	RevenueGeo,
	RevenuePlan,
	RevenueReg,
	RevenueNn,
}

impl BaseSeriesId {
	pub const ALL: [BaseSeriesId; 11] = [
		BaseSeriesId::VariableExpenses,
		BaseSeriesId::FixedExpenses,
		BaseSeriesId::Investments,
		BaseSeriesId::MarketingTraffic,
		BaseSeriesId::MarketingSocialMedia,
		BaseSeriesId::MarketingContentProduction,
		BaseSeriesId::RevenueReurb,
		BaseSeriesId::RevenueGeo,
		BaseSeriesId::RevenuePlan,
		BaseSeriesId::RevenueReg,
		BaseSeriesId::RevenueNn,
	];

	/// Field name inside the `projection` aggregate.
	pub fn as_str(&self) -> &'static str {
		match self {
			BaseSeriesId::VariableExpenses => "variableExpenses",
			BaseSeriesId::FixedExpenses => "fixedExpenses",
			BaseSeriesId::Investments => "investments",
			BaseSeriesId::MarketingTraffic => "marketingTraffic",
			BaseSeriesId::MarketingSocialMedia => "marketingSocialMedia",
			BaseSeriesId::MarketingContentProduction => "marketingContentProduction",
			BaseSeriesId::RevenueReurb => "revenueReurb",
			BaseSeriesId::RevenueGeo => "revenueGeo",
			BaseSeriesId::RevenuePlan => "revenuePlan",
			BaseSeriesId::RevenueReg => "revenueReg",
			BaseSeriesId::RevenueNn => "revenueNn",
		}
	}
}

impl fmt::Display for BaseSeriesId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Categories whose values are computed, never entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DerivedCategory {
	#[serde(rename = "fixed-expenses")]
	FixedExpenses,
	#[serde(rename = "variable-expenses")]
	VariableExpenses,
	#[serde(rename = "investments")]
	Investments,
	#[serde(rename = "mkt")]
	Marketing,
	#[serde(rename = "faturamento-reurb")]
	RevenueReurb,
	#[serde(rename = "faturamento-geo")]
	RevenueGeo,
	#[serde(rename = "faturamento-plan")]
	RevenuePlan,
	#[serde(rename = "faturamento-reg")]
	RevenueReg,
	#[serde(rename = "faturamento-nn")]
	RevenueNn,
	#[serde(rename = "fixed-variable")]
	FixedVariable,
	#[serde(rename = "faturamento-total")]
	RevenueTotal,
	#[serde(rename = "budget")]
	Budget,
	#[serde(rename = "resultado")]
	Result,
}

impl DerivedCategory {
	pub const ALL: [DerivedCategory; 13] = [
		DerivedCategory::FixedExpenses,
		DerivedCategory::VariableExpenses,
		DerivedCategory::Investments,
		DerivedCategory::Marketing,
		DerivedCategory::RevenueReurb,
		DerivedCategory::RevenueGeo,
		DerivedCategory::RevenuePlan,
		DerivedCategory::RevenueReg,
		DerivedCategory::RevenueNn,
		DerivedCategory::FixedVariable,
		DerivedCategory::RevenueTotal,
		DerivedCategory::Budget,
		DerivedCategory::Result,
	];

	pub const REVENUE_STREAMS: [DerivedCategory; 5] = [
		DerivedCategory::RevenueReurb,
		DerivedCategory::RevenueGeo,
		DerivedCategory::RevenuePlan,
		DerivedCategory::RevenueReg,
		DerivedCategory::RevenueNn,
	];

	/// Persistence key; `None` for internal nodes such as the fixed+variable sum.
	pub fn key(&self) -> Option<CategoryKey> {
		let key = match self {
			DerivedCategory::FixedExpenses => CategoryKey::FixedExpenses,
			DerivedCategory::VariableExpenses => CategoryKey::VariableExpenses,
			DerivedCategory::Investments => CategoryKey::Investments,
			DerivedCategory::Marketing => CategoryKey::Mkt,
			DerivedCategory::RevenueReurb => CategoryKey::FaturamentoReurb,
			DerivedCategory::RevenueGeo => CategoryKey::FaturamentoGeo,
			DerivedCategory::RevenuePlan => CategoryKey::FaturamentoPlan,
			DerivedCategory::RevenueReg => CategoryKey::FaturamentoReg,
			DerivedCategory::RevenueNn => CategoryKey::FaturamentoNn,
			DerivedCategory::FixedVariable => return None,
			DerivedCategory::RevenueTotal => CategoryKey::FaturamentoTotal,
			DerivedCategory::Budget => CategoryKey::Budget,
			DerivedCategory::Result => CategoryKey::Resultado,
		};
		Some(key)
	}

	pub fn as_str(&self) -> &'static str {
		match self.key() {
			Some(key) => key.as_str(),
			None => "fixed-variable",
		}
	}
}

impl fmt::Display for DerivedCategory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Persisted resource keys. The strings are shared with existing stored data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryKey {
	Projection,
	FixedExpenses,
	VariableExpenses,
	Mkt,
	Investments,
	FaturamentoReurb,
	FaturamentoGeo,
	FaturamentoPlan,
	FaturamentoReg,
	FaturamentoNn,
	FaturamentoTotal,
	Budget,
	Resultado,
}

impl CategoryKey {
	pub const ALL: [CategoryKey; 13] = [
		CategoryKey::Projection,
		CategoryKey::FixedExpenses,
		CategoryKey::VariableExpenses,
		CategoryKey::Mkt,
		CategoryKey::Investments,
		CategoryKey::FaturamentoReurb,
		CategoryKey::FaturamentoGeo,
		CategoryKey::FaturamentoPlan,
		CategoryKey::FaturamentoReg,
		CategoryKey::FaturamentoNn,
		CategoryKey::FaturamentoTotal,
		CategoryKey::Budget,
		CategoryKey::Resultado,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			CategoryKey::Projection => "projection",
			CategoryKey::FixedExpenses => "fixed-expenses",
			CategoryKey::VariableExpenses => "variable-expenses",
			CategoryKey::Mkt => "mkt",
			CategoryKey::Investments => "investments",
			CategoryKey::FaturamentoReurb => "faturamento-reurb",
			CategoryKey::FaturamentoGeo => "faturamento-geo",
			CategoryKey::FaturamentoPlan => "faturamento-plan",
			CategoryKey::FaturamentoReg => "faturamento-reg",
			CategoryKey::FaturamentoNn => "faturamento-nn",
			CategoryKey::FaturamentoTotal => "faturamento-total",
			CategoryKey::Budget => "budget",
			CategoryKey::Resultado => "resultado",
		}
	}

	/// The derived category mirrored by this key, if any.
	pub fn derived(&self) -> Option<DerivedCategory> {
		DerivedCategory::ALL.into_iter().find(|c| c.key() == Some(*self))
	}
}

impl fmt::Display for CategoryKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for CategoryKey {
	type Err = UnknownCategory;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		CategoryKey::ALL
			.into_iter()
			.find(|k| k.as_str() == s)
			.ok_or_else(|| UnknownCategory(s.to_string()))
	}
}

// Overrides
/// A manually pinned cell as stored inside the `projection` aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverrideEntry {
	pub category: DerivedCategory,
	pub scenario: Scenario,
	pub month: usize,
	pub value: f64,
}

// Snapshots
/// The `projection` aggregate: every base series, the growth percentages and
/// the pinned cells.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectionSnapshot {
	pub variable_expenses: MonthlySeries,
	pub fixed_expenses: MonthlySeries,
	pub investments: MonthlySeries,
	pub marketing_traffic: MonthlySeries,
	pub marketing_social_media: MonthlySeries,
	pub marketing_content_production: MonthlySeries,
	pub revenue_reurb: MonthlySeries,
	pub revenue_geo: MonthlySeries,
	pub revenue_plan: MonthlySeries,
	pub revenue_reg: MonthlySeries,
	pub revenue_nn: MonthlySeries,
	pub growth: GrowthPercentages,
	pub overrides: Vec<OverrideEntry>,
}

impl ProjectionSnapshot {
	pub fn series(&self, id: BaseSeriesId) -> &MonthlySeries {
		match id {
			BaseSeriesId::VariableExpenses => &self.variable_expenses,
			BaseSeriesId::FixedExpenses => &self.fixed_expenses,
			BaseSeriesId::Investments => &self.investments,
			BaseSeriesId::MarketingTraffic => &self.marketing_traffic,
			BaseSeriesId::MarketingSocialMedia => &self.marketing_social_media,
			BaseSeriesId::MarketingContentProduction => &self.marketing_content_production,
			BaseSeriesId::RevenueReurb => &self.revenue_reurb,
			BaseSeriesId::RevenueGeo => &self.revenue_geo,
			BaseSeriesId::RevenuePlan => &self.revenue_plan,
			BaseSeriesId::RevenueReg => &self.revenue_reg,
			BaseSeriesId::RevenueNn => &self.revenue_nn,
		}
	}

	pub fn series_mut(&mut self, id: BaseSeriesId) -> &mut MonthlySeries {
		match id {
			BaseSeriesId::VariableExpenses => &mut self.variable_expenses,
			BaseSeriesId::FixedExpenses => &mut self.fixed_expenses,
			BaseSeriesId::Investments => &mut self.investments,
			BaseSeriesId::MarketingTraffic => &mut self.marketing_traffic,
			BaseSeriesId::MarketingSocialMedia => &mut self.marketing_social_media,
			BaseSeriesId::MarketingContentProduction => &mut self.marketing_content_production,
			BaseSeriesId::RevenueReurb => &mut self.revenue_reurb,
			BaseSeriesId::RevenueGeo => &mut self.revenue_geo,
			BaseSeriesId::RevenuePlan => &mut self.revenue_plan,
			BaseSeriesId::RevenueReg => &mut self.revenue_reg,
			BaseSeriesId::RevenueNn => &mut self.revenue_nn,
		}
	}

	/// Canonical form: rounded series and overrides restricted to valid months.
	pub fn rounded(mut self) -> Self {
		for id in BaseSeriesId::ALL {
			let series = self.series_mut(id);
			*series = series.rounded();
		}
		self.overrides.retain(|o| o.month < MONTHS && o.value.is_finite());
		self
	}
}

/// Snapshot of a single persisted category. The shape depends on the key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CategorySnapshot {
	Projection(ProjectionSnapshot),
	Triple(ScenarioTriple),
}

impl CategorySnapshot {
	/// Zero-filled default used when a category is absent or fails to load.
	pub fn empty(category: CategoryKey) -> Self {
		match category {
			CategoryKey::Projection => CategorySnapshot::Projection(ProjectionSnapshot::default()),
			_ => CategorySnapshot::Triple(ScenarioTriple::default()),
		}
	}

	pub fn from_value(category: CategoryKey, value: Value) -> serde_json::Result<Self> {
		// Stores answer `null` for categories that were never written.
		if value.is_null() {
			return Ok(Self::empty(category));
		}
		match category {
			CategoryKey::Projection => Ok(CategorySnapshot::Projection(serde_json::from_value(value)?)),
			_ => Ok(CategorySnapshot::Triple(serde_json::from_value(value)?)),
		}
	}

	pub fn to_value(&self) -> serde_json::Result<Value> {
		serde_json::to_value(self)
	}

	pub fn rounded(self) -> Self {
		match self {
			CategorySnapshot::Projection(p) => CategorySnapshot::Projection(p.rounded()),
			CategorySnapshot::Triple(t) => CategorySnapshot::Triple(t.rounded()),
		}
	}
}

/// Envelope returned by `PUT /api/{category}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResponse {
	pub success: bool,
	#[serde(default)]
	pub data: Value,
}

// Settings models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
	#[serde(default = "default_api_base_url")]
	pub api_base_url: String,
	#[serde(default)]
	pub api_token: Option<String>,
	#[serde(default = "default_debounce_ms")]
	pub debounce_ms: u64,
	#[serde(default = "default_request_timeout_secs")]
	pub request_timeout_secs: u64,
}

fn default_api_base_url() -> String {
	"http://127.0.0.1:3000".to_string()
}

fn default_debounce_ms() -> u64 {
	400
}

fn default_request_timeout_secs() -> u64 {
	15
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			api_base_url: default_api_base_url(),
			api_token: None,
			debounce_ms: default_debounce_ms(),
			request_timeout_secs: default_request_timeout_secs(),
		}
	}
}

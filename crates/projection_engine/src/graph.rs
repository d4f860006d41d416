use models::{BaseSeriesId, DerivedCategory};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{EngineError, Result};

/// A declared formula input of a derived category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    Base(BaseSeriesId),
    Growth,
    Derived(DerivedCategory),
}

/// Something that changed and must be propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Root {
    Base(BaseSeriesId),
    Growth,
    /// Pins of one category changed.
    Overrides(DerivedCategory),
    /// The cached value of a category was replaced from outside the engine;
    /// only its dependents need recomputing.
    Derived(DerivedCategory),
}

/// Formula inputs of each derived category.
pub fn inputs_of(category: DerivedCategory) -> Vec<Input> {
    use DerivedCategory as D;
    match category {
        D::FixedExpenses => vec![Input::Base(BaseSeriesId::FixedExpenses)],
        D::VariableExpenses => vec![Input::Base(BaseSeriesId::VariableExpenses), Input::Growth],
        D::Investments => vec![Input::Base(BaseSeriesId::Investments), Input::Growth],
        D::RevenueReurb => vec![Input::Base(BaseSeriesId::RevenueReurb), Input::Growth],
        D::RevenueGeo => vec![Input::Base(BaseSeriesId::RevenueGeo), Input::Growth],
        D::RevenuePlan => vec![Input::Base(BaseSeriesId::RevenuePlan), Input::Growth],
        D::RevenueReg => vec![Input::Base(BaseSeriesId::RevenueReg), Input::Growth],
        D::RevenueNn => vec![Input::Base(BaseSeriesId::RevenueNn), Input::Growth],
        D::Marketing => vec![
            Input::Base(BaseSeriesId::MarketingTraffic),
            Input::Base(BaseSeriesId::MarketingSocialMedia),
            Input::Base(BaseSeriesId::MarketingContentProduction),
            Input::Growth,
        ],
        D::FixedVariable => vec![
            Input::Derived(D::FixedExpenses),
            Input::Derived(D::VariableExpenses),
        ],
        D::RevenueTotal => D::REVENUE_STREAMS.into_iter().map(Input::Derived).collect(),
        D::Budget => vec![
            Input::Derived(D::FixedVariable),
            Input::Derived(D::Marketing),
            Input::Derived(D::Investments),
        ],
        D::Result => vec![Input::Derived(D::RevenueTotal), Input::Derived(D::Budget)],
    }
}

/// Fixed evaluation order over the derived categories.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    inputs: HashMap<DerivedCategory, Vec<Input>>,
    dependents: HashMap<DerivedCategory, Vec<DerivedCategory>>,
    order: Vec<DerivedCategory>,
}

impl DependencyGraph {
    /// The projection's category network.
    pub fn standard() -> Result<Self> {
        Self::build(DerivedCategory::ALL.iter().map(|&c| (c, inputs_of(c))))
    }

    /// Builds a graph from explicit input declarations and computes its
    /// topological order (Kahn). Ties keep declaration order.
    pub fn build(nodes: impl IntoIterator<Item = (DerivedCategory, Vec<Input>)>) -> Result<Self> {
        let mut declared: Vec<DerivedCategory> = Vec::new();
        let mut inputs: HashMap<DerivedCategory, Vec<Input>> = HashMap::new();
        for (category, deps) in nodes {
            if !inputs.contains_key(&category) {
                declared.push(category);
            }
            inputs.insert(category, deps);
        }

        let mut dependents: HashMap<DerivedCategory, Vec<DerivedCategory>> = HashMap::new();
        let mut in_degree: HashMap<DerivedCategory, usize> =
            declared.iter().map(|&c| (c, 0)).collect();
        for &category in &declared {
            for input in &inputs[&category] {
                if let Input::Derived(upstream) = input {
                    dependents.entry(*upstream).or_default().push(category);
                    if inputs.contains_key(upstream) {
                        *in_degree.entry(category).or_default() += 1;
                    }
                }
            }
        }

        let mut order = Vec::with_capacity(declared.len());
        let mut queue: VecDeque<DerivedCategory> = declared
            .iter()
            .copied()
            .filter(|c| in_degree[c] == 0)
            .collect();
        while let Some(category) = queue.pop_front() {
            order.push(category);
            for &dependent in dependents.get(&category).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if order.len() != declared.len() {
            let remaining = declared
                .into_iter()
                .filter(|c| !order.contains(c))
                .collect();
            return Err(EngineError::CyclicDependency(remaining));
        }

        Ok(Self {
            inputs,
            dependents,
            order,
        })
    }

    pub fn order(&self) -> &[DerivedCategory] {
        &self.order
    }

    pub fn inputs(&self, category: DerivedCategory) -> &[Input] {
        self.inputs.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn direct_dependents(&self, category: DerivedCategory) -> &[DerivedCategory] {
        self.dependents.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Categories whose formulas read `root` directly.
    fn seeds(&self, root: Root) -> Vec<DerivedCategory> {
        match root {
            Root::Overrides(category) => vec![category],
            Root::Derived(category) => self.direct_dependents(category).to_vec(),
            Root::Base(id) => self.readers_of(Input::Base(id)),
            Root::Growth => self.readers_of(Input::Growth),
        }
    }

    fn readers_of(&self, input: Input) -> Vec<DerivedCategory> {
        self.order
            .iter()
            .copied()
            .filter(|c| self.inputs(*c).contains(&input))
            .collect()
    }

    /// Every category transitively reachable from `roots`, in evaluation order.
    pub fn affected_by(&self, roots: &[Root]) -> Vec<DerivedCategory> {
        let mut seen: HashSet<DerivedCategory> = HashSet::new();
        let mut queue: VecDeque<DerivedCategory> = VecDeque::new();
        for &root in roots {
            for category in self.seeds(root) {
                if seen.insert(category) {
                    queue.push_back(category);
                }
            }
        }
        while let Some(current) = queue.pop_front() {
            for &dependent in self.direct_dependents(current) {
                if seen.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }
        self.order.iter().copied().filter(|c| seen.contains(c)).collect()
    }
}

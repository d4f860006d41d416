//! Twelve-month projection engine.
//!
//! Base series and growth percentages are the roots; every derived category
//! is recomputed from them through a fixed dependency graph, with manually
//! pinned cells taking precedence over formulas until everything is reset.

pub mod base_series;
pub mod engine;
pub mod error;
pub mod graph;
pub mod overrides;
pub mod report;
pub mod rules;

pub use base_series::BaseSeries;
pub use engine::ProjectionEngine;
pub use error::{EngineError, Result};
pub use graph::{DependencyGraph, Input, Root};
pub use overrides::OverrideTracker;
pub use report::{generate_report, write_report_json, ProjectionReport};

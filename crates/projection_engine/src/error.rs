use models::DerivedCategory;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("Month index {0} is out of range (expected 0..12)")]
    MonthOutOfRange(usize),

    #[error("Value {0} is not a finite number")]
    NonFiniteValue(f64),

    #[error("Cyclic dependency among categories: {0:?}")]
    CyclicDependency(Vec<DerivedCategory>),
}

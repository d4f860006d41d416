use models::CategoryKey;
use projection_engine::EngineError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PersistenceError>;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid store URL: {0}")]
    InvalidUrl(String),

    #[error("Store answered {status} for {category}")]
    Status { category: String, status: u16 },

    #[error("Store rejected the snapshot for {0}")]
    Rejected(CategoryKey),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

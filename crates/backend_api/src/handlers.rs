use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use models::{CategoryKey, CategorySnapshot, SaveResponse};
use serde_json::Value;
use std::sync::Arc;

use crate::{auth, error::ApiError, repository::ProjectionRepository, Result};

/// Shared state for every route.
pub struct AppState {
    pub repo: Arc<dyn ProjectionRepository>,
    /// Required bearer token for mutating routes; `None` accepts any token.
    pub api_token: Option<String>,
}

pub type SharedState = Arc<AppState>;

fn parse_category(raw: &str) -> Result<CategoryKey> {
    Ok(raw.parse::<CategoryKey>()?)
}

/// Normalizes a document to its category's shape: 12 months per series,
/// values rounded to two decimals.
pub fn canonicalize(category: CategoryKey, body: Value) -> Result<Value> {
    let snapshot = CategorySnapshot::from_value(category, body)
        .map_err(|e| ApiError::BadRequest(format!("{category}: {e}")))?;
    Ok(snapshot.rounded().to_value()?)
}

/// GET /api/:category
/// Returns the stored document, or the zero-filled default if none was written
pub async fn get_category(
    State(state): State<SharedState>,
    Path(category): Path<String>,
) -> Result<impl IntoResponse> {
    let category = parse_category(&category)?;
    let document = match state.repo.fetch(category).await? {
        Some(document) => document,
        None => CategorySnapshot::empty(category).to_value()?,
    };
    Ok(Json(document))
}

/// PUT /api/:category
/// Replaces the stored document and echoes the canonical copy
pub async fn put_category(
    State(state): State<SharedState>,
    Path(category): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse> {
    auth::authorize(&headers, state.api_token.as_deref())?;
    let category = parse_category(&category)?;

    let canonical = canonicalize(category, body)?;
    state.repo.store(category, canonical.clone()).await?;
    tracing::debug!(%category, "stored category snapshot");

    Ok(Json(SaveResponse {
        success: true,
        data: canonical,
    }))
}

/// DELETE /api/clear-all-projection-data
/// Wipes every category
pub async fn clear_all_projection_data(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    auth::authorize(&headers, state.api_token.as_deref())?;
    state.repo.clear_all().await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "All projection data cleared."
    })))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "projection-api",
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonicalize_pads_and_rounds() {
        let value = canonicalize(CategoryKey::Budget, json!({"previsto": [1.234, "x"]})).unwrap();
        let previsto = value["previsto"].as_array().unwrap();
        assert_eq!(previsto.len(), 12);
        assert_eq!(previsto[0], json!(1.23));
        assert_eq!(previsto[1], json!(0.0));
        assert_eq!(value["maximo"].as_array().unwrap().len(), 12);
    }

    #[test]
    fn test_canonicalize_rejects_wrong_shape() {
        assert!(matches!(
            canonicalize(CategoryKey::Budget, json!("not a triple")),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_unknown_category() {
        assert!(matches!(
            parse_category("dashboard"),
            Err(ApiError::UnknownCategory(_))
        ));
    }
}

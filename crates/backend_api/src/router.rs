use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{self, SharedState};

/// Create the main application router with all API endpoints
pub fn create_router(state: SharedState) -> Router {
    // Create CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Bulk reset; the static segment takes precedence over `:category`
        .route(
            "/api/clear-all-projection-data",
            delete(handlers::clear_all_projection_data),
        )
        // Per-category documents
        .route(
            "/api/:category",
            get(handlers::get_category).put(handlers::put_category),
        )
        .with_state(state)
        // Add middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::AppState;
    use crate::repository::FileProjectionRepository;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(dir: &tempfile::TempDir, token: Option<&str>) -> Router {
        let repo = Arc::new(FileProjectionRepository::new(dir.path().join("projection.json")));
        create_router(Arc::new(AppState {
            repo,
            api_token: token.map(str::to_string),
        }))
    }

    fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(&dir, None)
            .oneshot(request(Method::GET, "/health", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_get_absent_category_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(&dir, None)
            .oneshot(request(Method::GET, "/api/resultado", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["medio"].as_array().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_put_echoes_canonical_copy() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir, Some("secret"));

        let response = app
            .clone()
            .oneshot(request(
                Method::PUT,
                "/api/mkt",
                Some("secret"),
                Some(json!({"previsto": [10.005, 2.0], "medio": [], "maximo": []})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["previsto"][1], json!(2.0));
        assert_eq!(body["data"]["previsto"].as_array().unwrap().len(), 12);

        let stored = json_body(
            app.oneshot(request(Method::GET, "/api/mkt", None, None))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(stored, body["data"]);
    }

    #[tokio::test]
    async fn test_mutations_require_token() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir, Some("secret"));

        for (method, uri, body) in [
            (Method::PUT, "/api/budget", Some(json!({}))),
            (Method::DELETE, "/api/clear-all-projection-data", None),
        ] {
            let missing = app
                .clone()
                .oneshot(request(method.clone(), uri, None, body.clone()))
                .await
                .unwrap();
            assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
            let wrong = app
                .clone()
                .oneshot(request(method, uri, Some("nope"), body))
                .await
                .unwrap();
            assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_unknown_category_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(&dir, None)
            .oneshot(request(Method::GET, "/api/dashboard", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_clear_all_wipes_documents() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir, None);

        let put = app
            .clone()
            .oneshot(request(
                Method::PUT,
                "/api/projection",
                Some("any"),
                Some(json!({"revenueGeo": [5.0], "growth": {"minimo": 1.0, "medio": 2.0, "maximo": 3.0}})),
            ))
            .await
            .unwrap();
        assert_eq!(put.status(), StatusCode::OK);

        let cleared = app
            .clone()
            .oneshot(request(Method::DELETE, "/api/clear-all-projection-data", Some("any"), None))
            .await
            .unwrap();
        assert_eq!(cleared.status(), StatusCode::OK);

        let body = json_body(
            app.oneshot(request(Method::GET, "/api/projection", None, None))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(body["revenueGeo"][0], json!(0.0));
        assert_eq!(body["growth"]["medio"], json!(0.0));
    }
}

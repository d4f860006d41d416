use backend_api::{create_router, AppState, FileProjectionRepository};
use models::{
    BaseSeriesId, CategoryKey, CategorySnapshot, DerivedCategory, MonthlySeries, Scenario,
    ScenarioTriple, Settings,
};
use persistence::{HttpProjectionStore, PersistenceError, ProjectionSession, ProjectionStore};
use std::sync::Arc;

async fn spawn_server(dir: &tempfile::TempDir, token: Option<&str>) -> String {
    let state = Arc::new(AppState {
        repo: Arc::new(FileProjectionRepository::new(dir.path().join("projection.json"))),
        api_token: token.map(str::to_string),
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

fn settings(base: String, token: Option<&str>) -> Settings {
    Settings {
        api_base_url: base,
        api_token: token.map(str::to_string),
        debounce_ms: 20,
        ..Settings::default()
    }
}

#[tokio::test]
async fn test_round_trip_through_http_api() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(&dir, Some("secret")).await;
    let store = HttpProjectionStore::new(&settings(base, Some("secret"))).unwrap();

    assert_eq!(
        store.load(CategoryKey::Budget).await.unwrap(),
        CategorySnapshot::empty(CategoryKey::Budget)
    );

    let triple = ScenarioTriple {
        medio: MonthlySeries::filled(3.14159),
        ..ScenarioTriple::default()
    };
    let canonical = store
        .save(CategoryKey::Budget, CategorySnapshot::Triple(triple))
        .await
        .unwrap();
    match &canonical {
        CategorySnapshot::Triple(t) => assert_eq!(t.medio.get(11), 3.14),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(store.load(CategoryKey::Budget).await.unwrap(), canonical);

    store.clear_all().await.unwrap();
    assert_eq!(
        store.load(CategoryKey::Budget).await.unwrap(),
        CategorySnapshot::empty(CategoryKey::Budget)
    );
}

#[tokio::test]
async fn test_wrong_token_is_a_save_failure() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(&dir, Some("secret")).await;
    let store = HttpProjectionStore::new(&settings(base, Some("wrong"))).unwrap();

    let err = store
        .save(CategoryKey::Mkt, CategorySnapshot::empty(CategoryKey::Mkt))
        .await
        .unwrap_err();
    assert!(matches!(err, PersistenceError::Status { status: 401, .. }));
    assert!(store.clear_all().await.is_err());
}

#[tokio::test]
async fn test_session_persists_cascade_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(&dir, None).await;
    let settings = settings(base, Some("token"));
    let store: Arc<dyn ProjectionStore> = Arc::new(HttpProjectionStore::new(&settings).unwrap());

    let mut session = ProjectionSession::open(store.clone(), &settings).await.unwrap();
    session.settle().await;
    session
        .edit_base_series(BaseSeriesId::RevenueReurb, MonthlySeries::filled(250.0));
    session.settle().await;

    let reports = session.verify_all().await.unwrap();
    assert!(reports.iter().all(|r| r.in_sync), "{reports:?}");

    let reopened = ProjectionSession::open(store, &settings).await.unwrap();
    assert_eq!(
        reopened
            .engine()
            .value(DerivedCategory::Result, Scenario::Maximo, 6),
        250.0
    );
    assert!(reopened.is_idle());
}

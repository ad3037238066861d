use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use opensase_catalog_reconcile::api::{router, AppState};
use opensase_catalog_reconcile::domain::value_objects::DocumentPath;
use opensase_catalog_reconcile::store::MemoryStore;
use opensase_catalog_reconcile::{Fields, ReconcileOptions, Reconciler, SlugMappingTable};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const TOKEN: &str = "test-admin-token-0001";

async fn state(token: Option<&str>) -> (Arc<MemoryStore>, AppState) {
    let store = Arc::new(MemoryStore::new());
    store.seed(DocumentPath::category("상의"), Fields::new()).await;
    let mapping = Arc::new(SlugMappingTable::builtin().unwrap());
    let reconciler = Arc::new(Reconciler::new(store.clone(), mapping, ReconcileOptions::default()));
    (store, AppState::new(reconciler, token.map(str::to_string), None))
}

fn post(action: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(format!("/api/v1/admin/reconcile/{action}"));
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (_, state) = state(Some(TOKEN)).await;
    let response = router(state).oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_rejects_missing_or_wrong_token() {
    let (store, state) = state(Some(TOKEN)).await;
    let app = router(state);
    assert_eq!(app.clone().oneshot(post("all", None)).await.unwrap().status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.oneshot(post("all", Some("not-the-token"))).await.unwrap().status(), StatusCode::UNAUTHORIZED);
    assert_eq!(store.write_count().await, 0);
}

#[tokio::test]
async fn test_rejects_token_prefix_and_extension() {
    let (store, state) = state(Some(TOKEN)).await;
    let app = router(state);
    let prefix = &TOKEN[..TOKEN.len() - 1];
    let extended = format!("{TOKEN}x");
    assert_eq!(app.clone().oneshot(post("all", Some(prefix))).await.unwrap().status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.oneshot(post("all", Some(&extended))).await.unwrap().status(), StatusCode::UNAUTHORIZED);
    assert_eq!(store.write_count().await, 0);
}

#[tokio::test]
async fn test_disabled_without_configured_token() {
    let (_, state) = state(None).await;
    let response = router(state).oneshot(post("verify", Some(TOKEN))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_action() {
    let (_, state) = state(Some(TOKEN)).await;
    let response = router(state).oneshot(post("purge", Some(TOKEN))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_busy_while_another_run_holds_the_lock() {
    let (_, state) = state(Some(TOKEN)).await;
    let lock = state.run_lock.clone();
    let _held = lock.lock().await;
    let response = router(state).oneshot(post("verify", Some(TOKEN))).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_runs_reconciliation() {
    let (store, state) = state(Some(TOKEN)).await;
    let response = router(state).oneshot(post("all", Some(TOKEN))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report = json_body(response).await;
    assert_eq!(report["action"], "all");
    assert_eq!(report["verification"]["remaining_legacy_keys"], serde_json::json!([]));
    assert!(report["finalized"].as_array().unwrap().iter().any(|f| f["legacy_key"] == "상의" && f["deleted"] == true));
    assert!(store.document(&DocumentPath::category("상의")).await.is_none());
    assert!(store.document(&DocumentPath::category("tops")).await.is_some());
}

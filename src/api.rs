//! Admin HTTP trigger for the reconciliation job.
//!
//! `POST /api/v1/admin/reconcile/:action` runs the same driver as the CLI.
//! Requests need `Authorization: Bearer <ADMIN_TOKEN>`; without a configured
//! token the trigger is disabled. Only one run executes at a time.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::domain::events;
use crate::reconcile::{Action, Reconciler, RunReport};

#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<Reconciler>,
    pub admin_token: Option<Arc<str>>,
    pub nats: Option<async_nats::Client>,
    pub run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(reconciler: Arc<Reconciler>, admin_token: Option<String>, nats: Option<async_nats::Client>) -> Self {
        Self { reconciler, admin_token: admin_token.map(Arc::from), nats, run_lock: Arc::new(Mutex::new(())) }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "opensase-catalog-reconcile"})) }))
        .route("/api/v1/admin/reconcile/:action", post(trigger))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({"error": message.into()})))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(api_error(StatusCode::UNAUTHORIZED, "admin trigger is disabled"));
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match presented {
        Some(token) if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
        _ => Err(api_error(StatusCode::UNAUTHORIZED, "invalid admin token")),
    }
}

async fn trigger(State(s): State<AppState>, Path(action): Path<String>, headers: HeaderMap) -> Result<Json<RunReport>, ApiError> {
    authorize(&s, &headers)?;
    let action = action.parse::<Action>().map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    let _guard = s
        .run_lock
        .try_lock()
        .map_err(|_| api_error(StatusCode::CONFLICT, "a reconciliation run is already in progress"))?;

    tracing::info!(%action, "admin triggered reconciliation");
    match s.reconciler.run(action).await {
        Ok(report) => {
            events::publish(s.nats.as_ref(), &report.events).await;
            Ok(Json(report))
        }
        Err(aborted) => {
            events::publish(s.nats.as_ref(), &aborted.partial.events).await;
            Err((StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": aborted.to_string(), "report": aborted.partial}))))
        }
    }
}

//! `POST /api/sync`: scheduler-triggered vendor catalog import.
//!
//! Callers authenticate with `Authorization: Bearer <sync.cron_secret>`. One
//! import runs at a time per process; overlapping calls get `409`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use lucia_sync::CatalogSyncJob;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::chat::method_not_allowed;

#[derive(Clone)]
pub struct SyncState {
    job: Arc<CatalogSyncJob>,
    cron_secret: SecretString,
    in_flight: Arc<Mutex<()>>,
}

impl SyncState {
    pub fn new(job: Arc<CatalogSyncJob>, cron_secret: SecretString) -> Self {
        Self { job, cron_secret, in_flight: Arc::new(Mutex::new(())) }
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(provided) = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
        else {
            return false;
        };
        provided.as_bytes().ct_eq(self.cron_secret.expose_secret().as_bytes()).into()
    }
}

pub fn router(state: SyncState) -> Router {
    // Cron schedulers call with GET.
    Router::new()
        .route("/api/sync", post(run_sync).get(run_sync).fallback(method_not_allowed))
        .with_state(state)
}

pub async fn run_sync(
    State(state): State<SyncState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !state.authorized(&headers) {
        warn!(event_name = "http.sync.unauthorized", "sync request rejected");
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" })));
    }

    let Ok(guard) = Arc::clone(&state.in_flight).try_lock_owned() else {
        warn!(event_name = "http.sync.busy", "sync already running");
        return (
            StatusCode::CONFLICT,
            Json(json!({
                "success": false,
                "error": "Sync already in progress",
                "timestamp": Utc::now().to_rfc3339(),
            })),
        );
    };

    // The import runs detached and holds the guard until it finishes, even if
    // the caller disconnects.
    let job = Arc::clone(&state.job);
    let import = tokio::spawn(async move {
        let _guard = guard;
        job.run().await.map_err(|failure| failure.to_string())
    });
    let outcome = import
        .await
        .unwrap_or_else(|error| Err(format!("sync task stopped before finishing: {error}")));

    match outcome {
        Ok(report) => {
            let duration = report.duration_label();
            info!(
                event_name = "http.sync.completed",
                duration_secs = %duration,
                "sync request completed"
            );
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": format!("Sync completed in {duration}s"),
                    "duration": duration,
                    "counts": {
                        "colors": report.colors,
                        "products": report.products,
                        "prices": report.prices,
                    },
                    "timestamp": Utc::now().to_rfc3339(),
                })),
            )
        }
        Err(failure) => {
            error!(event_name = "http.sync.failed", error = %failure, "sync request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": failure,
                    "timestamp": Utc::now().to_rfc3339(),
                })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        extract::State,
        http::{header::AUTHORIZATION, HeaderMap, HeaderValue, Request, StatusCode},
    };
    use lucia_core::catalog_import::VendorRecord;
    use lucia_db::InMemoryCatalogStore;
    use lucia_sync::{CatalogResource, CatalogSource, CatalogSyncJob, SessionToken, SyncError};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, run_sync, SyncState};

    struct StaticSource {
        fail_auth: bool,
        fetch_delay: Duration,
    }

    #[async_trait]
    impl CatalogSource for StaticSource {
        async fn authenticate(&self) -> Result<SessionToken, SyncError> {
            if self.fail_auth {
                return Err(SyncError::Authentication("invalid AccessKey".to_string()));
            }
            Ok(SessionToken("tok".to_string()))
        }

        async fn fetch(
            &self,
            _token: &SessionToken,
            resource: CatalogResource,
        ) -> Result<Vec<VendorRecord>, SyncError> {
            tokio::time::sleep(self.fetch_delay).await;
            let records = match resource {
                CatalogResource::Colors => json!([{"ColorCode": "01", "Description": "Branco"}]),
                CatalogResource::Products => json!([{"ProdReference": "MUG-01", "Name": "Caneca"}]),
                CatalogResource::Optionals => json!([{
                    "ProdReference": "MUG-01",
                    "Price1": 10.0, "MinQt1": 1,
                    "Price2": 8.0, "MinQt2": 50
                }]),
            };
            Ok(records
                .as_array()
                .map(|items| items.iter().filter_map(|item| item.as_object().cloned()).collect())
                .unwrap_or_default())
        }
    }

    fn state(fail_auth: bool) -> (SyncState, Arc<InMemoryCatalogStore>) {
        slow_state(fail_auth, Duration::ZERO)
    }

    fn slow_state(fail_auth: bool, fetch_delay: Duration) -> (SyncState, Arc<InMemoryCatalogStore>) {
        let store = Arc::new(InMemoryCatalogStore::default());
        let source = StaticSource { fail_auth, fetch_delay };
        let job = CatalogSyncJob::new(Arc::new(source), store.clone());
        (SyncState::new(Arc::new(job), "cron-secret".to_string().into()), store)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header"),
        );
        headers
    }

    #[tokio::test]
    async fn missing_bearer_is_unauthorized() {
        let (state, store) = state(false);

        let request =
            Request::builder().method("POST").uri("/api/sync").body(Body::empty()).expect("request");
        let response = router(state).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body, json!({"error": "Unauthorized"}));
        assert_eq!(store.product_count().await, 0);
    }

    #[tokio::test]
    async fn wrong_secret_is_unauthorized() {
        let (state, _) = state(false);

        let (status, _) = run_sync(State(state), bearer("guess")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn authorized_sync_reports_duration_and_writes_store() {
        let (state, store) = state(false);

        let (status, axum::Json(body)) = run_sync(State(state), bearer("cron-secret")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let duration = body["duration"].as_str().expect("duration string");
        assert_eq!(body["message"], format!("Sync completed in {duration}s"));
        assert_eq!(body["counts"], json!({"colors": 1, "products": 1, "prices": 2}));
        assert_eq!(store.price_count().await, 2);
    }

    #[tokio::test]
    async fn job_failure_reports_error() {
        let (state, _) = state(true);

        let (status, axum::Json(body)) = run_sync(State(state), bearer("cron-secret")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().expect("error").contains("invalid AccessKey"));
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn overlapping_sync_is_rejected() {
        let (state, _) = state(false);
        let _running = state.in_flight.clone().try_lock_owned().expect("first lock");

        let (status, axum::Json(body)) = run_sync(State(state), bearer("cron-secret")).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn secret_with_different_length_or_scheme_is_unauthorized() {
        let (state, _) = state(false);
        let mut basic = HeaderMap::new();
        basic.insert(AUTHORIZATION, HeaderValue::from_static("Basic cron-secret"));

        let (prefix, _) = run_sync(State(state.clone()), bearer("cron-secre")).await;
        let (scheme, _) = run_sync(State(state), basic).await;

        assert_eq!(prefix, StatusCode::UNAUTHORIZED);
        assert_eq!(scheme, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn import_finishes_after_the_caller_stops_waiting() {
        let (state, store) = slow_state(false, Duration::from_millis(200));
        let in_flight = Arc::clone(&state.in_flight);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            run_sync(State(state), bearer("cron-secret")),
        )
        .await;
        assert!(abandoned.is_err(), "caller should give up before the import is done");
        assert!(in_flight.try_lock().is_err(), "detached import should still hold the guard");

        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(store.color_count().await, 1);
        assert_eq!(store.price_count().await, 2);
        assert!(in_flight.try_lock().is_ok());
    }
}

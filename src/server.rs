// HTTP front end: JSON read endpoints, server-side route rendering and the
// snapshot file as a static asset.

use crate::app::{render_boot_failure, App};
use crate::config::Config;
use crate::db::Database;
use crate::models::{institution_profile, ranked_products, InstitutionProfile, RankedProduct};
use crate::runtime::{Host, HOME_ROUTE};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, error};

/// Virtual time a server-side render may take to settle
const RENDER_BUDGET_MS: f64 = 10_000.0;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Database>>,
    config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            config: Arc::new(config),
        }
    }

    /// Run `f` against the gateway; a poisoned lock reads as a server error
    fn with_db<T>(&self, f: impl FnOnce(&Database) -> crate::error::Result<T>) -> Result<T, String> {
        let db = self.db.lock().map_err(|_| "database lock poisoned".to_string())?;
        f(&db).map_err(|e| e.to_string())
    }
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }

    fn fail(status: StatusCode, message: impl Into<String>) -> Response {
        (
            status,
            Json(Self {
                success: false,
                data: None,
                error: Some(message.into()),
            }),
        )
            .into_response()
    }
}

#[derive(Deserialize)]
pub struct RenderQuery {
    hash: Option<String>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Response {
    ApiResponse::ok("OK")
}

/// GET /api/hysa - Savings products ranked by APY
async fn get_hysa(State(state): State<AppState>) -> Response {
    match state.with_db(ranked_products) {
        Ok(products) => ApiResponse::ok(products),
        Err(e) => {
            error!("Error ranking savings products: {}", e);
            ApiResponse::<Vec<RankedProduct>>::fail(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// GET /api/institutions/:charter - One institution with its joined rows
async fn get_institution(State(state): State<AppState>, Path(charter): Path<String>) -> Response {
    match state.with_db(|db| institution_profile(db, &charter)) {
        Ok(Some(profile)) => ApiResponse::ok(profile),
        Ok(None) => ApiResponse::<InstitutionProfile>::fail(
            StatusCode::NOT_FOUND,
            format!("No credit union found with charter #{}", charter),
        ),
        Err(e) => {
            error!("Error loading charter {}: {}", charter, e);
            ApiResponse::<InstitutionProfile>::fail(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// GET /api/snapshot - Build provenance recorded by the importer
async fn get_snapshot(State(state): State<AppState>) -> Response {
    let meta = state.with_db(|db| {
        let rows = db.query("SELECT key, value FROM snapshot_meta ORDER BY key", &[])?;
        Ok(rows
            .iter()
            .filter_map(|row| Some((row.text("key")?, row.text_or_empty("value"))))
            .collect::<BTreeMap<String, String>>())
    });

    match meta {
        Ok(meta) => ApiResponse::ok(meta),
        Err(e) => {
            error!("Error reading snapshot metadata: {}", e);
            ApiResponse::<BTreeMap<String, String>>::fail(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// GET /render?hash=/browse?state=CA - Full page HTML for one route
async fn render_route(State(state): State<AppState>, Query(query): Query<RenderQuery>) -> Response {
    let hash = query
        .hash
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| HOME_ROUTE.to_string());
    debug!(%hash, "server-side render");

    // Each render works on its own copy; the shared gateway stays locked only for the copy
    let snapshot = state.with_db(|db| db.duplicate());

    match tokio::task::spawn_blocking(move || render_html(snapshot, &hash)).await {
        Ok((status, html)) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("render task failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "render failed").into_response()
        }
    }
}

/// Start a private session at `hash` over `snapshot`, let it settle and
/// serialise the page
///
/// The session never leaves this thread; it is torn down before returning.
pub fn render_html(snapshot: Result<Database, String>, hash: &str) -> (StatusCode, String) {
    let host = Host::with_hash(hash);

    match snapshot {
        Ok(db) => {
            let app = App::start(&host, db);
            host.run_until_idle(RENDER_BUDGET_MS);
            let html = host.document().to_html();
            app.shutdown();
            (StatusCode::OK, html)
        }
        Err(reason) => {
            error!("no snapshot to render from: {}", reason);
            render_boot_failure(&host.document().app(), &reason);
            let html = host.document().to_html();
            host.shutdown();
            (StatusCode::SERVICE_UNAVAILABLE, html)
        }
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/hysa", get(get_hysa))
        .route("/institutions/:charter", get(get_institution))
        .route("/snapshot", get(get_snapshot))
        .with_state(state.clone());

    Router::new()
        .route("/render", get(render_route))
        .with_state(state)
        .nest("/api", api_routes)
        .nest_service("/data", ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_connection;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use rusqlite::DatabaseName;
    use tower::ServiceExt;

    struct Fixture {
        _dir: tempfile::TempDir,
        router: Router,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credit_unions.db");
        sample_connection().backup(DatabaseName::Main, &path, None).unwrap();

        let config = Config {
            dataset_path: path.clone(),
            static_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let db = Database::load(&path).unwrap();
        Fixture {
            _dir: dir,
            router: build_router(AppState::new(db, config)),
        }
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_body(fixture().router, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"success\":true"));
    }

    #[tokio::test]
    async fn test_hysa_is_ranked() {
        let (status, body) = get_body(fixture().router, "/api/hysa").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        let data = json["data"].as_array().unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data[0]["rank"], 1);
        assert_eq!(data[0]["savings"]["apy"], "5.00%");
        assert_eq!(data[0]["name"], "SCHOOLSFIRST FEDERAL CREDIT UNION");
    }

    #[tokio::test]
    async fn test_institution_found_and_missing() {
        let f = fixture();
        let (status, body) = get_body(f.router.clone(), "/api/institutions/2").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("GOLDEN 1"));

        let (status, body) = get_body(f.router, "/api/institutions/424242").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("charter #424242"));
    }

    #[tokio::test]
    async fn test_render_route_to_html() {
        let (status, body) = get_body(fixture().router, "/render?hash=/detail/4").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("<!DOCTYPE html>"));
        assert!(body.contains("Alliant Credit Union"));
    }

    #[tokio::test]
    async fn test_render_without_snapshot_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            dataset_path: dir.path().join("missing.db"),
            ..Config::default()
        };
        let router = build_router(AppState::new(Database::uninitialized(), config));

        let (status, body) = get_body(router, "/render").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("Failed to load the database"));
    }

    #[tokio::test]
    async fn test_render_uses_loaded_snapshot() {
        let f = fixture();
        std::fs::remove_file(f._dir.path().join("credit_unions.db")).unwrap();

        let (status, body) = get_body(f.router, "/render?hash=/hysa").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("hysa-card"));
    }

    #[test]
    fn test_render_html_keeps_shared_gateway_untouched() {
        let db = crate::fixtures::sample_database();
        db.cached_query("k", "SELECT 1 AS one", &[]).unwrap();

        let (status, html) = render_html(db.duplicate().map_err(|e| e.to_string()), "/browse");
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("browse-results-info"));
        assert_eq!(db.cached_keys(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_file_is_served() {
        let (status, _) = get_body(fixture().router, "/data/credit_unions.db").await;
        assert_eq!(status, StatusCode::OK);
    }
}

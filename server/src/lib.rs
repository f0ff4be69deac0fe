use anyhow::Result;
use axum::{extract::{Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sieve_core::config::SearchConfig;
use sieve_core::persist::{load_report, IndexPaths};
use sieve_core::{SearchHit, Searcher};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Clone)]
pub struct AppState {
    pub index_root: PathBuf,
    pub config: SearchConfig,
    /// Swapped whole on reload; queries keep the handle they started with.
    pub searcher: Arc<RwLock<Arc<Searcher>>>,
    pub admin_token: Option<String>,
}

impl AppState {
    fn current(&self) -> Arc<Searcher> { self.searcher.read().clone() }
}

pub fn build_app(index_dir: String) -> Result<Router> {
    build_app_with(index_dir, SearchConfig::default(), std::env::var("ADMIN_TOKEN").ok())
}

pub fn build_app_with(index_dir: String, config: SearchConfig, admin_token: Option<String>) -> Result<Router> {
    // The merged index must be complete before any query is served.
    let index_root = PathBuf::from(&index_dir);
    let searcher = Searcher::open(&IndexPaths::new(&index_root), config.clone())?;
    let app_state = AppState {
        index_root,
        config,
        searcher: Arc::new(RwLock::new(Arc::new(searcher))),
        admin_token,
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/stats", get(stats_handler))
        .route("/admin/reload", post(reload_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let searcher = state.current();
    let found = searcher.search_k(&params.q, params.k);
    let elapsed = start.elapsed();
    Json(SearchResponse {
        query: params.q,
        took_ms: elapsed.as_millis(),
        took_s: elapsed.as_secs_f64(),
        total_hits: found.total_hits,
        results: found.hits,
    })
}

pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let report = load_report(&IndexPaths::new(&state.index_root))
        .map_err(|e| (StatusCode::NOT_FOUND, format!("report unavailable: {e}")))?;
    let terms_loaded = state.current().index().len();
    Ok(Json(serde_json::json!({
        "total_documents": report.total_documents,
        "unique_terms": report.unique_terms,
        "index_size_bytes": report.index_size_bytes,
        "terms_loaded": terms_loaded,
    })))
}

async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let root = state.index_root.clone();
    let config = state.config.clone();
    let loaded = tokio::task::spawn_blocking(move || Searcher::open(&IndexPaths::new(&root), config))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("reload failed: {e}")))?;
    let terms = loaded.index().len();
    *state.searcher.write() = Arc::new(loaded);
    tracing::info!(terms, "index reloaded");
    Ok(Json(serde_json::json!({ "reloaded": true, "terms": terms })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

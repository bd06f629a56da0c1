use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use revdex_core::persist::IndexPaths;
use revdex_core::{Error, FilterKind, FilterSelection, Polarity, ReviewId, SearchContext};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct QueryParams {
    pub aspect1: String,
    pub aspect2: String,
    pub opinion: String,
    pub method: String,
    /// Comma-separated refinement filters, e.g. `rating,lexicon`.
    #[serde(default)]
    pub filters: Option<String>,
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub method: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub review_index: Vec<ReviewId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refined: Option<RefinedResponse>,
}

#[derive(Serialize)]
pub struct RefinedResponse {
    pub polarity: Polarity,
    pub filters: Vec<FilterReport>,
    pub review_index: Vec<ReviewId>,
}

#[derive(Serialize)]
pub struct FilterReport {
    pub filter: FilterKind,
    pub hits: usize,
    pub inconclusive: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<SearchContext>,
}

pub struct ServerConfig {
    pub index_dir: PathBuf,
    pub positive_lexicon: Option<PathBuf>,
    pub negative_lexicon: Option<PathBuf>,
}

/// Load the snapshot once at startup and build the router around it.
pub fn build_app(config: &ServerConfig) -> Result<Router> {
    let paths = IndexPaths::new(&config.index_dir);
    let lexicon = match (&config.positive_lexicon, &config.negative_lexicon) {
        (Some(p), Some(n)) => Some((p.as_path(), n.as_path())),
        (None, None) => None,
        _ => anyhow::bail!("positive and negative lexicon paths must be given together"),
    };
    let ctx = SearchContext::open(&paths, lexicon, false)?;
    Ok(router(Arc::new(ctx)))
}

fn cors_layer() -> CorsLayer {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    match std::env::var("CORS_ALLOW_ORIGIN") {
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
    }
}

pub fn router(ctx: Arc<SearchContext>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/query", get(query_handler))
        .route("/review/:review_id", get(review_handler))
        .with_state(AppState { ctx })
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::UserInput(_) => StatusCode::BAD_REQUEST,
        Error::ResourceNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: Error) -> (StatusCode, String) {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, "query failed");
    }
    (status, err.to_string())
}

pub async fn query_handler(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<QueryResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let query = revdex_core::Query::parse(&params.aspect1, &params.aspect2, &params.opinion, &params.method)
        .map_err(reject)?;
    let filters = match params.filters.as_deref() {
        Some(list) => FilterSelection::parse_list(list).map_err(reject)?,
        None => FilterSelection::none(),
    };
    let outcome = state.ctx.run(&query, &filters).map_err(reject)?;

    let refined = outcome.refinement.map(|r| RefinedResponse {
        polarity: r.polarity,
        filters: r
            .outcomes
            .iter()
            .map(|(kind, out)| FilterReport { filter: *kind, hits: out.ids.len(), inconclusive: out.inconclusive })
            .collect(),
        review_index: r.combined.to_vec(),
    });
    Ok(Json(QueryResponse {
        query: query.artifact_name(),
        method: query.combinator.to_string(),
        took_s: start.elapsed().as_secs_f64(),
        total_hits: outcome.hits.len(),
        review_index: outcome.hits.to_vec(),
        refined,
    }))
}

pub async fn review_handler(
    State(state): State<AppState>,
    Path(review_id): Path<ReviewId>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    match state.ctx.metadata.get(review_id) {
        Some(meta) => Ok(Json(serde_json::json!({
            "review_id": review_id,
            "rating": meta.rating,
            "customer_id": meta.customer_id,
            "text": meta.text,
        }))),
        None => Err((StatusCode::NOT_FOUND, format!("review {review_id} not found"))),
    }
}

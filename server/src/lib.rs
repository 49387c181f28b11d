use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use ferret_core::{QueryEngine, SearchResult};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub type SharedEngine = Arc<dyn QueryEngine + Send + Sync>;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchResult>,
}

#[derive(Clone)]
pub struct AppState {
    pub queries: SharedEngine,
}

pub fn build_app(queries: SharedEngine) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods(Any)
                    .allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/", get(page_handler))
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .with_state(AppState { queries })
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serves until Ctrl-C.
pub async fn serve(addr: SocketAddr, queries: SharedEngine) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, build_app(queries))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "ctrl-c handler failed");
            }
        })
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

/// Runs the query off the async runtime; the engine blocks on its locks.
async fn run_query(state: &AppState, q: &str) -> Result<Vec<SearchResult>, (StatusCode, String)> {
    let queries = Arc::clone(&state.queries);
    let q = q.to_string();
    tokio::task::spawn_blocking(move || queries.search(&q)).await.map_err(|err| {
        tracing::error!(error = %err, "search task failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "search failed".to_string())
    })
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let results = run_query(&state, &params.q).await?;
    let elapsed = start.elapsed();
    tracing::info!(query = %params.q, hits = results.len(), "search");
    Ok(Json(SearchResponse {
        query: params.q,
        took_s: elapsed.as_secs_f64(),
        total_hits: results.len(),
        results,
    }))
}

pub async fn page_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Html<String>, (StatusCode, String)> {
    let results = if params.q.trim().is_empty() {
        Vec::new()
    } else {
        run_query(&state, &params.q).await?
    };
    Ok(Html(render_page(&params.q, &results)))
}

fn render_page(query: &str, results: &[SearchResult]) -> String {
    let mut items = String::new();
    for r in results {
        let href = escape(&r.location);
        items.push_str(&format!(
            "<li><a href=\"{href}\">{href}</a> \
             <span>Score: {:.8}</span> <span>Count: {}</span></li>\n",
            r.score, r.count
        ));
    }
    let query = escape(query);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Search</title>
</head>
<body>
<h1>Search</h1>
<form method="get" action="/">
  <p><input type="text" name="q" size="50" value="{query}"></p>
  <p><button>Search</button></p>
</form>
<ol>
{items}</ol>
</body>
</html>
"#
    )
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

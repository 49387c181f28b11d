use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use ferret_core::tokenizer::stem_all;
use ferret_core::{PooledQueryBuilder, QueryEngine, SearchMode, SharedIndex, WorkerPool};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn build_tiny_app() -> (Router, Arc<PooledQueryBuilder>) {
    let index = SharedIndex::new();
    index.add_all(&stem_all("Rust is great. Rust systems programming."), "doc0");
    index.add_all(&stem_all("Learning rust slowly and carefully."), "doc1");
    let pool = Arc::new(WorkerPool::new(2).unwrap());
    let engine = Arc::new(PooledQueryBuilder::new(Arc::new(index), pool, SearchMode::Exact));
    (ferret_server::build_app(engine.clone()), engine)
}

async fn call(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let (app, engine) = build_tiny_app();

    let (status, body) = call(app, "/search?q=Rusty+RUST").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    // doc0: 2 of 6 words, doc1: 1 of 5
    assert_eq!(arr[0]["where"], "doc0");
    assert_eq!(arr[0]["count"], 2);
    assert_eq!(arr[1]["where"], "doc1");
    assert_eq!(json["total_hits"], 2);

    assert!(engine.contains("rust rusty"));
}

#[tokio::test]
async fn empty_query_has_no_hits() {
    let (app, engine) = build_tiny_app();
    let (status, body) = call(app, "/search?q=%21%21").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 0);
    assert!(engine.is_empty());
}

#[tokio::test]
async fn html_page_lists_results() {
    let (app, _engine) = build_tiny_app();
    let (status, body) = call(app.clone(), "/?q=learning").await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("<a href=\"doc1\">doc1</a>"));
    assert!(!html.contains("doc0"));

    let (status, body) = call(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
}

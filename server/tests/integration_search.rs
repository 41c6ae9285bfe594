use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use spimi_core::{build_index, IndexConfig, IndexVariant, SearchConfig, SourceDocument};
use tempfile::tempdir;
use tower::ServiceExt;

fn build_tiny_index(dir: &std::path::Path, variant: IndexVariant) {
    let docs = vec![
        SourceDocument::new("doc0", vec!["Rust".into(), "Rust is great. rust systems programming.".into()]),
        SourceDocument::new("doc1", vec!["Learning".into(), "Learning rust.".into()]),
        SourceDocument::new("doc2", vec!["Gardening".into(), "Tomatoes need sun.".into()]),
    ];
    let cfg = IndexConfig { variant, ..IndexConfig::new(dir) };
    build_index(cfg, docs.into_iter().map(Ok)).unwrap();
}

async fn call(app: Router, uri: &str) -> (StatusCode, Bytes) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), IndexVariant::Weighted);
    let app = server::build_app(&SearchConfig::new(dir.path())).unwrap();

    let (status, body) = call(app, "/search?q=rust&k=5").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["query"], "rust");
    assert_eq!(json["total_hits"], 2);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["external_id"], "doc0");
    assert_eq!(arr[1]["external_id"], "doc1");
    assert!(arr[0]["score"].as_f64().unwrap() > arr[1]["score"].as_f64().unwrap());
}

#[tokio::test]
async fn k_limits_the_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), IndexVariant::Positional);
    let app = server::build_app(&SearchConfig::new(dir.path())).unwrap();

    let (status, body) = call(app, "/search?q=rust%20tomatoes&k=1").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 3);
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_terms_give_an_empty_page() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), IndexVariant::Weighted);
    let app = server::build_app(&SearchConfig::new(dir.path())).unwrap();

    let (status, body) = call(app, "/search?q=zebra").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 0);
    assert!(json["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn health_is_ok() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), IndexVariant::Weighted);
    let app = server::build_app(&SearchConfig::new(dir.path())).unwrap();
    let (status, body) = call(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");
}

#[test]
fn frequency_indexes_are_refused_at_startup() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), IndexVariant::Frequency);
    assert!(server::build_app(&SearchConfig::new(dir.path())).is_err());
}

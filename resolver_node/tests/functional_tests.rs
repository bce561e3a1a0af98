//! Functional test suite
//!
//! Drives the resolver over real HTTP against in-process doubles for the
//! chain registry (a JSON-RPC server with canned `eth_call` answers) and
//! the content store (an object map behind `/ipfs/:hash`).

use agent_resolver::api::server::{create_router, AppState};
use agent_resolver::registry::RegistryGateway;
use agent_resolver::resolver::Resolver;
use agent_resolver::storage::{CacheStore, ContentStoreClient};
use axum::extract::{Path as RoutePath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const AGENT_ADDRESS: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
const METADATA_HASH: &str = "QmAgentMeta";
const MODEL_HASH: &str = "QmModelTree";

const TRANSLATOR_PROTO: &str = r#"syntax = "proto3";

package translator;

message TranslateRequest {
  string text = 1;
  string target_language = 2;
}

message TranslateReply {
  string text = 1;
}

service Translator {
  rpc Translate (TranslateRequest) returns (TranslateReply);
}
"#;

#[derive(Clone)]
struct FakeStore {
    objects: Arc<HashMap<String, Vec<u8>>>,
    hits: Arc<AtomicUsize>,
}

async fn store_object(
    State(store): State<FakeStore>,
    RoutePath(hash): RoutePath<String>,
) -> Response {
    store.hits.fetch_add(1, Ordering::SeqCst);
    match store.objects.get(&hash) {
        Some(bytes) => bytes.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn rpc_call(
    State(result): State<String>,
    Json(request): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    Json(json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }))
}

async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn spawn_store(objects: HashMap<String, Vec<u8>>) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let store = FakeStore {
        objects: Arc::new(objects),
        hits: Arc::clone(&hits),
    };
    let app = Router::new()
        .route("/ipfs/:hash", get(store_object))
        .with_state(store);
    (spawn_server(app).await, hits)
}

/// Registry double answering every `eth_call` with the same encoded result.
async fn spawn_registry_rpc(result: &str) -> String {
    let app = Router::new()
        .route("/", post(rpc_call))
        .with_state(result.to_string());
    spawn_server(app).await
}

async fn spawn_resolver(cache_root: &Path, rpc_endpoint: &str, store_endpoint: &str) -> String {
    let cache = CacheStore::new(cache_root);
    cache.ensure_layout().unwrap();
    let store = ContentStoreClient::new(store_endpoint).unwrap();
    let state = AppState {
        registry: Arc::new(RegistryGateway::new(rpc_endpoint).unwrap()),
        resolver: Arc::new(Resolver::new(cache, store)),
    };
    spawn_server(create_router(state)).await
}

/// ABI-encode a `metadataURI()` return value the way the chain would.
fn encoded_locator(locator: &str) -> String {
    let words = ethers::abi::encode(&[ethers::abi::Token::String(locator.to_string())]);
    format!("0x{}", hex::encode(words))
}

fn model_archive() -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let content = TRANSLATOR_PROTO.as_bytes();
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "Translator.proto", content)
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

#[tokio::test]
async fn test_sentinel_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = br#"{"files":[]}"#.to_vec();
    let cache = CacheStore::new(dir.path());
    cache.ensure_layout().unwrap();
    CacheStore::write_atomic(&cache.compiled_path("test"), &descriptor).unwrap();

    let (store_endpoint, hits) = spawn_store(HashMap::new()).await;
    // The registry endpoint is unreachable on purpose; the sentinel must
    // never consult the chain.
    let base = spawn_resolver(dir.path(), "http://127.0.0.1:1", &store_endpoint).await;

    let response = reqwest::get(format!("{base}/test")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers()[reqwest::header::CONTENT_TYPE],
        "application/json"
    );
    assert_eq!(
        response.bytes().await.unwrap().as_ref(),
        descriptor.as_slice()
    );
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_address_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (store_endpoint, _hits) = spawn_store(HashMap::new()).await;
    let base = spawn_resolver(dir.path(), "http://127.0.0.1:1", &store_endpoint).await;

    let response = reqwest::get(format!("{base}/0xBAD")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "0xBAD is not a valid Ethereum address");
}

#[tokio::test]
async fn test_unregistered_address_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (store_endpoint, hits) = spawn_store(HashMap::new()).await;
    // An address with no contract behind it answers eth_call with no data.
    let rpc_endpoint = spawn_registry_rpc("0x").await;
    let base = spawn_resolver(dir.path(), &rpc_endpoint, &store_endpoint).await;

    let response = reqwest::get(format!("{base}/{AGENT_ADDRESS}"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body["error"],
        format!("{AGENT_ADDRESS} is probably not an Agent instance")
    );
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_routes_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (store_endpoint, _hits) = spawn_store(HashMap::new()).await;
    let base = spawn_resolver(dir.path(), "http://127.0.0.1:1", &store_endpoint).await;

    let client = reqwest::Client::new();
    let response = client.post(format!("{base}/foo")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "POST /foo not found");

    let response = reqwest::get(format!("{base}/a/b")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "GET /a/b not found");
}

#[tokio::test]
async fn test_full_resolution_pipeline() {
    let dir = tempfile::tempdir().unwrap();

    let metadata = json!({
        "name": "Translator",
        "modelURI": format!("ipfs://{MODEL_HASH}"),
    });
    let mut objects = HashMap::new();
    objects.insert(
        METADATA_HASH.to_string(),
        serde_json::to_vec(&metadata).unwrap(),
    );
    objects.insert(MODEL_HASH.to_string(), model_archive());

    let (store_endpoint, hits) = spawn_store(objects).await;
    let rpc_endpoint = spawn_registry_rpc(&encoded_locator(&format!("ipfs://{METADATA_HASH}"))).await;
    let base = spawn_resolver(dir.path(), &rpc_endpoint, &store_endpoint).await;

    let response = reqwest::get(format!("{base}/{AGENT_ADDRESS}"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let first = response.bytes().await.unwrap();
    // One fetch for the metadata document, one for the model archive.
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    let descriptor: serde_json::Value = serde_json::from_slice(&first).unwrap();
    let file = &descriptor["files"][0];
    assert_eq!(file["name"], "Translator.proto");
    assert_eq!(file["package"], "translator");
    let service = &file["services"][0];
    assert_eq!(service["name"], "Translator");
    let method = &service["methods"][0];
    assert_eq!(method["name"], "Translate");
    assert_eq!(method["inputType"], ".translator.TranslateRequest");
    assert_eq!(method["outputType"], ".translator.TranslateReply");

    // Every stage is cached, so a repeat lookup never touches the store.
    let response = reqwest::get(format!("{base}/{AGENT_ADDRESS}"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let second = response.bytes().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    let cache = CacheStore::new(dir.path());
    assert!(cache.compiled_path(METADATA_HASH).is_file());
    assert!(cache
        .tree_path(METADATA_HASH)
        .join("Translator.proto")
        .is_file());
}

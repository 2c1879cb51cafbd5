//! REST client tests against a mock account

use docpkg_core::{DocumentStore, PatchOperation, StoreError, StoreOutcome};
use docpkg_cosmos::{CosmosClient, CosmosConfig, DEFAULT_API_VERSION};
use docpkg_model::{Document, DocumentKey, PartitionKeyValue};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// base64("key")
const KEY: &str = "a2V5";

fn client(server: &MockServer) -> CosmosClient {
    CosmosClient::new(CosmosConfig::new(&server.uri(), KEY).unwrap()).unwrap()
}

fn key(id: &str) -> DocumentKey {
    DocumentKey::new("shop", "items", id, PartitionKeyValue::single("a"))
}

fn doc(value: serde_json::Value) -> Document {
    Document::from_value(value).unwrap()
}

#[tokio::test]
async fn test_read_sends_signed_headers_and_returns_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dbs/shop/colls/items/docs/1"))
        .and(header("x-ms-version", DEFAULT_API_VERSION))
        .and(header("x-ms-documentdb-partitionkey", r#"["a"]"#))
        .and(header_exists("x-ms-date"))
        .and(header_exists("authorization"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "1", "pk": "a", "_etag": "\"e1\""})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client(&server).read(&key("1")).await.unwrap();
    let StoreOutcome::Ok { status, document, etag } = outcome else {
        panic!("expected a document, got {outcome:?}");
    };
    assert_eq!(status, 200);
    assert_eq!(etag.as_deref(), Some("\"e1\""));
    assert_eq!(document.unwrap().get("pk"), Some(&json!("a")));
}

#[tokio::test]
async fn test_document_ids_are_percent_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/dbs/shop/colls/items/docs/a%20b"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client(&server).delete(&key("a b")).await.unwrap();
    assert_eq!(outcome, StoreOutcome::empty(204));
}

#[tokio::test]
async fn test_status_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dbs/shop/colls/items/docs/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"code": "NotFound", "message": "gone"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dbs/shop/colls/items/docs/busy"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(json!({"code": "TooManyRequests", "message": "slow down"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/dbs/shop/colls/items/docs"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(client.read(&key("missing")).await.unwrap(), StoreOutcome::NotFound);
    assert_eq!(
        client.read(&key("busy")).await.unwrap(),
        StoreOutcome::Failed {
            status: 429,
            message: "slow down".to_string()
        }
    );
    let created = client
        .create(&key("1"), &doc(json!({"id": "1", "pk": "a"})))
        .await
        .unwrap();
    assert_eq!(created, StoreOutcome::Conflict);
}

#[tokio::test]
async fn test_rejected_credentials_are_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "bad signature"})))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.read(&key("1")).await.unwrap_err();
    assert!(matches!(err, StoreError::Authentication(ref m) if m == "bad signature"));

    let err = client.partition_key_paths("shop", "items").await.unwrap_err();
    assert!(matches!(err, StoreError::Authentication(_)));
}

#[tokio::test]
async fn test_upsert_posts_document_with_upsert_header() {
    let server = MockServer::start().await;
    let body = json!({"id": "1", "pk": "a", "v": 2});
    Mock::given(method("POST"))
        .and(path("/dbs/shop/colls/items/docs"))
        .and(header("x-ms-documentdb-is-upsert", "True"))
        .and(body_json(&body))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "1", "pk": "a", "v": 2, "_etag": "\"e2\""})))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client(&server).upsert(&key("1"), &doc(body)).await.unwrap();
    assert_eq!(outcome.status(), 201);
}

#[tokio::test]
async fn test_patch_sends_set_operations() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/dbs/shop/colls/items/docs/1"))
        .and(header("content-type", "application/json_patch+json"))
        .and(body_json(json!({
            "operations": [
                {"op": "set", "path": "/pk", "value": "a"},
                {"op": "set", "path": "/v", "value": 3}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1", "pk": "a", "v": 3})))
        .expect(1)
        .mount(&server)
        .await;

    let operations = PatchOperation::set_all(&doc(json!({"id": "1", "pk": "a", "v": 3})));
    let outcome = client(&server).patch(&key("1"), &operations).await.unwrap();
    assert_eq!(outcome.status(), 200);
}

#[tokio::test]
async fn test_partition_key_paths_read_from_container() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dbs/shop/colls/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "items",
            "partitionKey": {"paths": ["/tenant", "/region"], "kind": "MultiHash", "version": 2}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dbs/shop/colls/absent"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "no such container"})))
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(
        client.partition_key_paths("shop", "items").await.unwrap(),
        vec!["/tenant".to_string(), "/region".to_string()]
    );
    let err = client.partition_key_paths("shop", "absent").await.unwrap_err();
    assert!(matches!(err, StoreError::UnexpectedStatus { status: 404, .. }));
}

#[tokio::test]
async fn test_account_address_is_endpoint() {
    let server = MockServer::start().await;
    let address = client(&server).account_address().await.unwrap();
    assert_eq!(address, format!("{}/", server.uri()));
}

#[tokio::test]
async fn test_undecodable_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server).read(&key("1")).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidResponse(_)));
}

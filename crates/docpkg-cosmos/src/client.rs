//! REST client implementing [`DocumentStore`]

use crate::auth::{http_date, MasterKey};
use crate::config::CosmosConfig;
use crate::error::CosmosError;
use async_trait::async_trait;
use docpkg_core::{DocumentStore, PatchOperation, StoreError, StoreOutcome};
use docpkg_model::{Document, DocumentKey};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::fmt::Write;
use url::Url;

const PARTITION_KEY_HEADER: &str = "x-ms-documentdb-partitionkey";
const UPSERT_HEADER: &str = "x-ms-documentdb-is-upsert";
const PATCH_CONTENT_TYPE: &str = "application/json_patch+json";

/// Document store over the account REST API
#[derive(Debug, Clone)]
pub struct CosmosClient {
    http: Client,
    config: CosmosConfig,
    key: MasterKey,
}

/// Resource addressed by one request
struct Resource {
    /// `dbs`, `colls` or `docs`
    kind: &'static str,
    /// Unencoded link used for signing
    link: String,
    /// Encoded path relative to the endpoint
    path: String,
}

impl Resource {
    fn collection(database: &str, container: &str) -> Self {
        Self {
            kind: "colls",
            link: format!("dbs/{database}/colls/{container}"),
            path: format!("dbs/{}/colls/{}", encode(database), encode(container)),
        }
    }

    /// `docs` feed of a container, used for create and upsert
    fn documents(database: &str, container: &str) -> Self {
        let collection = Self::collection(database, container);
        Self {
            kind: "docs",
            link: collection.link,
            path: format!("{}/docs", collection.path),
        }
    }

    fn document(key: &DocumentKey) -> Self {
        let collection = Self::collection(key.database(), key.container());
        Self {
            kind: "docs",
            link: format!("{}/docs/{}", collection.link, key.id()),
            path: format!("{}/docs/{}", collection.path, encode(key.id())),
        }
    }
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionBody {
    partition_key: PartitionKeyDefinition,
}

#[derive(Deserialize)]
struct PartitionKeyDefinition {
    paths: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl CosmosClient {
    /// Build a client for an account
    ///
    /// # Errors
    /// Returns error if the key is not base64 or the HTTP client cannot be built
    pub fn new(config: CosmosConfig) -> Result<Self, CosmosError> {
        let key = MasterKey::decode(config.key())?;
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { http, config, key })
    }

    /// Account configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CosmosConfig {
        &self.config
    }

    fn url(&self, path: &str) -> Result<Url, CosmosError> {
        Ok(self.config.endpoint().join(path)?)
    }

    fn request(
        &self,
        method: Method,
        resource: &Resource,
        key: Option<&DocumentKey>,
    ) -> Result<RequestBuilder, CosmosError> {
        let date = http_date(chrono::Utc::now());
        let authorization =
            self.key
                .authorization(method.as_str(), resource.kind, &resource.link, &date);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", header(&authorization)?);
        headers.insert("x-ms-date", header(&date)?);
        headers.insert("x-ms-version", header(self.config.api_version())?);
        if let Some(key) = key {
            headers.insert(PARTITION_KEY_HEADER, header(&partition_key_header(key))?);
        }

        tracing::trace!(method = %method, path = %resource.path, "cosmos request");
        Ok(self
            .http
            .request(method, self.url(&resource.path)?)
            .headers(headers))
    }

    async fn send(&self, request: RequestBuilder) -> Result<StoreOutcome, StoreError> {
        let response = request.send().await.map_err(CosmosError::from)?;
        outcome(response).await
    }
}

fn header(value: &str) -> Result<HeaderValue, CosmosError> {
    Ok(HeaderValue::from_str(value)?)
}

/// Partition key JSON with non-ASCII characters escaped for the header
fn partition_key_header(key: &DocumentKey) -> String {
    let mut out = String::new();
    for c in key.partition_key().to_string().chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{unit:04x}");
            }
        }
    }
    out
}

/// Map a response onto the store contract
async fn outcome(response: Response) -> Result<StoreOutcome, StoreError> {
    let status = response.status();
    let body = response.bytes().await.map_err(CosmosError::from)?;

    match status {
        s if s.is_success() => {
            if body.is_empty() {
                return Ok(StoreOutcome::empty(s.as_u16()));
            }
            let document: Document = serde_json::from_slice(&body).map_err(CosmosError::from)?;
            Ok(StoreOutcome::found(s.as_u16(), document))
        }
        StatusCode::NOT_FOUND => Ok(StoreOutcome::NotFound),
        StatusCode::CONFLICT => Ok(StoreOutcome::Conflict),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(StoreError::Authentication(error_message(&body)))
        }
        s => Ok(StoreOutcome::Failed {
            status: s.as_u16(),
            message: error_message(&body),
        }),
    }
}

fn error_message(body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned())
}

#[async_trait]
impl DocumentStore for CosmosClient {
    async fn account_address(&self) -> Result<String, StoreError> {
        Ok(self.config.endpoint().to_string())
    }

    async fn partition_key_paths(
        &self,
        database: &str,
        container: &str,
    ) -> Result<Vec<String>, StoreError> {
        let resource = Resource::collection(database, container);
        let response = self
            .request(Method::GET, &resource, None)?
            .send()
            .await
            .map_err(CosmosError::from)?;

        let status = response.status();
        let body = response.bytes().await.map_err(CosmosError::from)?;
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(StoreError::Authentication(error_message(&body)));
        }
        if !status.is_success() {
            return Err(StoreError::UnexpectedStatus {
                resource: resource.link,
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        let collection: CollectionBody = serde_json::from_slice(&body).map_err(CosmosError::from)?;
        Ok(collection.partition_key.paths)
    }

    async fn read(&self, key: &DocumentKey) -> Result<StoreOutcome, StoreError> {
        let request = self.request(Method::GET, &Resource::document(key), Some(key))?;
        self.send(request).await
    }

    async fn create(
        &self,
        key: &DocumentKey,
        document: &Document,
    ) -> Result<StoreOutcome, StoreError> {
        let resource = Resource::documents(key.database(), key.container());
        let request = self.request(Method::POST, &resource, Some(key))?.json(document);
        self.send(request).await
    }

    async fn upsert(
        &self,
        key: &DocumentKey,
        document: &Document,
    ) -> Result<StoreOutcome, StoreError> {
        let resource = Resource::documents(key.database(), key.container());
        let request = self
            .request(Method::POST, &resource, Some(key))?
            .header(UPSERT_HEADER, "True")
            .json(document);
        self.send(request).await
    }

    async fn patch(
        &self,
        key: &DocumentKey,
        operations: &[PatchOperation],
    ) -> Result<StoreOutcome, StoreError> {
        let body = serde_json::to_vec(&serde_json::json!({ "operations": operations }))
            .map_err(CosmosError::from)?;
        let request = self
            .request(Method::PATCH, &Resource::document(key), Some(key))?
            .header(CONTENT_TYPE, PATCH_CONTENT_TYPE)
            .body(body);
        self.send(request).await
    }

    async fn delete(&self, key: &DocumentKey) -> Result<StoreOutcome, StoreError> {
        let request = self.request(Method::DELETE, &Resource::document(key), Some(key))?;
        self.send(request).await
    }
}

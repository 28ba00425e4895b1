//! Content-addressed storage
//!
//! Content is addressed by hash and resolved against a storage host as
//! `<host>/ipfs/<hash>`.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::config::StorageConfig;
use crate::error::StorageError;

/// Resolve `hash` against `host`
pub fn content_url(host: &str, hash: &str) -> Result<String, StorageError> {
    if hash.is_empty() || hash.contains(|c| c == '/' || c == '?' || c == '#') {
        return Err(StorageError::InvalidHash(hash.to_string()));
    }
    Ok(format!("{}/ipfs/{}", host.trim_end_matches('/'), hash))
}

/// A source of content-addressed blobs
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Host content is resolved against
    fn host(&self) -> &str;

    /// Public URL of `hash`
    fn url_for(&self, hash: &str) -> Result<String, StorageError> {
        content_url(self.host(), hash)
    }

    /// Fetch the full content of `hash`
    async fn fetch(&self, hash: &str) -> Result<Vec<u8>, StorageError>;

    /// Check that `hash` is retrievable without keeping the body
    async fn probe(&self, hash: &str) -> Result<(), StorageError> {
        self.fetch(hash).await.map(|_| ())
    }
}

/// HTTP gateway store
pub struct HttpStore {
    host: String,
    client: reqwest::Client,
}

impl HttpStore {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| StorageError::Client(e.to_string()))?;

        Ok(Self {
            host: config.host.clone(),
            client,
        })
    }

    fn check_status(url: &str, status: reqwest::StatusCode) -> Result<(), StorageError> {
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(StorageError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for HttpStore {
    fn host(&self) -> &str {
        &self.host
    }

    async fn fetch(&self, hash: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.url_for(hash)?;
        tracing::debug!("Fetching {}", url);

        let request_err = |e: reqwest::Error| StorageError::Request {
            url: url.clone(),
            message: e.to_string(),
        };

        let response = self.client.get(&url).send().await.map_err(request_err)?;
        Self::check_status(&url, response.status())?;

        let bytes = response.bytes().await.map_err(request_err)?;
        Ok(bytes.to_vec())
    }

    async fn probe(&self, hash: &str) -> Result<(), StorageError> {
        let url = self.url_for(hash)?;
        let response = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(|e| StorageError::Request {
                url: url.clone(),
                message: e.to_string(),
            })?;
        Self::check_status(&url, response.status())
    }
}

/// In-memory store, used for tests and for serving a fixed catalog offline
#[derive(Debug, Default)]
pub struct MemoryStore {
    host: String,
    items: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            items: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, hash: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.items.write().insert(hash.into(), data.into());
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    fn host(&self) -> &str {
        &self.host
    }

    async fn fetch(&self, hash: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.url_for(hash)?;
        self.items
            .read()
            .get(hash)
            .cloned()
            .ok_or(StorageError::NotFound(url))
    }
}

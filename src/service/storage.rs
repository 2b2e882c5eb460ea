use crate::config::{BackendConfig, StorageConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("storage upload rejected with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
}

/// Object storage for uploaded images.
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes` at `path` on behalf of the signed-in user and returns its public URL.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str, access_token: &str) -> Result<String, StorageError>;
}

pub struct BucketStorage {
    base_url: String,
    anon_key: String,
    bucket: String,
    http: reqwest::Client,
}

impl BucketStorage {
    pub fn new(backend: &BackendConfig, storage: &StorageConfig, http: reqwest::Client) -> Self {
        Self {
            base_url: format!("{}/storage/v1", backend.url.trim_end_matches('/')),
            anon_key: backend.anon_key.clone(),
            bucket: storage.bucket.clone(),
            http,
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/object/{}/{}", self.base_url, self.bucket, path)
    }

    pub fn public_url(&self, path: &str) -> String {
        format!("{}/object/public/{}/{}", self.base_url, self.bucket, path)
    }
}

#[async_trait::async_trait]
impl ObjectStorage for BucketStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str, access_token: &str) -> Result<String, StorageError> {
        let response = self
            .http
            .post(self.object_url(path))
            .header("apikey", &self.anon_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .bearer_auth(access_token)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected { status, detail });
        }

        Ok(self.public_url(path))
    }
}

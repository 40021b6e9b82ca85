//! Client for the hosted bucket HTTP API.

use super::{ObjectEntry, ObjectStorage, Result, StorageError, paths};
use crate::config::StorageConfig;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

/// Maximum number of entries requested per listing. Existence checks filter by exact file name,
/// so a single page is always enough.
const LIST_LIMIT: u32 = 100;

pub struct SupabaseStorage {
    client: Client,
    base_url: Url,
    bucket: String,
    service_key: String,
    cache_control_secs: u64,
}

impl SupabaseStorage {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        crate::install_crypto_provider();
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.url.clone(),
            bucket: config.bucket.clone(),
            service_key: config.service_key.clone(),
            cache_control_secs: config.cache_control.as_secs(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/storage/v1/{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.service_key).header("apikey", &self.service_key)
    }

    /// Turn a non-success response into a [`StorageError`]
    async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        // A missing bucket comes back as a 400 with a 404 inside the body
        if body.contains("Bucket not found") {
            return Err(StorageError::BucketNotFound {
                bucket: self.bucket.clone(),
            });
        }
        Err(StorageError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn public_url(&self, key: &str) -> String {
        paths::public_url(&self.base_url, &self.bucket, key)
    }

    #[instrument(skip(self, content), fields(size = content.len()), err)]
    async fn upload(&self, key: &str, content: Bytes, content_type: &str, upsert: bool) -> Result<String> {
        let url = self.endpoint(&format!("object/{}/{key}", self.bucket));
        let request = self
            .client
            .post(url)
            .header("content-type", content_type)
            .header("cache-control", format!("max-age={}", self.cache_control_secs))
            .header("x-upsert", upsert.to_string())
            .body(content);
        let response = self.authorize(request).send().await?;
        self.check(response).await?;
        debug!("Uploaded object {}", key);
        Ok(self.public_url(key))
    }

    #[instrument(skip(self), err)]
    async fn list(&self, directory: &str, search: &str) -> Result<Vec<ObjectEntry>> {
        let url = self.endpoint(&format!("object/list/{}", self.bucket));
        let body = json!({
            "prefix": directory,
            "search": search,
            "limit": LIST_LIMIT,
            "offset": 0,
        });
        let response = self.authorize(self.client.post(url).json(&body)).send().await?;
        let response = self.check(response).await?;
        let text = response.text().await?;
        serde_json::from_str::<Vec<ObjectEntry>>(&text).map_err(|e| StorageError::Decode(format!("{e}: {text}")))
    }

    #[instrument(skip(self), err)]
    async fn remove(&self, key: &str) -> Result<()> {
        let url = self.endpoint(&format!("object/{}", self.bucket));
        let body = json!({ "prefixes": [key] });
        let response = self.authorize(self.client.delete(url).json(&body)).send().await?;
        self.check(response).await?;
        Ok(())
    }
}

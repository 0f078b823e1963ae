//! REST client for an Algolia-compatible search service.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::{Client, Method, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use sync_types::{IndexedDocument, ItemId, RemoteSettings};

use crate::client::SearchIndexClient;
use crate::error::RemoteError;

/// Configuration for [`AlgoliaClient`].
#[derive(Debug, Clone)]
pub struct AlgoliaConfig {
    /// Service base URL (e.g., "https://APPID.algolia.net")
    pub base_url: String,

    /// Application id, sent with every request
    pub app_id: String,

    /// Admin (write) API key
    pub api_key: SecretString,

    /// Request timeout
    pub timeout: Duration,

    /// Retries after the first attempt for transient failures
    pub max_retries: u32,

    /// First retry delay; grows exponentially
    pub initial_backoff: Duration,
}

impl AlgoliaConfig {
    pub fn new(app_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        let app_id = app_id.into();
        Self {
            base_url: format!("https://{}.algolia.net", app_id),
            app_id,
            api_key: SecretString::from(api_key.into()),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }

    /// Point the client at another host (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    /// Build from the `[remote]` settings, failing when credentials are missing.
    pub fn from_settings(settings: &RemoteSettings) -> Result<Self, RemoteError> {
        settings.validate()?;
        let app_id = settings.app_id.clone().unwrap_or_default();
        let api_key = settings.api_key_admin.clone().unwrap_or_default();

        let mut config = Self::new(app_id, api_key)
            .with_timeout(Duration::from_secs(settings.timeout_secs))
            .with_max_retries(settings.max_retries);
        if let Some(base_url) = &settings.base_url {
            config = config.with_base_url(base_url.clone());
        }
        Ok(config)
    }
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    requests: Vec<BatchOperation<'a>>,
}

#[derive(Serialize)]
struct BatchOperation<'a> {
    action: &'static str,
    body: BatchBody<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum BatchBody<'a> {
    Document(&'a IndexedDocument),
    Id {
        #[serde(rename = "objectID")]
        object_id: String,
    },
}

/// Search index client speaking the Algolia REST API.
pub struct AlgoliaClient {
    client: Client,
    config: AlgoliaConfig,
}

impl AlgoliaClient {
    pub fn new(config: AlgoliaConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn index_url(&self, index_name: &str, action: &str) -> Result<Url, RemoteError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| RemoteError::Config(format!("Invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::Config(format!("Invalid base URL: {}", self.config.base_url)))?
            .pop_if_empty()
            .extend(["1", "indexes", index_name, action]);
        Ok(url)
    }

    /// Send a request, retrying transient failures with exponential backoff.
    async fn call_api<B: Serialize + Sync>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<Value, RemoteError> {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.config.initial_backoff,
            current_interval: self.config.initial_backoff,
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };

        let mut retries = 0;

        loop {
            debug!(attempt = retries + 1, %url, "Calling search index API");

            match self.make_request(method.clone(), url.clone(), body).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_transient() => {
                    error!(error = %e, %url, "Search index API rejected request");
                    return Err(e);
                }
                Err(e) => {
                    if retries >= self.config.max_retries {
                        error!(error = %e, "Max retries exceeded");
                        return Err(e);
                    }
                    retries += 1;

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "API call failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => {
                            error!(error = %e, "Backoff exhausted");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Make a single API request.
    async fn make_request<B: Serialize + Sync>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<Value, RemoteError> {
        let response = self
            .client
            .request(method, url)
            .header("X-Algolia-Application-Id", &self.config.app_id)
            .header("X-Algolia-API-Key", self.config.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if response.status() == 429 {
            return Err(RemoteError::RateLimitExceeded);
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))
    }

    async fn batch(
        &self,
        index_name: &str,
        requests: Vec<BatchOperation<'_>>,
    ) -> Result<(), RemoteError> {
        let count = requests.len();
        let url = self.index_url(index_name, "batch")?;
        let response = self
            .call_api(Method::POST, url, &BatchRequest { requests })
            .await?;
        debug!(
            index = %index_name,
            count,
            task_id = ?response.get("taskID"),
            "Batch accepted"
        );
        Ok(())
    }
}

#[async_trait]
impl SearchIndexClient for AlgoliaClient {
    async fn upsert_documents(
        &self,
        index_name: &str,
        documents: &[IndexedDocument],
    ) -> Result<(), RemoteError> {
        let requests = documents
            .iter()
            .map(|doc| BatchOperation {
                action: "updateObject",
                body: BatchBody::Document(doc),
            })
            .collect();
        self.batch(index_name, requests).await
    }

    async fn delete_documents(&self, index_name: &str, ids: &[ItemId]) -> Result<(), RemoteError> {
        let requests = ids
            .iter()
            .map(|id| BatchOperation {
                action: "deleteObject",
                body: BatchBody::Id {
                    object_id: id.to_string(),
                },
            })
            .collect();
        self.batch(index_name, requests).await
    }

    async fn set_index_settings(
        &self,
        index_name: &str,
        settings: &Map<String, Value>,
    ) -> Result<(), RemoteError> {
        let url = self.index_url(index_name, "settings")?;
        self.call_api(Method::PUT, url, settings).await?;
        debug!(index = %index_name, "Settings updated");
        Ok(())
    }
}

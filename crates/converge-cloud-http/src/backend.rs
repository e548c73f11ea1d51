//! REST implementation of the accessor and mutator contracts

use crate::endpoint::Endpoint;
use crate::error::{HttpError, Result};
use async_trait::async_trait;
use converge_cloud::{Accessor, Mutator, ResourceKind, StatusSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Connection settings for [`HttpBackend`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// API base URL (e.g. "https://api.example.com")
    pub base_url: String,

    /// Bearer token
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    /// Transport-level timeout for a single request, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Endpoint overrides per kind
    #[serde(default)]
    pub endpoints: HashMap<ResourceKind, Endpoint>,
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            endpoints: HashMap::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Endpoint for a kind, falling back to the built-in one
    pub fn endpoint(&self, kind: ResourceKind) -> Endpoint {
        self.endpoints
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Endpoint::for_kind(kind))
    }
}

/// REST backend
///
/// The underlying client is shared by every concurrent wait; it holds no
/// per-call state.
pub struct HttpBackend {
    client: reqwest::Client,
    config: HttpConfig,
}

impl HttpBackend {
    pub fn new(config: HttpConfig) -> Result<Self> {
        if !(config.base_url.starts_with("http://") || config.base_url.starts_with("https://")) {
            return Err(HttpError::InvalidConfig(format!(
                "base_url must be an http(s) URL: {}",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("converge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request; non-2xx responses become [`HttpError::Status`]
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Option<Value>> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    async fn fetch(&self, kind: ResourceKind, id: &str) -> Result<StatusSnapshot> {
        let endpoint = self.config.endpoint(kind);
        let url = endpoint.item_url(&self.config.base_url, id);
        tracing::debug!(%url, "GET");

        let body = self
            .send(self.client.get(&url))
            .await?
            .ok_or_else(|| HttpError::MissingField(endpoint.resource_pointer.clone()))?;
        let (resource, status, message) = endpoint.status_of(&body)?;

        let mut snapshot = StatusSnapshot::new(status).with_attributes(resource.clone());
        snapshot.message = message;
        Ok(snapshot)
    }

    async fn post(&self, kind: ResourceKind, payload: &Value) -> Result<String> {
        let endpoint = self.config.endpoint(kind);
        let url = endpoint.collection_url(&self.config.base_url);
        tracing::debug!(%url, "POST");

        let body = self
            .send(self.client.post(&url).json(payload))
            .await?
            .ok_or_else(|| HttpError::MissingField(endpoint.id_pointer.clone()))?;
        endpoint.id_of(&body)
    }

    async fn patch(&self, kind: ResourceKind, id: &str, payload: &Value) -> Result<()> {
        let url = self.config.endpoint(kind).item_url(&self.config.base_url, id);
        tracing::debug!(%url, "PATCH");
        self.send(self.client.patch(&url).json(payload)).await?;
        Ok(())
    }

    async fn remove(&self, kind: ResourceKind, id: &str) -> Result<()> {
        let url = self.config.endpoint(kind).item_url(&self.config.base_url, id);
        tracing::debug!(%url, "DELETE");
        self.send(self.client.delete(&url)).await?;
        Ok(())
    }
}

#[async_trait]
impl Accessor for HttpBackend {
    async fn get_by_id(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> converge_cloud::Result<StatusSnapshot> {
        Ok(self.fetch(kind, id).await?)
    }
}

#[async_trait]
impl Mutator for HttpBackend {
    async fn create(&self, kind: ResourceKind, payload: &Value) -> converge_cloud::Result<String> {
        Ok(self.post(kind, payload).await?)
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        payload: &Value,
    ) -> converge_cloud::Result<()> {
        Ok(self.patch(kind, id, payload).await?)
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> converge_cloud::Result<()> {
        Ok(self.remove(kind, id).await?)
    }
}

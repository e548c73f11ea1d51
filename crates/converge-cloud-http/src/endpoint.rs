//! Per-kind REST endpoints
//!
//! Where each kind lives under the API base URL and where its status, message
//! and identifier sit inside a response body (RFC 6901 JSON pointers).

use converge_cloud::ResourceKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HttpError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Collection path relative to the base URL (e.g. "api/v1/vpcs")
    pub collection: String,

    /// Pointer to the resource object inside a response ("" = whole body)
    #[serde(default)]
    pub resource_pointer: String,

    /// Pointer to the status, relative to the resource object
    #[serde(default = "default_status_pointer")]
    pub status_pointer: String,

    /// Pointer to a diagnostic message, relative to the resource object
    #[serde(default)]
    pub message_pointer: Option<String>,

    /// Pointer to the identifier in a create response, relative to the resource object
    #[serde(default = "default_id_pointer")]
    pub id_pointer: String,
}

fn default_status_pointer() -> String {
    "/status".to_string()
}

fn default_id_pointer() -> String {
    "/id".to_string()
}

impl Endpoint {
    pub fn new(collection: impl Into<String>, resource_pointer: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            resource_pointer: resource_pointer.into(),
            status_pointer: default_status_pointer(),
            message_pointer: None,
            id_pointer: default_id_pointer(),
        }
    }

    pub fn with_message_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.message_pointer = Some(pointer.into());
        self
    }

    /// Built-in endpoint for a kind
    pub fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::DatabaseCluster => {
                Endpoint::new("api/v1/databases", "/db").with_message_pointer("/status_message")
            }
            ResourceKind::DatabaseReplica => Endpoint::new("api/v1/databases/replicas", "/replica"),
            ResourceKind::KubernetesCluster => Endpoint::new("api/v1/k8s/clusters", "/cluster")
                .with_message_pointer("/status_message"),
            ResourceKind::NodePool => Endpoint::new("api/v1/k8s/node-groups", "/node_group"),
            ResourceKind::Route => Endpoint::new("api/v1/vpcs/routes", "/route"),
            ResourceKind::Vpc => Endpoint::new("api/v1/vpcs", "/vpc"),
        }
    }

    pub fn collection_url(&self, base_url: &str) -> String {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            self.collection.trim_matches('/')
        )
    }

    pub fn item_url(&self, base_url: &str, id: &str) -> String {
        format!("{}/{}", self.collection_url(base_url), id)
    }

    fn resource<'a>(&self, body: &'a Value) -> Result<&'a Value> {
        body.pointer(&self.resource_pointer)
            .ok_or_else(|| HttpError::MissingField(self.resource_pointer.clone()))
    }

    /// Extract (resource, status, message) from a response body
    pub fn status_of<'a>(&self, body: &'a Value) -> Result<(&'a Value, String, Option<String>)> {
        let resource = self.resource(body)?;
        let status = resource
            .pointer(&self.status_pointer)
            .and_then(scalar_to_string)
            .ok_or_else(|| HttpError::MissingField(self.status_pointer.clone()))?;
        let message = self
            .message_pointer
            .as_deref()
            .and_then(|p| resource.pointer(p))
            .and_then(scalar_to_string)
            .filter(|m| !m.is_empty());
        Ok((resource, status, message))
    }

    /// Extract the identifier from a create response
    pub fn id_of(&self, body: &Value) -> Result<String> {
        self.resource(body)?
            .pointer(&self.id_pointer)
            .and_then(scalar_to_string)
            .ok_or_else(|| HttpError::MissingField(self.id_pointer.clone()))
    }
}

/// Strings as-is, numbers in their decimal form; anything else is absent
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

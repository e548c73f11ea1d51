//! Backend collaborator contracts
//!
//! A backend (REST client, SDK wrapper, test double) implements [`Accessor`] for
//! read-only status lookups and [`Mutator`] for the calls that change remote
//! state. Implementations are shared read-only across concurrent waits.

use crate::error::Result;
use crate::kind::ResourceKind;
use crate::status::StatusSnapshot;
use async_trait::async_trait;
use serde_json::Value;

/// Read-only status lookup
#[async_trait]
pub trait Accessor: Send + Sync {
    /// Fetch the current status of an object
    ///
    /// Must return an error for which [`CloudError::is_not_found`] holds when
    /// the object does not exist.
    ///
    /// [`CloudError::is_not_found`]: crate::CloudError::is_not_found
    async fn get_by_id(&self, kind: ResourceKind, id: &str) -> Result<StatusSnapshot>;
}

/// Calls that change remote state
#[async_trait]
pub trait Mutator: Send + Sync {
    /// Resolve cross-references in a create payload (e.g. names to ids)
    ///
    /// Runs before any mutating call; an error here is a validation failure.
    async fn resolve(&self, _kind: ResourceKind, payload: Value) -> Result<Value> {
        Ok(payload)
    }

    /// Create an object and return its identifier
    async fn create(&self, kind: ResourceKind, payload: &Value) -> Result<String>;

    /// Apply a partial update
    async fn update(&self, kind: ResourceKind, id: &str, payload: &Value) -> Result<()>;

    /// Request deletion
    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<()>;
}

/// Anything that can both observe and mutate
pub trait Backend: Accessor + Mutator {}

impl<T: Accessor + Mutator> Backend for T {}

//! Per-kind create/read/update/delete orchestration
//!
//! A [`ResourceController`] issues the mutating call, then hands control to the
//! poll loop until the object converges, fails or the wait times out. Whenever
//! an identifier is known it is recorded in [`GlobalState`] before returning,
//! so a failed operation never loses track of a half-provisioned object.

use crate::changes::{Change, ChangeSet};
use crate::error::{CloudError, Result};
use crate::kind::{KindProfile, PollTiming, ResourceKind, ResourceRef};
use crate::poll::{Failure, PollSpec, ReconcileOutcome, await_converged, await_removal};
use crate::provider::Backend;
use crate::state::{GlobalState, Observation, ResourceStatus};
use crate::status::{Progress, StatusClassifier, StatusSnapshot};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const REMOVED_TARGET: &str = "removed";

/// Result of a converged create/update/wait
#[derive(Debug, Clone)]
pub struct Applied {
    pub resource: ResourceRef,
    pub snapshot: StatusSnapshot,
}

/// Drives one resource kind through its lifecycle
pub struct ResourceController<B> {
    backend: Arc<B>,
    profile: KindProfile,
}

impl<B: Backend> ResourceController<B> {
    pub fn new(backend: Arc<B>, profile: KindProfile) -> Self {
        Self { backend, profile }
    }

    /// Controller with the kind's built-in profile
    pub fn for_kind(backend: Arc<B>, kind: ResourceKind) -> Self {
        Self::new(backend, KindProfile::for_kind(kind))
    }

    pub fn kind(&self) -> ResourceKind {
        self.profile.kind
    }

    pub fn profile(&self) -> &KindProfile {
        &self.profile
    }

    fn resource(&self, id: &str) -> ResourceRef {
        ResourceRef::new(self.kind(), id)
    }

    fn active_spec(&self, timing: &PollTiming) -> Result<PollSpec> {
        PollSpec::until(
            StatusClassifier::new(&self.profile.active_statuses),
            timing,
        )
    }

    fn removal_spec(&self) -> Result<PollSpec> {
        PollSpec::until(
            StatusClassifier::new(&self.profile.removed_statuses),
            &self.profile.delete,
        )
    }

    /// Create an object and wait until it is active
    #[tracing::instrument(name = "create", skip_all, fields(kind = %self.kind()))]
    pub async fn create(
        &self,
        payload: Value,
        state: &mut GlobalState,
        cancel: &CancellationToken,
    ) -> Result<Applied> {
        let kind = self.kind();
        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(self.aborted(None, "create")),
            resolved = self.backend.resolve(kind, payload) => resolved,
        };
        let payload = resolved.map_err(|e| CloudError::Validation {
            kind,
            message: e.to_string(),
        })?;
        let spec = self.active_spec(&self.profile.create)?;

        let id = self
            .backend
            .create(kind, &payload)
            .await
            .map_err(|e| self.call_failed(None, e))?;
        let resource = self.resource(&id);
        state.record(&resource, ResourceStatus::Creating, Observation::Unchanged);
        tracing::info!(id = %id, "create issued, waiting for {}", self.profile.active_target());

        let outcome = self.observe_until(&spec, &id, cancel).await;
        let target = self.profile.active_target();
        self.settle(resource, outcome, ResourceStatus::Creating, &target, state)
    }

    /// Single observation, no polling
    ///
    /// Returns `None` and forgets the resource when the backend no longer knows
    /// it.
    pub async fn read(&self, id: &str, state: &mut GlobalState) -> Result<Option<StatusSnapshot>> {
        let resource = self.resource(id);
        match self.backend.get_by_id(self.kind(), id).await {
            Ok(snapshot) => {
                let previous = state.get(&resource).map(|r| r.status);
                let status = self.status_for_read(&snapshot, previous);
                state.record(&resource, status, Observation::Snapshot(&snapshot));
                Ok(Some(snapshot))
            }
            Err(e) if e.is_not_found() => {
                tracing::info!(kind = %self.kind(), id, "resource no longer exists");
                state.remove(&resource);
                Ok(None)
            }
            Err(e) => Err(self.call_failed(Some(id), e)),
        }
    }

    /// Apply the difference between `prior` and `planned`
    ///
    /// Each update group is sent as its own call followed by its own wait; the
    /// first failure aborts the remaining groups. Returns `None` when there is
    /// nothing to change.
    #[tracing::instrument(name = "update", skip_all, fields(kind = %self.kind(), id = %id))]
    pub async fn update(
        &self,
        id: &str,
        prior: &Value,
        planned: &Value,
        state: &mut GlobalState,
        cancel: &CancellationToken,
    ) -> Result<Option<Applied>> {
        let changes = ChangeSet::between(prior, planned, &self.profile.update_groups);
        if changes.is_empty() {
            tracing::info!("no changes to apply");
            return Ok(None);
        }

        tracing::info!("applying {}", changes);
        let mut applied = None;
        for change in changes.iter() {
            applied = Some(self.apply_change(id, change, state, cancel).await?);
        }
        Ok(applied)
    }

    async fn apply_change(
        &self,
        id: &str,
        change: &Change,
        state: &mut GlobalState,
        cancel: &CancellationToken,
    ) -> Result<Applied> {
        let resource = self.resource(id);
        let spec = self.active_spec(&self.profile.update)?;
        if cancel.is_cancelled() {
            return Err(self.aborted(Some(id), "update"));
        }

        state.record(&resource, ResourceStatus::Updating, Observation::Unchanged);
        if let Err(e) = self.backend.update(self.kind(), id, &change.payload).await {
            let message = e.to_string();
            state.record(
                &resource,
                ResourceStatus::Error,
                Observation::Status {
                    status: None,
                    message: Some(&message),
                },
            );
            return Err(self.call_failed(Some(id), e));
        }
        tracing::info!(group = %change.group, "update issued");

        let outcome = self.observe_until(&spec, id, cancel).await;
        let target = self.profile.active_target();
        self.settle(resource, outcome, ResourceStatus::Updating, &target, state)
    }

    /// Delete an object and wait until it is gone
    ///
    /// Already-missing objects succeed immediately; objects already being
    /// deleted are not sent a second delete.
    #[tracing::instrument(name = "delete", skip_all, fields(kind = %self.kind(), id = %id))]
    pub async fn delete(
        &self,
        id: &str,
        state: &mut GlobalState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let resource = self.resource(id);
        let spec = self.removal_spec()?;

        let current = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(self.cancelled(id, REMOVED_TARGET)),
            current = self.backend.get_by_id(self.kind(), id) => current,
        };
        match current {
            Err(e) if e.is_not_found() => {
                tracing::info!("already gone");
                state.remove(&resource);
                return Ok(());
            }
            Err(e) => return Err(self.call_failed(Some(id), e)),
            Ok(snapshot) if spec.evaluate(&snapshot) == Progress::Success => {
                tracing::info!(status = %snapshot.status, "already removed");
                state.remove(&resource);
                return Ok(());
            }
            Ok(snapshot) if self.profile.is_deleting(&snapshot.status) => {
                tracing::info!(status = %snapshot.status, "delete already in progress");
                state.record(&resource, ResourceStatus::Deleting, Observation::Snapshot(&snapshot));
            }
            Ok(snapshot) => {
                if cancel.is_cancelled() {
                    return Err(self.aborted(Some(id), "delete"));
                }
                state.record(&resource, ResourceStatus::Deleting, Observation::Snapshot(&snapshot));
                match self.backend.delete(self.kind(), id).await {
                    Ok(()) => tracing::info!("delete issued"),
                    Err(e) if e.is_not_found() => {
                        tracing::info!("gone before delete was issued");
                        state.remove(&resource);
                        return Ok(());
                    }
                    Err(e) => return Err(self.call_failed(Some(id), e)),
                }
            }
        }

        let outcome =
            await_removal(&spec, cancel, || self.backend.get_by_id(self.kind(), id)).await;
        match outcome {
            ReconcileOutcome::NotFound | ReconcileOutcome::Converged(_) => {
                state.remove(&resource);
                Ok(())
            }
            other => self
                .settle(resource, other, ResourceStatus::Deleting, REMOVED_TARGET, state)
                .map(|_| ()),
        }
    }

    /// Wait for an existing object to become active without mutating it
    #[tracing::instrument(name = "wait", skip_all, fields(kind = %self.kind(), id = %id))]
    pub async fn wait_active(
        &self,
        id: &str,
        state: &mut GlobalState,
        cancel: &CancellationToken,
    ) -> Result<Applied> {
        let spec = self.active_spec(&self.profile.create)?;
        let outcome = self.observe_until(&spec, id, cancel).await;
        let pending = state
            .get(&self.resource(id))
            .map(|r| r.status)
            .unwrap_or(ResourceStatus::Unknown);
        let target = self.profile.active_target();
        self.settle(self.resource(id), outcome, pending, &target, state)
    }

    async fn observe_until(
        &self,
        spec: &PollSpec,
        id: &str,
        cancel: &CancellationToken,
    ) -> ReconcileOutcome {
        await_converged(spec, cancel, || self.backend.get_by_id(self.kind(), id)).await
    }

    /// Record the outcome of a wait and turn it into a result
    fn settle(
        &self,
        resource: ResourceRef,
        outcome: ReconcileOutcome,
        pending: ResourceStatus,
        target: &str,
        state: &mut GlobalState,
    ) -> Result<Applied> {
        match outcome {
            ReconcileOutcome::Converged(snapshot) => {
                state.record(&resource, ResourceStatus::Active, Observation::Snapshot(&snapshot));
                Ok(Applied { resource, snapshot })
            }
            ReconcileOutcome::Failed(Failure::Status { status, message }) => {
                state.record(
                    &resource,
                    ResourceStatus::Error,
                    Observation::Status {
                        status: Some(&status),
                        message: message.as_deref(),
                    },
                );
                Err(CloudError::Backend {
                    kind: resource.kind,
                    id: Some(resource.id),
                    status: Some(status),
                    message,
                })
            }
            ReconcileOutcome::Failed(Failure::Accessor(e)) => {
                state.record(&resource, pending, Observation::Unchanged);
                Err(self.call_failed(Some(&resource.id), e))
            }
            ReconcileOutcome::Failed(Failure::Cancelled) => {
                state.record(&resource, pending, Observation::Unchanged);
                Err(self.cancelled(&resource.id, target))
            }
            ReconcileOutcome::TimedOut { last_status } => {
                state.record(
                    &resource,
                    pending,
                    Observation::Status {
                        status: last_status.as_deref(),
                        message: None,
                    },
                );
                Err(CloudError::Timeout {
                    kind: resource.kind,
                    id: resource.id,
                    target: target.to_string(),
                    last_status,
                })
            }
            ReconcileOutcome::NotFound => {
                state.remove(&resource);
                Err(CloudError::ResourceNotFound(resource.key()))
            }
        }
    }

    fn status_for_read(
        &self,
        snapshot: &StatusSnapshot,
        previous: Option<ResourceStatus>,
    ) -> ResourceStatus {
        match StatusClassifier::new(&self.profile.active_statuses).classify(&snapshot.status) {
            Progress::Success => ResourceStatus::Active,
            Progress::Error(_) => ResourceStatus::Error,
            Progress::Transient if self.profile.is_deleting(&snapshot.status) => {
                ResourceStatus::Deleting
            }
            Progress::Transient => previous.unwrap_or(ResourceStatus::Unknown),
        }
    }

    /// A mutating call or accessor failed outright
    fn call_failed(&self, id: Option<&str>, error: CloudError) -> CloudError {
        match error {
            e @ (CloudError::Validation { .. }
            | CloudError::Backend { .. }
            | CloudError::Timeout { .. }
            | CloudError::Cancelled { .. }
            | CloudError::Aborted { .. }) => e,
            e => CloudError::Backend {
                kind: self.kind(),
                id: id.map(str::to_string),
                status: None,
                message: Some(e.to_string()),
            },
        }
    }

    /// Cancelled before the mutating call went out
    fn aborted(&self, id: Option<&str>, operation: &'static str) -> CloudError {
        CloudError::Aborted {
            kind: self.kind(),
            id: id.map(str::to_string),
            operation,
        }
    }

    fn cancelled(&self, id: &str, target: &str) -> CloudError {
        CloudError::Cancelled {
            kind: self.kind(),
            id: id.to_string(),
            target: target.to_string(),
        }
    }
}

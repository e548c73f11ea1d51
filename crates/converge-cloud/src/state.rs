//! Local state for reconciled resources
//!
//! Manages the `.converge/state.json` file which remembers every identifier the
//! controllers have learned, including those of half-created objects, so a
//! later read or delete can find them again.

use crate::error::{CloudError, Result};
use crate::kind::{ResourceKind, ResourceRef};
use crate::status::StatusSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".converge";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";
const STALE_LOCK_HOURS: i64 = 1;

/// All known resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Resources indexed by kind:id
    pub resources: BTreeMap<String, ResourceState>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resources of one kind
    pub fn by_kind(&self, kind: ResourceKind) -> Vec<&ResourceState> {
        self.resources.values().filter(|r| r.kind == kind).collect()
    }

    pub fn get(&self, resource: &ResourceRef) -> Option<&ResourceState> {
        self.resources.get(&resource.key())
    }

    /// Record what is known about a resource, creating the entry if needed
    pub fn record(
        &mut self,
        resource: &ResourceRef,
        status: ResourceStatus,
        observed: Observation<'_>,
    ) -> &ResourceState {
        let now = Utc::now();
        let entry = self
            .resources
            .entry(resource.key())
            .or_insert_with(|| ResourceState::new(resource));

        entry.status = status;
        entry.updated_at = now;
        match observed {
            Observation::Snapshot(snapshot) => {
                entry.last_status = Some(snapshot.status.clone());
                entry.message = snapshot.message.clone();
                if !snapshot.attributes.is_null() {
                    entry.attributes = snapshot.attributes.clone();
                }
            }
            Observation::Status { status, message } => {
                if status.is_some() {
                    entry.last_status = status.map(str::to_string);
                }
                entry.message = message.map(str::to_string);
            }
            Observation::Unchanged => {}
        }
        self.updated_at = now;
        entry
    }

    /// Remove a resource
    pub fn remove(&mut self, resource: &ResourceRef) -> Option<ResourceState> {
        let result = self.resources.remove(&resource.key());
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }
}

/// What was observed alongside a state transition
#[derive(Debug, Clone, Copy)]
pub enum Observation<'a> {
    /// A full accessor response
    Snapshot(&'a StatusSnapshot),
    /// Only a status and/or message (e.g. from a failed wait)
    Status {
        status: Option<&'a str>,
        message: Option<&'a str>,
    },
    /// Keep the previous observation
    Unchanged,
}

/// State of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Backend identifier
    pub id: String,

    pub kind: ResourceKind,

    /// Lifecycle status as seen by the controller
    pub status: ResourceStatus,

    /// Last raw status reported by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<String>,

    /// Last diagnostic message reported by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last full resource body
    #[serde(default)]
    pub attributes: serde_json::Value,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(resource: &ResourceRef) -> Self {
        let now = Utc::now();
        Self {
            id: resource.id.clone(),
            kind: resource.kind,
            status: ResourceStatus::Unknown,
            last_status: None,
            message: None,
            attributes: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef::new(self.kind, self.id.clone())
    }
}

/// Lifecycle status of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Create issued, not yet converged
    Creating,
    /// Converged to an active status
    Active,
    /// Update issued, not yet converged
    Updating,
    /// Delete issued, not yet removed
    Deleting,
    /// Backend reported an error
    Error,
    /// Status is unknown
    Unknown,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Creating => write!(f, "creating"),
            ResourceStatus::Active => write!(f, "active"),
            ResourceStatus::Updating => write!(f, "updating"),
            ResourceStatus::Deleting => write!(f, "deleting"),
            ResourceStatus::Error => write!(f, "error"),
            ResourceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Reads and writes the state file
pub struct StateManager {
    root: PathBuf,
}

impl StateManager {
    /// `root` is the directory that contains `.converge/`
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !fs::try_exists(&dir).await? {
            fs::create_dir_all(&dir).await?;
            tracing::debug!(dir = %dir.display(), "created state directory");
        }
        Ok(())
    }

    /// Load the current state; a missing file is an empty state
    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.state_path();
        if !fs::try_exists(&path).await? {
            tracing::debug!("state file not found, starting empty");
            return Ok(GlobalState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: GlobalState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "state file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!(resources = state.resources.len(), "loaded state");
        Ok(state)
    }

    /// Save the state, keeping the previous file as a backup
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        if fs::try_exists(&path).await? {
            fs::rename(&path, self.backup_path()).await?;
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!(resources = state.resources.len(), "saved state");
        Ok(())
    }

    /// Acquire the state lock; a lock older than an hour is taken over
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();
        if fs::try_exists(&lock_path).await? {
            let content = fs::read_to_string(&lock_path).await?;
            let info: LockInfo = serde_json::from_str(&content)?;

            let age = Utc::now().signed_duration_since(info.acquired_at);
            if age.num_hours() < STALE_LOCK_HOURS {
                return Err(CloudError::LockError(format!(
                    "state is locked by {} (pid {}) since {}",
                    info.holder, info.pid, info.acquired_at
                )));
            }

            tracing::warn!(holder = %info.holder, "removing stale state lock");
        }

        let info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        fs::write(&lock_path, serde_json::to_string_pretty(&info)?).await?;

        tracing::debug!("acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for the state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if fs::try_exists(&self.lock_path).await? {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

//! Resource kinds and their reconciliation profiles
//!
//! Each kind carries the statuses that mean "active", "deleting" and "removed"
//! on the backend, how its updates are split into independent calls, and the
//! timing used for each wait. These defaults are plain values: callers may
//! override any of them before building a controller.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Kind of cloud object managed by a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    DatabaseCluster,
    DatabaseReplica,
    KubernetesCluster,
    NodePool,
    Route,
    Vpc,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::DatabaseCluster,
        ResourceKind::DatabaseReplica,
        ResourceKind::KubernetesCluster,
        ResourceKind::NodePool,
        ResourceKind::Route,
        ResourceKind::Vpc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::DatabaseCluster => "database-cluster",
            ResourceKind::DatabaseReplica => "database-replica",
            ResourceKind::KubernetesCluster => "kubernetes-cluster",
            ResourceKind::NodePool => "node-pool",
            ResourceKind::Route => "route",
            ResourceKind::Vpc => "vpc",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| CloudError::InvalidConfig(format!("unknown resource kind: {}", s)))
    }
}

/// Identifier of a created backend object
///
/// Only exists once a create call has returned an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// State key (kind:id)
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind, self.id)
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Timing for one kind of wait
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollTiming {
    /// Delay between observations (milliseconds in config files)
    #[serde(rename = "interval_ms", with = "millis")]
    pub interval: Duration,

    /// Deadline for the whole wait (milliseconds in config files)
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,

    /// Share of the remaining budget a single accessor call may use
    #[serde(default = "default_call_budget")]
    pub call_budget: f64,
}

fn default_call_budget() -> f64 {
    0.5
}

impl PollTiming {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            call_budget: default_call_budget(),
        }
    }

    pub fn with_call_budget(mut self, call_budget: f64) -> Self {
        self.call_budget = call_budget;
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Fields of an update that must be sent as one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateGroup {
    pub name: String,
    pub fields: Vec<String>,
}

impl UpdateGroup {
    pub fn new(name: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            name: name.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Per-kind reconciliation profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindProfile {
    pub kind: ResourceKind,

    /// Statuses accepted as "active"
    pub active_statuses: Vec<String>,

    /// Statuses meaning a delete is already in progress
    pub deleting_statuses: Vec<String>,

    /// Statuses meaning the object is gone while still being listed
    pub removed_statuses: Vec<String>,

    /// Ordered update groups; fields outside every group are sent last
    pub update_groups: Vec<UpdateGroup>,

    pub create: PollTiming,
    pub update: PollTiming,
    pub delete: PollTiming,
}

impl KindProfile {
    /// Built-in defaults for a kind
    pub fn for_kind(kind: ResourceKind) -> Self {
        let (interval, timeout) = match kind {
            ResourceKind::DatabaseCluster | ResourceKind::KubernetesCluster => {
                (Duration::from_secs(10), Duration::from_secs(30 * 60))
            }
            ResourceKind::DatabaseReplica | ResourceKind::NodePool => {
                (Duration::from_secs(10), Duration::from_secs(20 * 60))
            }
            ResourceKind::Route | ResourceKind::Vpc => {
                (Duration::from_secs(5), Duration::from_secs(10 * 60))
            }
        };
        let timing = PollTiming::new(interval, timeout);

        let active: &[&str] = match kind {
            ResourceKind::KubernetesCluster => &["provisioned", "active"],
            ResourceKind::NodePool => &["active", "running"],
            _ => &["active"],
        };

        let update_groups = match kind {
            ResourceKind::DatabaseCluster => vec![
                UpdateGroup::new("resize", &["preset_id", "disk_size"]),
                UpdateGroup::new("parameters", &["config_parameters"]),
            ],
            ResourceKind::KubernetesCluster => {
                vec![UpdateGroup::new("version", &["k8s_version"])]
            }
            ResourceKind::NodePool => vec![
                UpdateGroup::new("resize", &["node_count"]),
                UpdateGroup::new("autoscaling", &["min_size", "max_size", "autoscale"]),
            ],
            _ => Vec::new(),
        };

        Self {
            kind,
            active_statuses: to_strings(active),
            deleting_statuses: to_strings(&["deleting", "removing"]),
            removed_statuses: to_strings(&["deleted", "removed"]),
            update_groups,
            create: timing,
            update: timing,
            delete: timing,
        }
    }

    /// Human-readable target for error messages (e.g. "active|running")
    pub fn active_target(&self) -> String {
        self.active_statuses.join("|")
    }

    pub fn is_deleting(&self, status: &str) -> bool {
        contains_ignore_case(&self.deleting_statuses, status)
    }

    pub fn with_timing(mut self, timing: PollTiming) -> Self {
        self.create = timing;
        self.update = timing;
        self.delete = timing;
        self
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn contains_ignore_case(values: &[String], status: &str) -> bool {
    let status = status.to_lowercase();
    values.iter().any(|v| v.to_lowercase() == status)
}

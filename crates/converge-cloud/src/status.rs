//! Status classification
//!
//! Backends report progress as free-form strings ("creating", "ERROR_DELETING",
//! "active"). Everything that decides whether to keep polling goes through
//! [`StatusClassifier::classify`], so string matching lives in one place.

use serde::{Deserialize, Serialize};

/// Progress of a resource toward a target status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// In progress, keep observing
    Transient,
    /// Reached one of the target statuses
    Success,
    /// Backend reported an error status
    Error(String),
}

impl Progress {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Progress::Transient)
    }
}

/// Maps raw status strings onto [`Progress`]
///
/// A status containing `error` (any case) is an error even when it also equals
/// one of the targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusClassifier {
    targets: Vec<String>,
}

const ERROR_MARKER: &str = "error";

impl StatusClassifier {
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            targets: targets
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn classify(&self, raw: &str) -> Progress {
        let status = raw.to_lowercase();
        if status.contains(ERROR_MARKER) {
            return Progress::Error(raw.to_string());
        }
        if self.targets.iter().any(|t| *t == status) {
            return Progress::Success;
        }
        Progress::Transient
    }
}

/// The part of a backend response needed to judge progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Raw status reported by the backend
    pub status: String,

    /// Optional diagnostic message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Full resource body as returned by the backend
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl StatusSnapshot {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            message: None,
            attributes: serde_json::Value::Null,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_attributes(mut self, attributes: serde_json::Value) -> Self {
        self.attributes = attributes;
        self
    }
}

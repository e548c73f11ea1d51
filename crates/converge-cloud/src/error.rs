//! Cloud reconciliation error types

use crate::kind::ResourceKind;
use thiserror::Error;

/// Cloud reconciliation errors
///
/// Accessor-level failures (`ResourceNotFound`, `Http`, `ApiError`) come from the
/// backend collaborator. Operation-level failures (`Validation`, `Backend`,
/// `Timeout`, `Cancelled`) are produced by the resource controller and always
/// name the resource kind and, when known, its identifier.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Validation failed for {kind}: {message}")]
    Validation { kind: ResourceKind, message: String },

    #[error("{kind} {}: backend reported status {}{}", display_id(.id), display_status(.status), display_message(.message))]
    Backend {
        kind: ResourceKind,
        id: Option<String>,
        status: Option<String>,
        message: Option<String>,
    },

    #[error("timed out waiting for {kind} {id} to reach {target} (last status: {})", display_status(.last_status))]
    Timeout {
        kind: ResourceKind,
        id: String,
        target: String,
        last_status: Option<String>,
    },

    #[error("cancelled while waiting for {kind} {id} to reach {target}")]
    Cancelled {
        kind: ResourceKind,
        id: String,
        target: String,
    },

    #[error("{operation} of {kind} {} cancelled before it was issued", display_id(id))]
    Aborted {
        kind: ResourceKind,
        id: Option<String>,
        operation: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Whether this error carries the backend's "object does not exist" signal
    pub fn is_not_found(&self) -> bool {
        match self {
            CloudError::ResourceNotFound(_) => true,
            CloudError::Http { status, message } => {
                *status == 404 || message.to_lowercase().contains("not found")
            }
            CloudError::ApiError(message) => message.to_lowercase().contains("not found"),
            _ => false,
        }
    }

    /// Whether the caller cancelled the operation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CloudError::Cancelled { .. } | CloudError::Aborted { .. })
    }

    /// Whether the wait deadline elapsed before convergence
    pub fn is_timeout(&self) -> bool {
        matches!(self, CloudError::Timeout { .. })
    }
}

fn display_id(id: &Option<String>) -> &str {
    id.as_deref().unwrap_or("<unknown id>")
}

fn display_status(status: &Option<String>) -> &str {
    status.as_deref().unwrap_or("<none>")
}

fn display_message(message: &Option<String>) -> String {
    match message {
        Some(m) if !m.is_empty() => format!(" ({})", m),
        _ => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

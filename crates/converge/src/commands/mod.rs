pub mod create;
pub mod delete;
pub mod read;
pub mod state;
pub mod update;
pub mod wait;

use crate::config::Config;
use crate::session::Session;
use anyhow::Context as _;
use colored::Colorize;
use converge_cloud::{KindProfile, ResourceController, ResourceKind, StatusSnapshot};
use converge_cloud_http::HttpBackend;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a reconciling command needs
pub struct Context {
    config: Config,
    backend: Arc<HttpBackend>,
    state_dir: PathBuf,
    pub cancel: CancellationToken,
}

impl Context {
    pub fn new(
        config: &Config,
        state_dir: &Path,
        cancel: CancellationToken,
    ) -> anyhow::Result<Self> {
        let backend = HttpBackend::new(config.http_config()?)?;
        tracing::debug!(base_url = %backend.config().base_url, "using HTTP backend");
        Ok(Self {
            config: config.clone(),
            backend: Arc::new(backend),
            state_dir: state_dir.to_path_buf(),
            cancel,
        })
    }

    pub fn profile(&self, kind: ResourceKind) -> KindProfile {
        self.config.profile(kind)
    }

    pub fn controller(&self, kind: ResourceKind) -> ResourceController<HttpBackend> {
        self.controller_with(self.profile(kind))
    }

    pub fn controller_with(&self, profile: KindProfile) -> ResourceController<HttpBackend> {
        ResourceController::new(self.backend.clone(), profile)
    }

    pub async fn session(&self) -> anyhow::Result<Session> {
        Session::open(&self.state_dir).await
    }
}

/// Read a JSON document from a file, or from stdin when the path is "-"
pub fn read_payload(path: &Path) -> anyhow::Result<Value> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read payload from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

pub fn print_snapshot(snapshot: &StatusSnapshot) {
    println!("  status: {}", colorize_status(&snapshot.status));
    if let Some(message) = &snapshot.message {
        println!("  message: {}", message);
    }
}

pub fn colorize_status(status: &str) -> colored::ColoredString {
    let lower = status.to_lowercase();
    if lower.contains("error") || lower.contains("fail") {
        status.red()
    } else if matches!(lower.as_str(), "active" | "running" | "provisioned" | "ready") {
        status.green()
    } else {
        status.yellow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_payload_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"name": "db", "disk_size": 20}}"#).unwrap();

        let payload = read_payload(file.path()).unwrap();
        assert_eq!(payload["name"], "db");
        assert_eq!(payload["disk_size"], 20);
    }

    #[test]
    fn test_read_payload_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "name: db").unwrap();

        let err = read_payload(file.path()).unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn test_read_payload_missing_file() {
        let err = read_payload(Path::new("/nonexistent/payload.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}

use super::colorize_status;
use colored::Colorize;
use converge_cloud::{ResourceKind, ResourceState, StateManager};
use std::path::Path;

/// List what the state file knows; never contacts the API
pub async fn handle(state_dir: &Path, kind: Option<ResourceKind>) -> anyhow::Result<()> {
    let manager = StateManager::new(state_dir);
    let state = manager.load().await?;

    let resources: Vec<&ResourceState> = match kind {
        Some(kind) => state.by_kind(kind),
        None => state.resources.values().collect(),
    };

    if resources.is_empty() {
        println!("{}", "No resources recorded".yellow());
        return Ok(());
    }

    println!("{}", format!("Resources ({}):", resources.len()).bold());
    for resource in resources {
        let last = resource
            .last_status
            .as_deref()
            .map(|s| format!(" [{}]", colorize_status(s)))
            .unwrap_or_default();
        println!(
            "  • {} {} {}{}",
            resource.kind,
            resource.id.cyan(),
            resource.status,
            last
        );
        if let Some(message) = &resource.message {
            println!("      {}", message.dimmed());
        }
    }
    println!();
    println!("state file: {}", manager.state_path().display());
    Ok(())
}

use super::{Context, print_snapshot};
use colored::Colorize;
use converge_cloud::{KindProfile, ResourceKind};
use std::time::Duration;

/// Wait for a resource without mutating it
///
/// Explicit targets and timing replace the kind's active statuses and create
/// timing for this one wait.
pub async fn handle(
    ctx: &Context,
    kind: ResourceKind,
    id: &str,
    targets: Vec<String>,
    interval: Option<u64>,
    timeout: Option<u64>,
) -> anyhow::Result<()> {
    let profile = wait_profile(ctx.profile(kind), targets, interval, timeout);
    let controller = ctx.controller_with(profile);

    println!(
        "{}",
        format!(
            "Waiting for {} {} to reach {}...",
            kind,
            id,
            controller.profile().active_target()
        )
        .yellow()
    );

    let mut session = ctx.session().await?;
    let result = controller
        .wait_active(id, &mut session.state, &ctx.cancel)
        .await
        .map_err(anyhow::Error::from);
    let applied = session.finish(result).await?;

    println!("{} {} {}", "✓".green(), kind, id.cyan());
    print_snapshot(&applied.snapshot);
    Ok(())
}

fn wait_profile(
    mut profile: KindProfile,
    targets: Vec<String>,
    interval: Option<u64>,
    timeout: Option<u64>,
) -> KindProfile {
    if !targets.is_empty() {
        profile.active_statuses = targets;
    }
    if let Some(secs) = interval {
        profile.create.interval = Duration::from_secs(secs);
    }
    if let Some(secs) = timeout {
        profile.create.timeout = Duration::from_secs(secs);
    }
    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_profile_defaults() {
        let base = KindProfile::for_kind(ResourceKind::NodePool);
        let profile = wait_profile(base.clone(), Vec::new(), None, None);
        assert_eq!(profile, base);
    }

    #[test]
    fn test_wait_profile_overrides() {
        let profile = wait_profile(
            KindProfile::for_kind(ResourceKind::Vpc),
            vec!["ready".to_string(), "online".to_string()],
            Some(2),
            Some(60),
        );
        assert_eq!(profile.active_target(), "ready|online");
        assert_eq!(profile.create.interval, Duration::from_secs(2));
        assert_eq!(profile.create.timeout, Duration::from_secs(60));
        // other waits keep their timing
        assert_eq!(profile.delete.interval, Duration::from_secs(5));
    }
}

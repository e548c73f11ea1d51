use super::{Context, print_snapshot, read_payload};
use colored::Colorize;
use converge_cloud::ResourceKind;
use std::path::Path;

pub async fn handle(ctx: &Context, kind: ResourceKind, file: &Path) -> anyhow::Result<()> {
    let payload = read_payload(file)?;
    let controller = ctx.controller(kind);

    println!(
        "{}",
        format!(
            "Creating {} (waiting for {})...",
            kind,
            controller.profile().active_target()
        )
        .yellow()
    );

    let mut session = ctx.session().await?;
    let result = controller
        .create(payload, &mut session.state, &ctx.cancel)
        .await
        .map_err(anyhow::Error::from);
    let applied = session.finish(result).await?;

    println!("{} {} {}", "✓".green(), kind, applied.resource.id.cyan());
    print_snapshot(&applied.snapshot);
    Ok(())
}

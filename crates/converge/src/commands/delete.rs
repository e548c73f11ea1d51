use super::Context;
use colored::Colorize;
use converge_cloud::ResourceKind;

pub async fn handle(ctx: &Context, kind: ResourceKind, id: &str) -> anyhow::Result<()> {
    let controller = ctx.controller(kind);
    println!("{}", format!("Deleting {} {}...", kind, id).yellow());

    let mut session = ctx.session().await?;
    let result = controller
        .delete(id, &mut session.state, &ctx.cancel)
        .await
        .map_err(anyhow::Error::from);
    session.finish(result).await?;

    println!("{} {} {} deleted", "✓".green(), kind, id.cyan());
    Ok(())
}

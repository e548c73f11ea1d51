use super::{Context, print_snapshot};
use colored::Colorize;
use converge_cloud::ResourceKind;

pub async fn handle(ctx: &Context, kind: ResourceKind, id: &str) -> anyhow::Result<()> {
    let controller = ctx.controller(kind);

    let mut session = ctx.session().await?;
    let result = controller
        .read(id, &mut session.state)
        .await
        .map_err(anyhow::Error::from);
    let snapshot = session.finish(result).await?;

    match snapshot {
        Some(snapshot) => {
            println!("{} {}", kind, id.cyan());
            print_snapshot(&snapshot);
            if !snapshot.attributes.is_null() {
                println!("{}", serde_json::to_string_pretty(&snapshot.attributes)?);
            }
        }
        None => {
            println!("{} {} {}", kind, id.cyan(), "does not exist".yellow());
        }
    }
    Ok(())
}

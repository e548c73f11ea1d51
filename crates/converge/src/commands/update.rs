use super::{Context, print_snapshot, read_payload};
use colored::Colorize;
use converge_cloud::{ResourceKind, ResourceRef};
use std::path::Path;

/// Apply the planned body against the last known one
///
/// The prior body comes from the state file; when the resource was never
/// recorded it is read from the backend first.
pub async fn handle(
    ctx: &Context,
    kind: ResourceKind,
    id: &str,
    file: &Path,
) -> anyhow::Result<()> {
    let planned = read_payload(file)?;
    let controller = ctx.controller(kind);

    let mut session = ctx.session().await?;
    let resource = ResourceRef::new(kind, id);
    let recorded = session
        .state
        .get(&resource)
        .map(|r| r.attributes.clone())
        .filter(|attributes| !attributes.is_null());

    let result = async {
        let prior = match recorded {
            Some(prior) => prior,
            None => match controller.read(id, &mut session.state).await? {
                Some(snapshot) => snapshot.attributes,
                None => anyhow::bail!("{} {} does not exist", kind, id),
            },
        };

        println!("{}", format!("Updating {} {}...", kind, id).yellow());
        Ok::<_, anyhow::Error>(
            controller
                .update(id, &prior, &planned, &mut session.state, &ctx.cancel)
                .await?,
        )
    }
    .await;
    let applied = session.finish(result).await?;

    match applied {
        Some(applied) => {
            println!("{} {} {}", "✓".green(), kind, applied.resource.id.cyan());
            print_snapshot(&applied.snapshot);
        }
        None => println!("{} {} {}: no changes", "✓".green(), kind, id.cyan()),
    }
    Ok(())
}

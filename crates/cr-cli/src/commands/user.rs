use anyhow::bail;
use serde_json::json;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::UserCommands;
use crate::commands::shared::read_password;
use crate::context::AppContext;
use crate::output::output;

/// Handle `crev user`.
pub async fn handle(
    action: &UserCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        UserCommands::Login { username } => {
            let bridge = ctx.directory()?;
            let password = read_password()?;
            match bridge.authenticate(&ctx.service, username, &password).await {
                Ok(Some(user)) => output(&user, flags.format),
                Ok(None) => bail!("invalid username or password"),
                Err(e) if e.is_unavailable() => bail!(cr_directory::LOGIN_UNAVAILABLE_MESSAGE),
                Err(e) => Err(e.into()),
            }
        }
        UserCommands::Reconcile { admin } => {
            let bridge = ctx.directory()?;
            let password = read_password()?;
            match bridge.reconcile(&ctx.service, admin, &password).await {
                Ok(deleted) => output(&json!({ "deleted": deleted }), flags.format),
                Err(e) => {
                    tracing::debug!(error = %e, "reconcile failed");
                    bail!(e.reconcile_message())
                }
            }
        }
        UserCommands::Roster => {
            let actor = ctx.actor().await?;
            output(&ctx.service.roster(&actor.id).await?, flags.format)
        }
        UserCommands::Reviewers { usernames } => {
            let actor = ctx.actor().await?;
            let ids = resolve_ids(ctx, usernames).await?;
            let changed = ctx.service.designate_reviewers(&actor.id, &ids).await?;
            output(&json!({ "reviewers": usernames, "changed": changed }), flags.format)
        }
        UserCommands::Delete { usernames } => {
            let actor = ctx.actor().await?;
            let ids = resolve_ids(ctx, usernames).await?;
            let deleted = ctx.service.delete_users(&actor.id, &ids).await?;
            output(&json!({ "deleted": deleted }), flags.format)
        }
        UserCommands::Setup {
            username,
            student_id,
        } => {
            let user = ctx.user(username).await?;
            let user = ctx.service.complete_setup(&user.id, student_id).await?;
            output(&user, flags.format)
        }
    }
}

async fn resolve_ids(ctx: &AppContext, usernames: &[String]) -> anyhow::Result<Vec<String>> {
    let mut ids = Vec::with_capacity(usernames.len());
    for username in usernames {
        ids.push(ctx.user(username).await?.id);
    }
    Ok(ids)
}

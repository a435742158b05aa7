use crate::cli::GlobalFlags;
use crate::cli::subcommands::ReviewCommands;
use crate::context::AppContext;
use crate::output::output;

/// Handle `crev review`.
pub async fn handle(
    action: &ReviewCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let actor = ctx.actor().await?;
    match action {
        ReviewCommands::Overview => {
            output(&ctx.service.instructor_dashboard(&actor.id).await?, flags.format)
        }
        ReviewCommands::Home => output(&ctx.service.home_dashboard(&actor.id).await?, flags.format),
        ReviewCommands::Get { id } => {
            output(&ctx.service.get_review(&actor.id, id).await?, flags.format)
        }
        ReviewCommands::Completed { session, page } => {
            let page = ctx
                .service
                .completed_reviews(&actor.id, session.as_deref(), *page)
                .await?;
            output(&page, flags.format)
        }
    }
}

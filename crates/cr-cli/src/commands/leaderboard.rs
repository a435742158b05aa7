use crate::cli::GlobalFlags;
use crate::context::AppContext;
use crate::output::output;

/// Handle `crev leaderboard`.
pub async fn handle(ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let leaderboard = ctx.service.leaderboard().await?;
    output(&leaderboard, flags.format)
}

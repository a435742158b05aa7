use std::path::Path;

use anyhow::Context;
use serde_json::json;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::RubricCommands;
use crate::context::AppContext;
use crate::output::output;

/// Handle `crev rubric`.
pub async fn handle(
    action: &RubricCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        RubricCommands::List => output(&ctx.service.list_rubrics().await?, flags.format),
        RubricCommands::Import { name, file } => {
            let actor = ctx.actor().await?;
            let json = read_definition(file)?;
            let rubric = ctx.service.create_rubric(&actor.id, name, &json).await?;
            output(&rubric.summary(), flags.format)
        }
        RubricCommands::Update { id, name, file } => {
            let actor = ctx.actor().await?;
            let json = read_definition(file)?;
            let rubric = ctx.service.update_rubric(&actor.id, id, name, &json).await?;
            output(&rubric.summary(), flags.format)
        }
        RubricCommands::Export { id, out } => {
            let json = ctx.service.export_rubric_json(id).await?;
            match out {
                Some(path) => {
                    std::fs::write(path, &json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    output(&json!({ "id": id, "written": path }), flags.format)
                }
                None => {
                    println!("{json}");
                    Ok(())
                }
            }
        }
        RubricCommands::Duplicate { id } => {
            let actor = ctx.actor().await?;
            let copy = ctx.service.duplicate_rubric(&actor.id, id).await?;
            if let Some(warning) = &copy.warning {
                tracing::warn!("{warning}");
            }
            output(&copy, flags.format)
        }
        RubricCommands::Delete { id } => {
            let actor = ctx.actor().await?;
            ctx.service.delete_rubric(&actor.id, id).await?;
            output(&json!({ "deleted": id }), flags.format)
        }
    }
}

fn read_definition(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::read_definition;

    #[test]
    fn reads_definition_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[]").unwrap();
        assert_eq!(read_definition(file.path()).unwrap(), "[]");
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_definition(std::path::Path::new("/nonexistent/rubric.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rubric.json"));
    }
}

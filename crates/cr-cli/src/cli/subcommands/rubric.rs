use std::path::PathBuf;

use clap::Subcommand;

/// Rubric commands.
#[derive(Clone, Debug, Subcommand)]
pub enum RubricCommands {
    /// List rubrics by name.
    List,
    /// Create a rubric from an editor JSON file.
    Import {
        #[arg(long)]
        name: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Replace a rubric's name and definition, realigning graded reviews.
    Update {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Write a rubric's definition as editor JSON.
    Export {
        id: String,
        /// Output file; stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Copy a rubric.
    Duplicate { id: String },
    /// Delete a rubric and every review that uses it.
    Delete { id: String },
}

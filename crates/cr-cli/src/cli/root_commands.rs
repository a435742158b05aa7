use clap::Subcommand;

use crate::cli::subcommands::{ReviewCommands, RubricCommands, UserCommands};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Rubric store.
    Rubric {
        #[command(subcommand)]
        action: RubricCommands,
    },
    /// Accounts, roster and directory reconciliation.
    User {
        #[command(subcommand)]
        action: UserCommands,
    },
    /// Review dashboards and history.
    Review {
        #[command(subcommand)]
        action: ReviewCommands,
    },
    /// Students ranked by reviews received and reviews given.
    Leaderboard,
}

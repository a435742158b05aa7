use clap::Subcommand;

/// User and roster commands.
#[derive(Clone, Debug, Subcommand)]
pub enum UserCommands {
    /// Log in through the directory, creating or refreshing the local account.
    /// Reads the password from stdin.
    Login { username: String },
    /// Delete directory accounts that no longer exist in the directory.
    /// Reads the directory administrator's password from stdin.
    Reconcile {
        /// Directory administrator to bind as.
        #[arg(long)]
        admin: String,
    },
    /// Non-instructor accounts by session.
    Roster,
    /// Make exactly these users reviewers.
    Reviewers { usernames: Vec<String> },
    /// Delete local accounts.
    Delete {
        #[arg(required = true)]
        usernames: Vec<String>,
    },
    /// Record a student id and derive the school email.
    Setup {
        username: String,
        #[arg(long)]
        student_id: String,
    },
}

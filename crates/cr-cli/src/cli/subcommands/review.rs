use clap::Subcommand;

/// Review commands.
#[derive(Clone, Debug, Subcommand)]
pub enum ReviewCommands {
    /// Active and completed reviews split by session.
    Overview,
    /// The acting user's home dashboard.
    Home,
    /// One review with its rubric and scores.
    Get { id: String },
    /// Completed reviews, newest first.
    Completed {
        /// AM or PM; instructors only.
        #[arg(long)]
        session: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

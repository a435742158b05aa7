mod review;
mod rubric;
mod user;

pub use review::ReviewCommands;
pub use rubric::RubricCommands;
pub use user::UserCommands;

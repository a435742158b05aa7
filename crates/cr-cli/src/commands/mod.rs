pub mod dispatch;
mod leaderboard;
mod review;
mod rubric;
mod shared;
mod user;

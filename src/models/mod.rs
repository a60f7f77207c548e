//! Data models for the reviewer roster.
//!
//! Field names follow the snake_case wire contract of the public API.

mod pull_request;
mod stats;
mod team;
mod user;

pub use pull_request::*;
pub use stats::*;
pub use team::*;
pub use user::*;

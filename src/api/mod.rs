//! Backend REST API: types, client, cache keys and mutations.

mod client;
mod error;
mod keys;
mod mutations;
mod types;

#[cfg(test)]
pub mod fake;

pub use client::{HttpApi, RemoteApi};
pub use error::ApiError;
pub use keys::AppQueryKey;
pub use mutations::{ToggleGoalAchievement, ToggleTodo};
pub use types::{Goal, GoalFilter, Priority, Todo, TodoFilter};

//! Recipes and their tasks.
//!
//! This module provides:
//! - `Order`, the request a recipe is built for
//! - `Recipe`, the per-order state machine (task list, cursor, links)
//! - `Task`, one dispatchable step
//! - `RecipeStore`, the concurrent map of live recipes

mod order;
mod state;
mod store;
mod task;

pub use order::Order;
pub use state::{Recipe, RecipeStatus};
pub use store::{RecipeHandle, RecipeStore};
pub use task::Task;

//! Core vocabulary shared by every other module:
//! - Goal and mode enums
//! - The link bundle passed between stages

mod links;
mod vocabulary;

pub use links::{LinkBundle, LinkField, LoadTestKind, WorkloadModelKind};
pub use vocabulary::{Goal, Mode, UnknownName};

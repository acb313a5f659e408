//! Cycle registry: which ordered goal sequences are legal under each mode.

mod registry;

pub use registry::{Cycle, CycleRegistry};

//! Core data models.

mod account;
mod combat;
mod ids;
mod stats;

pub use account::*;
pub use combat::*;
pub use ids::*;
pub use stats::*;

//! Command implementations

pub mod predict;
pub mod schema;

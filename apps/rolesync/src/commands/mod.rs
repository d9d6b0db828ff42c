//! Command implementations

pub mod check;
pub mod sync;

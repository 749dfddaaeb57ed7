//! CLI command implementations.

pub mod record;
pub mod segments;

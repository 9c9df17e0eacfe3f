//! DashMap-backed in-memory collaborators.

pub mod directory;
pub mod records;

//! # clubpulse-core
//!
//! Core crate for the ClubPulse presence engine. Contains collaborator
//! traits, configuration schemas, typed identifiers, the presence data
//! model, and the unified error system.
//!
//! This crate has **no** internal dependencies on other ClubPulse crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;

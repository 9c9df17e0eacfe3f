//! # clubpulse-store
//!
//! In-memory implementations of the ClubPulse collaborator traits: a
//! DashMap-backed user record store and club membership directory.
//! Production deployments plug their own backends in through the
//! `clubpulse-core` traits; these back the sandbox and the test suites.

pub mod memory;

pub use memory::directory::MemoryDirectory;
pub use memory::records::MemoryRecordStore;

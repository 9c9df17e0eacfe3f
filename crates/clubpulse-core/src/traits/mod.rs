//! Core traits defined in `clubpulse-core` and implemented by other crates.

pub mod directory;
pub mod notifier;
pub mod record_store;

pub use directory::ClubMembershipDirectory;
pub use notifier::NotificationSink;
pub use record_store::UserRecordStore;

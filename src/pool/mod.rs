//! Sticky connection handling: one real connection reused across many
//! logical operations.

pub mod lease;
pub mod sticky;

pub use lease::{ConnectionLease, LeaseState, LeasedConnection, PropertySnapshot};
pub use sticky::{ProviderMode, StickyProvider};

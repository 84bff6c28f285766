//! Ports for state the notification layer shares between instances.

pub mod ban;
pub mod retry;

pub use ban::{LocalBanList, ProviderBanList};
pub use retry::{InMemoryRetryQueue, RetryQueue};

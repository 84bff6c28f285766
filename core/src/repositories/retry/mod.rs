//! Retry queue for failed notification deliveries.

mod r#trait;
pub use r#trait::RetryQueue;

mod memory;
pub use memory::InMemoryRetryQueue;

//! MySQL repository implementations

pub mod retry_queue_impl;

pub use retry_queue_impl::MySqlRetryQueue;

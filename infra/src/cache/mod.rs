//! Cache module for verification records and provider bans
//!
//! This module provides the Redis client, the distributed code store and
//! ban-list built on it, and a single-process in-memory code store.

pub mod local_code_store;
pub mod redis_ban_list;
pub mod redis_client;
pub mod redis_code_store;

#[cfg(test)]
mod tests;

pub use local_code_store::LocalCodeStore;
pub use redis_ban_list::RedisBanList;
pub use redis_client::RedisClient;
pub use redis_code_store::RedisCodeStore;

// Re-export commonly used types
pub use otp_shared::config::CacheConfig;

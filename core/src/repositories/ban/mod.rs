//! Shared provider ban-list.

mod r#trait;
pub use r#trait::ProviderBanList;

mod memory;
pub use memory::LocalBanList;

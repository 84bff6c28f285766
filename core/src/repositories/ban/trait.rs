//! Ban-list trait used by the failover pool to isolate failing providers.

use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

use crate::errors::NotifyError;

/// Record of providers excluded from selection after a recent failure
///
/// Bans carry their own expiry; an expired ban no longer appears in
/// `banned_among`, so providers return to service lazily.
#[async_trait]
pub trait ProviderBanList: Send + Sync {
    /// The subset of `providers` that is currently banned
    async fn banned_among(&self, providers: &[String]) -> Result<HashSet<String>, NotifyError>;

    /// Ban `provider` for `duration` unless it is already banned
    ///
    /// Returns `true` when this call placed the ban. An existing ban is
    /// left as is, so concurrent failures never extend or reset it.
    async fn ban(&self, provider: &str, duration: Duration) -> Result<bool, NotifyError>;
}

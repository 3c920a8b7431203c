use std::{fmt, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    AssumeRole, Clock, CredentialCache, HostIdentity, LocalHost, RefreshError, SessionCredentials,
    SystemClock,
};

/// A [`CredentialCache`] that can be shared between tasks.
///
/// Each call to [`get_credentials`](Self::get_credentials) holds a lock for its whole duration, so
/// concurrent callers wait for an in-flight refresh rather than starting their own. Clones share
/// the same cache.
///
/// This is also the type that implements the credential provider traits of the `aws-sdk` and
/// `rusoto` integrations.
///
/// ```no_run
/// # #[tokio::main] async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use assume_role_cache::SharedCredentialCache;
///
/// let cache = SharedCredentialCache::new(assume_role_cache::from_profile().await?);
///
/// let worker = {
///     let cache = cache.clone();
///     tokio::spawn(async move { cache.get_credentials().await })
/// };
///
/// let credentials = cache.get_credentials().await?;
/// let worker_credentials = worker.await??;
/// # Ok(()) }
/// ```
pub struct SharedCredentialCache<A, H = LocalHost, C = SystemClock> {
    inner: Arc<Mutex<CredentialCache<A, H, C>>>,
}

impl<A, H, C> SharedCredentialCache<A, H, C> {
    /// Wrap a cache so it can be shared.
    #[must_use]
    pub fn new(cache: CredentialCache<A, H, C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }
}

impl<A, H, C> SharedCredentialCache<A, H, C>
where
    A: AssumeRole,
    H: HostIdentity,
    C: Clock,
{
    /// Get credentials from the shared cache.
    ///
    /// See [`CredentialCache::get_credentials`].
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::RoleAssumptionFailed`] if a refresh was due and failed.
    pub async fn get_credentials(&self) -> Result<SessionCredentials, RefreshError<A::Error>> {
        self.inner.lock().await.get_credentials().await
    }

    // Credentials along with their nominal expiry, read under the same lock.
    #[cfg(any(feature = "aws-sdk", feature = "rusoto"))]
    pub(crate) async fn get_credentials_with_expiry(
        &self,
    ) -> Result<
        (SessionCredentials, Option<chrono::DateTime<chrono::Utc>>),
        RefreshError<A::Error>,
    > {
        let mut cache = self.inner.lock().await;
        let credentials = cache.get_credentials().await?;
        Ok((credentials, cache.expires_at()))
    }
}

impl<A, H, C> Clone for SharedCredentialCache<A, H, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, H, C> fmt::Debug for SharedCredentialCache<A, H, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SharedCredentialCache").finish_non_exhaustive()
    }
}

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{
    AssumeRole, AssumeRoleRequest, AssumedRole, Clock, HostIdentity, LocalHost, Region,
    RoleConfig, RoleConfigError, SessionCredentials, SystemClock,
};

/// How long before the requested duration elapses credentials are refreshed.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(5 * 60);

const UNKNOWN_HOST: &str = "unknown";

/// A cache of temporary credentials for an assumed role.
///
/// The first call to [`get_credentials`](Self::get_credentials) assumes the role. Subsequent calls
/// return the cached credentials until [`SAFETY_MARGIN`] before the requested duration runs out,
/// at which point the role is assumed again.
///
/// A failed refresh is returned to the caller and not retried. The schedule isn't advanced though,
/// so the next call will try again rather than wait for the next refresh window.
///
/// The cache does no synchronisation of its own, and so takes `&mut self`. Give each consumer its
/// own cache, or see [`SharedCredentialCache`](crate::SharedCredentialCache) to share one.
///
/// # Example
///
/// ```no_run
/// # #[tokio::main] async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use std::time::Duration;
///
/// use assume_role_cache::{CredentialCache, Region, RoleConfig, StsClient};
///
/// let sdk_config = aws_config::load_from_env().await;
/// let mut cache = CredentialCache::new(
///     RoleConfig {
///         region: Region::new("eu-west-1"),
///         role_arn: "arn:aws:iam::012345678910:role/deployer".to_string(),
///         duration: Duration::from_secs(3600),
///     },
///     StsClient::new(&sdk_config),
/// )?;
///
/// let credentials = cache.get_credentials().await?;
/// # Ok(()) }
/// ```
pub struct CredentialCache<A, H = LocalHost, C = SystemClock> {
    region: Region,
    role_arn: String,
    duration_seconds: i32,
    refresh_interval: chrono::Duration,
    role_service: A,
    host: H,
    clock: C,
    credentials: Option<AssumedRole>,
    next_refresh_at: Option<DateTime<Utc>>,
}

impl<A: AssumeRole> CredentialCache<A> {
    /// Construct a cache that assumes roles with the given `role_service`.
    ///
    /// Session names are built from the local host name, and time is read from the system clock.
    /// Use [`with_host_identity`](Self::with_host_identity) and [`with_clock`](Self::with_clock)
    /// to change that.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured duration isn't longer than [`SAFETY_MARGIN`], or is too
    /// long to request.
    pub fn new(config: RoleConfig, role_service: A) -> Result<Self, RoleConfigError> {
        let duration_seconds = config.duration_seconds()?;
        let refresh_interval = chrono::Duration::from_std(config.duration - SAFETY_MARGIN)
            .map_err(|error| RoleConfigError::new(format!("invalid duration: {error}")))?;

        Ok(Self {
            region: config.region,
            role_arn: config.role_arn,
            duration_seconds,
            refresh_interval,
            role_service,
            host: LocalHost,
            clock: SystemClock,
            credentials: None,
            next_refresh_at: None,
        })
    }
}

impl<A, H, C> CredentialCache<A, H, C> {
    /// Set the source of the host name used in session names.
    #[must_use]
    pub fn with_host_identity<NewH>(self, host: NewH) -> CredentialCache<A, NewH, C>
    where
        NewH: HostIdentity,
    {
        CredentialCache {
            region: self.region,
            role_arn: self.role_arn,
            duration_seconds: self.duration_seconds,
            refresh_interval: self.refresh_interval,
            role_service: self.role_service,
            host,
            clock: self.clock,
            credentials: self.credentials,
            next_refresh_at: self.next_refresh_at,
        }
    }

    /// Set the clock used for scheduling refreshes.
    #[must_use]
    pub fn with_clock<NewC>(self, clock: NewC) -> CredentialCache<A, H, NewC>
    where
        NewC: Clock,
    {
        CredentialCache {
            region: self.region,
            role_arn: self.role_arn,
            duration_seconds: self.duration_seconds,
            refresh_interval: self.refresh_interval,
            role_service: self.role_service,
            host: self.host,
            clock,
            credentials: self.credentials,
            next_refresh_at: self.next_refresh_at,
        }
    }

    // Nominal expiry of the cached credentials, based on the requested duration.
    pub(crate) fn expires_at(&self) -> Option<DateTime<Utc>> {
        let margin = chrono::Duration::from_std(SAFETY_MARGIN).ok()?;
        self.next_refresh_at
            .map(|at| at.checked_add_signed(margin).unwrap_or(DateTime::<Utc>::MAX_UTC))
    }

    // Scheduling trusts the requested duration, so credentials the service says expire sooner
    // would be served past their expiry.
    fn expires_sooner_than_scheduled(&self) -> bool {
        match (&self.credentials, self.expires_at()) {
            (Some(role), Some(expires_at)) => role.expires_at < expires_at,
            _ => false,
        }
    }
}

impl<A, H, C> CredentialCache<A, H, C>
where
    A: AssumeRole,
    H: HostIdentity,
    C: Clock,
{
    /// Get credentials, assuming the role if the cached credentials are due to be refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::RoleAssumptionFailed`] if a refresh was due and failed. Previously
    /// cached credentials are kept, but not returned.
    pub async fn get_credentials(&mut self) -> Result<SessionCredentials, RefreshError<A::Error>> {
        let now = self.clock.now();

        if let (Some(role), Some(next_refresh_at)) = (&self.credentials, self.next_refresh_at) {
            if now <= next_refresh_at {
                return Ok(role.into());
            }
        }

        let credentials = match self.refresh().await {
            Ok(credentials) => credentials,
            Err(error) => {
                // Retry next time around, don't wait for the duration to elapse.
                warn!(role_arn = %self.role_arn, %error, "failed to refresh credentials");
                return Err(error);
            }
        };

        let next_refresh_at = now
            .checked_add_signed(self.refresh_interval)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.next_refresh_at = Some(next_refresh_at);
        info!(role_arn = %self.role_arn, %next_refresh_at, "refreshed credentials");
        self.check_reported_expiry();

        Ok(credentials)
    }

    /// Assume the role and replace the cached credentials.
    ///
    /// This doesn't reschedule the next refresh, so a following call to
    /// [`get_credentials`](Self::get_credentials) may still refresh again.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::RoleAssumptionFailed`] if the role service fails, in which case the
    /// cached credentials are left unchanged.
    pub async fn refresh(&mut self) -> Result<SessionCredentials, RefreshError<A::Error>> {
        let session_name = self.session_name();
        debug!(role_arn = %self.role_arn, %session_name, "assuming role");

        let role = self
            .role_service
            .assume_role(AssumeRoleRequest {
                region: self.region.clone(),
                role_arn: self.role_arn.clone(),
                duration_seconds: self.duration_seconds,
                session_name,
            })
            .await
            .map_err(RefreshError::RoleAssumptionFailed)?;

        let credentials = SessionCredentials::from(&role);
        self.credentials = Some(role);
        Ok(credentials)
    }

    fn session_name(&self) -> String {
        let host = self.host.hostname().unwrap_or_else(|error| {
            debug!(%error, "unable to determine hostname for session name");
            UNKNOWN_HOST.to_string()
        });
        format!("temp-{}-{}", host, self.clock.now().timestamp())
    }

    fn check_reported_expiry(&self) {
        if !self.expires_sooner_than_scheduled() {
            return;
        }
        if let (Some(role), Some(expires_at)) = (&self.credentials, self.expires_at()) {
            warn!(
                role_arn = %self.role_arn,
                reported_expiry = %role.expires_at,
                scheduled_expiry = %expires_at,
                "credentials expire sooner than requested"
            );
        }
    }
}

impl<A, H, C> fmt::Debug for CredentialCache<A, H, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CredentialCache")
            .field("region", &self.region)
            .field("role_arn", &self.role_arn)
            .field("duration_seconds", &self.duration_seconds)
            .field("credentials", &self.credentials)
            .field("next_refresh_at", &self.next_refresh_at)
            .finish_non_exhaustive()
    }
}

/// An error that occurred when refreshing credentials.
#[derive(Debug)]
#[non_exhaustive]
pub enum RefreshError<E> {
    /// The role assumption service rejected or could not complete the request.
    ///
    /// This could be due to a network issue, an invalid role, expired upstream credentials,
    /// throttling, or missing permissions.
    RoleAssumptionFailed(E),
}

impl<E: std::error::Error> fmt::Display for RefreshError<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::RoleAssumptionFailed(error) => write!(f, "failed to assume role: {error}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RefreshError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RoleAssumptionFailed(error) => Some(error),
        }
    }
}

use aws_types_integration::{
    provider::{
        error::CredentialsError, future::ProvideCredentials as ProvideCredentialsFut,
        ProvideCredentials,
    },
    Credentials,
};

use crate::{AssumeRole, Clock, HostIdentity, SessionCredentials, SharedCredentialCache};

const PROVIDER_NAME: &str = "AssumeRoleCache";

/// Provide credentials from a [`SharedCredentialCache`].
///
/// Refresh failures are converted to [`CredentialsError::ProviderError`], which will stop
/// resolution if the cache is used as part of a credentials chain. The expiry handed to the SDK is
/// the one implied by the requested duration.
///
/// ```no_run
/// # #[tokio::main] async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use assume_role_cache::SharedCredentialCache;
///
/// let cache = SharedCredentialCache::new(assume_role_cache::from_profile().await?);
///
/// let sdk_config = aws_config::from_env()
///     .credentials_provider(cache)
///     .load()
///     .await;
/// # Ok(()) }
/// ```
impl<A, H, C> ProvideCredentials for SharedCredentialCache<A, H, C>
where
    A: AssumeRole + Send + 'static,
    A::Future: Send,
    H: HostIdentity + Send + 'static,
    C: Clock + Send + 'static,
{
    fn provide_credentials<'a>(&'a self) -> ProvideCredentialsFut<'a>
    where
        Self: 'a,
    {
        ProvideCredentialsFut::new(async {
            let (creds, expires_at) = self
                .get_credentials_with_expiry()
                .await
                .map_err(CredentialsError::provider_error)?;

            Ok(into_credentials(creds, expires_at))
        })
    }
}

fn into_credentials(
    creds: SessionCredentials,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
) -> Credentials {
    Credentials::new(
        creds.access_key_id,
        creds.secret_access_key,
        Some(creds.session_token),
        expires_at.map(Into::into),
        PROVIDER_NAME,
    )
}

#[cfg(test)]
mod tests {
    use std::{convert::Infallible, time::Duration};

    use aws_types_integration::provider::ProvideCredentials;
    use chrono::DateTime;

    use crate::{
        AssumeRoleRequest, AssumedRole, CredentialCache, Region, RoleConfig,
        SharedCredentialCache,
    };

    #[tokio::test]
    async fn provides_sdk_credentials() {
        let now = DateTime::<chrono::Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let service = move |_: AssumeRoleRequest| async move {
            Ok::<_, Infallible>(AssumedRole {
                access_key_id: "AK1".to_string(),
                secret_access_key: "SK1".to_string(),
                session_token: "TOK1".to_string(),
                expires_at: now + chrono::Duration::hours(1),
            })
        };
        let config = RoleConfig {
            region: Region::new("eu-west-1"),
            role_arn: "arn:aws:iam::012345678910:role/deployer".to_string(),
            duration: Duration::from_secs(3600),
        };
        let cache = SharedCredentialCache::new(
            CredentialCache::new(config, service)
                .unwrap()
                .with_clock(move || now),
        );

        let credentials = cache.provide_credentials().await.unwrap();

        assert_eq!(credentials.access_key_id(), "AK1");
        assert_eq!(credentials.secret_access_key(), "SK1");
        assert_eq!(credentials.session_token(), Some("TOK1"));
        assert_eq!(
            credentials.expiry(),
            Some((now + chrono::Duration::hours(1)).into())
        );
    }
}

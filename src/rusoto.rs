use async_trait::async_trait;
use rusoto_credential::{AwsCredentials, CredentialsError, ProvideAwsCredentials};

use crate::{AssumeRole, Clock, HostIdentity, SharedCredentialCache};

#[async_trait]
impl<A, H, C> ProvideAwsCredentials for SharedCredentialCache<A, H, C>
where
    A: AssumeRole + Send + 'static,
    A::Future: Send,
    H: HostIdentity + Send + 'static,
    C: Clock + Send + 'static,
{
    async fn credentials(&self) -> Result<AwsCredentials, CredentialsError> {
        let (credentials, expires_at) = self
            .get_credentials_with_expiry()
            .await
            .map_err(CredentialsError::new)?;

        Ok(AwsCredentials::new(
            credentials.access_key_id,
            credentials.secret_access_key,
            Some(credentials.session_token),
            expires_at,
        ))
    }
}

//! Cleaned up AWS STS API.

use std::fmt;

use aws_config::SdkConfig;
use aws_sdk_sts::error::DisplayErrorContext;
use chrono::{DateTime, Utc};
use futures::{future::BoxFuture, FutureExt};

use crate::Region;

/// A role assumption service.
///
/// [`CredentialCache`](crate::CredentialCache) calls this whenever its credentials are due to be
/// refreshed. [`StsClient`] is the real implementation; the trait is also implemented for async
/// functions taking an [`AssumeRoleRequest`], which is handy for tests or alternative token
/// services:
///
/// ```
/// use std::convert::Infallible;
///
/// use assume_role_cache::{AssumeRole, AssumedRole};
///
/// fn fixed() -> impl AssumeRole {
///     |request: assume_role_cache::AssumeRoleRequest| async move {
///         Ok::<_, Infallible>(AssumedRole {
///             access_key_id: "AKID".to_string(),
///             secret_access_key: "secret".to_string(),
///             session_token: "token".to_string(),
///             expires_at: chrono::Utc::now()
///                 + chrono::Duration::seconds(request.duration_seconds.into()),
///         })
///     }
/// }
/// ```
pub trait AssumeRole {
    /// The future returned by the service.
    type Future: std::future::Future<Output = Result<AssumedRole, Self::Error>>;

    /// The error that might occur when assuming the role.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Assume the role described by `request`.
    fn assume_role(&self, request: AssumeRoleRequest) -> Self::Future;
}

impl<F, Fut, E> AssumeRole for F
where
    F: Fn(AssumeRoleRequest) -> Fut,
    Fut: std::future::Future<Output = Result<AssumedRole, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    type Future = Fut;
    type Error = E;

    fn assume_role(&self, request: AssumeRoleRequest) -> Fut {
        self(request)
    }
}

/// A request to assume a role.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct AssumeRoleRequest {
    /// The region in which to call the service.
    pub region: Region,

    /// The ARN of the role to assume.
    pub role_arn: String,

    /// How long the issued credentials should be valid for.
    pub duration_seconds: i32,

    /// The session name, as it will appear in audit logs.
    pub session_name: String,
}

/// Credentials issued by a role assumption service.
#[derive(Clone, Eq, PartialEq)]
pub struct AssumedRole {
    /// The access key ID.
    pub access_key_id: String,

    /// The secret access key.
    pub secret_access_key: String,

    /// The session token.
    pub session_token: String,

    /// When the service says the credentials expire.
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for AssumedRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AssumedRole")
            .field("access_key_id", &self.access_key_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// An [`AssumeRole`] implementation backed by AWS STS.
///
/// The client signs requests with whatever credentials the [`SdkConfig`] it was constructed with
/// resolves. Each call is sent to the region in its [`AssumeRoleRequest`].
#[derive(Clone)]
pub struct StsClient {
    inner: aws_sdk_sts::Client,
}

impl StsClient {
    /// Construct a client from shared AWS SDK configuration.
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            inner: aws_sdk_sts::Client::new(config),
        }
    }
}

impl AssumeRole for StsClient {
    type Future = BoxFuture<'static, Result<AssumedRole, StsApiError>>;

    type Error = StsApiError;

    fn assume_role(&self, request: AssumeRoleRequest) -> Self::Future {
        send_assume_role(self.inner.clone(), request).boxed()
    }
}

async fn send_assume_role(
    client: aws_sdk_sts::Client,
    request: AssumeRoleRequest,
) -> Result<AssumedRole, StsApiError> {
    let res = client
        .assume_role()
        .role_arn(request.role_arn)
        .role_session_name(request.session_name)
        .duration_seconds(request.duration_seconds)
        .customize()
        .config_override(aws_sdk_sts::config::Builder::default().region(request.region.0))
        .send()
        .await
        .map_err(|error| StsApiError(DisplayErrorContext(&error).to_string()))?;

    AssumedRole::try_from(res).map_err(StsApiError)
}

impl fmt::Debug for StsClient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StsClient").finish_non_exhaustive()
    }
}

impl TryFrom<aws_sdk_sts::operation::assume_role::AssumeRoleOutput> for AssumedRole {
    type Error = String;

    fn try_from(
        res: aws_sdk_sts::operation::assume_role::AssumeRoleOutput,
    ) -> Result<Self, Self::Error> {
        macro_rules! invalid_res {
            ($msg:literal) => {
                concat!("invalid AssumeRole response: ", $msg)
            };
        }

        let credentials = res
            .credentials()
            .ok_or(invalid_res!("missing credentials"))?;
        let expiration = credentials.expiration();
        let expires_at =
            DateTime::<Utc>::from_timestamp(expiration.secs(), expiration.subsec_nanos())
                .ok_or(invalid_res!("expiration out of range"))?;
        Ok(Self {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
            expires_at,
        })
    }
}

/// An error returned by AWS STS.
///
/// This could be due to invalid configuration caught by the server, missing permissions,
/// throttling, or a network issue. The error message should be sufficient to aid end-user
/// debugging.
#[derive(Debug)]
pub struct StsApiError(String);

impl fmt::Display for StsApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "API error when attempting to assume role: {}", self.0)
    }
}

impl std::error::Error for StsApiError {}

#[cfg(test)]
mod tests {
    use aws_sdk_sts::{
        operation::assume_role::AssumeRoleOutput, primitives::DateTime as SdkDateTime,
        types::Credentials,
    };
    use chrono::{DateTime, Utc};

    use super::AssumedRole;

    fn output(expiration: SdkDateTime) -> AssumeRoleOutput {
        let credentials = Credentials::builder()
            .access_key_id("ASIAEXAMPLE")
            .secret_access_key("wJalrXUtnFEMI")
            .session_token("FwoGZXIvYXdzEBY")
            .expiration(expiration)
            .build()
            .unwrap();
        AssumeRoleOutput::builder().credentials(credentials).build()
    }

    #[test]
    fn converts_complete_response() {
        let role = AssumedRole::try_from(output(SdkDateTime::from_secs(1_700_003_600))).unwrap();

        assert_eq!(
            role,
            AssumedRole {
                access_key_id: "ASIAEXAMPLE".to_string(),
                secret_access_key: "wJalrXUtnFEMI".to_string(),
                session_token: "FwoGZXIvYXdzEBY".to_string(),
                expires_at: DateTime::<Utc>::from_timestamp(1_700_003_600, 0).unwrap(),
            }
        );
    }

    #[test]
    fn rejects_response_without_credentials() {
        let error = AssumedRole::try_from(AssumeRoleOutput::builder().build()).unwrap_err();

        assert_eq!(error, "invalid AssumeRole response: missing credentials");
    }

    #[test]
    fn rejects_unrepresentable_expiration() {
        let error = AssumedRole::try_from(output(SdkDateTime::from_secs(i64::MAX))).unwrap_err();

        assert_eq!(error, "invalid AssumeRole response: expiration out of range");
    }
}

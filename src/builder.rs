use std::{convert::Infallible, fmt, time::Duration};

use aws_config::{BehaviorVersion, SdkConfig};

use crate::{CredentialCache, ProfileSource, Region, StsClient, SAFETY_MARGIN};

/// Builder for a [`CredentialCache`] backed by AWS STS.
///
/// # Example
///
/// ```no_run
/// # #[tokio::main] async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use std::time::Duration;
///
/// use assume_role_cache::{CredentialCacheBuilder, RoleConfig};
///
/// let mut cache = CredentialCacheBuilder::new()
///     // use hard-coded configuration instead of loading from profile
///     .config(RoleConfig {
///         region: "eu-west-1".parse().unwrap(),
///         role_arn: "arn:aws:iam::012345678910:role/deployer".to_string(),
///         duration: Duration::from_secs(3600),
///     })
///     .build()
///     .await?;
///
/// let credentials = cache.get_credentials().await?;
/// # Ok(())
/// # }
/// ```
#[allow(clippy::module_name_repetitions)]
pub struct CredentialCacheBuilder<S = ProfileSource> {
    config_source: S,
    sdk_config: Option<SdkConfig>,
}

impl CredentialCacheBuilder<ProfileSource> {
    /// Construct a [`CredentialCache`] builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for CredentialCacheBuilder<ProfileSource> {
    fn default() -> Self {
        Self {
            config_source: ProfileSource::default(),
            sdk_config: None,
        }
    }
}

impl<S> CredentialCacheBuilder<S> {
    /// Set the role configuration source.
    ///
    /// By default, configuration is sourced from AWS shared config (located with
    /// `AWS_CONFIG_FILE` and `AWS_PROFILE`).
    #[must_use]
    pub fn config<NewS>(self, config_source: NewS) -> CredentialCacheBuilder<NewS>
    where
        NewS: RoleConfigSource,
    {
        CredentialCacheBuilder {
            config_source,
            sdk_config: self.sdk_config,
        }
    }

    /// Set the AWS SDK configuration used to call STS.
    ///
    /// The credentials it resolves are the ones exchanged for the role's credentials. By default
    /// the SDK's default chain is loaded for the configured region.
    #[must_use]
    pub fn sdk_config(self, sdk_config: SdkConfig) -> Self {
        Self {
            sdk_config: Some(sdk_config),
            ..self
        }
    }
}

impl<S> CredentialCacheBuilder<S>
where
    S: RoleConfigSource,
    RoleConfigError: From<S::Error>,
{
    /// Build a [`CredentialCache`] with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns any errors encountered when loading the [`RoleConfigSource`], or if the loaded
    /// configuration is invalid.
    pub async fn build(self) -> Result<CredentialCache<StsClient>, RoleConfigError> {
        let config = self.config_source.load().await?;

        let sdk_config = match self.sdk_config {
            Some(sdk_config) => sdk_config,
            None => {
                aws_config::defaults(BehaviorVersion::latest())
                    .region(config.region.0.clone())
                    .load()
                    .await
            }
        };

        CredentialCache::new(config, StsClient::new(&sdk_config))
    }
}

impl<S: fmt::Debug> fmt::Debug for CredentialCacheBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CredentialCacheBuilder")
            .field("config_source", &self.config_source)
            .field("sdk_config", &self.sdk_config.as_ref().map(|_| "_"))
            .finish()
    }
}

/// A source of role configuration.
///
/// This trait is more intended to facilitate precise error handling in
/// [`CredentialCacheBuilder::build`], but it could also be used to implement alternative
/// configuration sources.
pub trait RoleConfigSource {
    /// The future returned by the config source.
    type Future: std::future::Future<Output = Result<RoleConfig, Self::Error>>;

    /// The error that might occur when sourcing the configuration.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the role configuration.
    fn load(self) -> Self::Future;
}

/// Configuration for a role to assume.
///
/// Deserializes from e.g.
///
/// ```json
/// {
///     "region": "eu-west-1",
///     "role_arn": "arn:aws:iam::012345678910:role/deployer",
///     "duration_seconds": 3600
/// }
/// ```
#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RoleConfig {
    /// The AWS region in which to call STS.
    pub region: Region,

    /// The ARN of the IAM role to assume.
    pub role_arn: String,

    /// How long credentials should be requested for.
    ///
    /// This must be longer than [`SAFETY_MARGIN`].
    #[serde(rename = "duration_seconds", with = "duration_seconds")]
    pub duration: Duration,
}

impl RoleConfig {
    pub(crate) fn duration_seconds(&self) -> Result<i32, RoleConfigError> {
        if self.duration <= SAFETY_MARGIN {
            return Err(RoleConfigError::new(format!(
                "duration must be longer than {}s, got {}s",
                SAFETY_MARGIN.as_secs(),
                self.duration.as_secs(),
            )));
        }

        self.duration.as_secs().try_into().map_err(|_| {
            RoleConfigError::new(format!(
                "duration of {}s is too long",
                self.duration.as_secs()
            ))
        })
    }
}

impl RoleConfigSource for RoleConfig {
    type Future = futures::future::Ready<Result<Self, Self::Error>>;

    type Error = Infallible;

    fn load(self) -> Self::Future {
        futures::future::ready(Ok(self))
    }
}

mod duration_seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(duration.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// An error indicating missing or invalid role configuration.
///
/// The error message should be sufficient to aid end-user debugging.
#[derive(Debug)]
pub struct RoleConfigError(String);

impl RoleConfigError {
    pub(crate) fn new(error: impl Into<String>) -> Self {
        Self(error.into())
    }
}

impl fmt::Display for RoleConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for RoleConfigError {}

impl From<Infallible> for RoleConfigError {
    fn from(error: Infallible) -> Self {
        match error {}
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::RoleConfig;
    use crate::Region;

    #[test]
    fn deserializes_from_json() {
        let config: RoleConfig = serde_json::from_str(
            r#"{
                "region": "eu-west-1",
                "role_arn": "arn:aws:iam::012345678910:role/deployer",
                "duration_seconds": 3600
            }"#,
        )
        .unwrap();

        assert_eq!(
            config,
            RoleConfig {
                region: Region::new("eu-west-1"),
                role_arn: "arn:aws:iam::012345678910:role/deployer".to_string(),
                duration: Duration::from_secs(3600),
            }
        );
        assert_eq!(
            serde_json::to_value(&config).unwrap()["duration_seconds"],
            3600
        );
    }

    #[test]
    fn validates_duration() {
        let config = |secs| RoleConfig {
            region: Region::new("eu-west-1"),
            role_arn: "arn:aws:iam::012345678910:role/deployer".to_string(),
            duration: Duration::from_secs(secs),
        };

        assert_eq!(config(3600).duration_seconds().unwrap(), 3600);
        assert_eq!(
            config(300).duration_seconds().unwrap_err().to_string(),
            "duration must be longer than 300s, got 300s"
        );
        assert_eq!(
            config(1 << 40).duration_seconds().unwrap_err().to_string(),
            format!("duration of {}s is too long", 1_u64 << 40)
        );
    }
}

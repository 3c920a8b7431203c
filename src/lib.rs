#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, clippy::pedantic)]

//! A time-gated cache for temporary AWS credentials obtained with STS `AssumeRole`.
//!
//! See [`CredentialCache`] for the main entrypoint to the crate.
//!
//! ```no_run
//! # #[tokio::main] async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut cache = assume_role_cache::from_profile().await?;
//!
//! // Assumes the role on first use, then serves cached credentials until shortly before they
//! // expire.
//! let credentials = cache.get_credentials().await?;
//! # Ok(()) }
//! ```

#[cfg_attr(docsrs, doc(cfg(feature = "aws-sdk")))]
#[cfg(feature = "aws-sdk")]
mod aws_sdk;
mod builder;
mod cache;
mod clock;
mod credentials;
mod host;
mod profile;
mod region;
#[cfg_attr(docsrs, doc(cfg(feature = "rusoto")))]
#[cfg(feature = "rusoto")]
mod rusoto;
mod shared;
mod sts;

pub use crate::{
    builder::{CredentialCacheBuilder, RoleConfig, RoleConfigError, RoleConfigSource},
    cache::{CredentialCache, RefreshError, SAFETY_MARGIN},
    clock::{Clock, SystemClock},
    credentials::SessionCredentials,
    host::{HostIdentity, LocalHost},
    profile::ProfileSource,
    region::Region,
    shared::SharedCredentialCache,
    sts::{AssumeRole, AssumeRoleRequest, AssumedRole, StsApiError, StsClient},
};

/// Construct a [`CredentialCache`] for the role configured in AWS shared config.
///
/// The profile is located with `AWS_CONFIG_FILE` and `AWS_PROFILE`, and must set `region` and
/// `role_arn` (see [`ProfileSource`]). STS is called with credentials from the AWS SDK's default
/// chain.
///
/// For more flexible configuration see [`CredentialCacheBuilder`].
///
/// # Errors
///
/// An error is returned if the profile cannot be loaded, or if it is missing role configuration.
pub async fn from_profile() -> Result<CredentialCache<StsClient>, RoleConfigError> {
    CredentialCacheBuilder::new().build().await
}

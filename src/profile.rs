use std::{
    env, io,
    path::{Path, PathBuf},
    time::Duration,
};

use futures::future::BoxFuture;
use tokio::{
    fs::{self, File},
    io::AsyncReadExt,
};

use crate::{RoleConfig, RoleConfigError, RoleConfigSource};

const AWS_CONFIG_FILE: &str = "AWS_CONFIG_FILE";
const AWS_CONFIG_FILE_DEFAULT: &[&str] = &[".aws", "config"];

const AWS_PROFILE: &str = "AWS_PROFILE";
const AWS_PROFILE_DEFAULT: &str = "default";

// Matches the STS default when `DurationSeconds` is omitted.
const DURATION_SECONDS_DEFAULT: u64 = 3600;

/// A reference to a profile in AWS shared configuration.
///
/// The profile must set `region` and `role_arn`, and may set `duration_seconds` (default 3600):
///
/// ```ini
/// [profile deployer]
/// region = eu-west-1
/// role_arn = arn:aws:iam::012345678910:role/deployer
/// duration_seconds = 7200
/// ```
///
/// The default profile source uses the `AWS_CONFIG_FILE` and `AWS_PROFILE` environment variables,
/// but this can be overridden with [`with_config_file`](Self::with_config_file) and
/// [`with_profile`](Self::with_profile).
///
/// # Example
///
/// ```no_run
/// # #[tokio::main] async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use assume_role_cache::{CredentialCacheBuilder, ProfileSource};
///
/// let my_profile = ProfileSource::default()
///     .with_config_file(".myconfig")
///     .with_profile("deployer");
///
/// let cache = CredentialCacheBuilder::new()
///     .config(my_profile)
///     .build()
///     .await?;
/// # Ok(()) }
/// ```
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Debug, Default)]
pub struct ProfileSource {
    config_file: Option<PathBuf>,
    profile: Option<String>,
}

impl ProfileSource {
    /// Set the location of the AWS shared config file.
    #[must_use]
    pub fn with_config_file(self, path: impl Into<PathBuf>) -> Self {
        Self {
            config_file: Some(path.into()),
            ..self
        }
    }

    /// Set the profile.
    #[must_use]
    pub fn with_profile(self, name: impl Into<String>) -> Self {
        Self {
            profile: Some(name.into()),
            ..self
        }
    }
}

impl RoleConfigSource for ProfileSource {
    type Future = BoxFuture<'static, Result<RoleConfig, Self::Error>>;

    type Error = RoleConfigError;

    fn load(self) -> Self::Future {
        Box::pin(async move {
            let path = self.config_file.map_or_else(get_config_file_from_env, Ok)?;
            let profile = self.profile.map_or_else(get_profile_from_env, Ok)?;

            let config = read_file(&path).await.map_err(|error| {
                RoleConfigError::new(format!(
                    "unable to read config file {}: {error}",
                    path.display()
                ))
            })?;

            parse_profile(&config, &path, &profile)
        })
    }
}

fn get_config_file_from_env() -> Result<PathBuf, RoleConfigError> {
    read_env(AWS_CONFIG_FILE)
        .map_err(|error| {
            RoleConfigError::new(format!(
                "invalid path in environment variable {AWS_CONFIG_FILE}: {error}",
            ))
        })?
        .map(PathBuf::from)
        .map_or_else(
            || {
                let mut path = dirs_next::home_dir()
                    .ok_or_else(|| RoleConfigError::new("could not determine home directory"))?;
                for segment in AWS_CONFIG_FILE_DEFAULT {
                    path.push(segment);
                }
                Ok(path)
            },
            Ok,
        )
}

fn get_profile_from_env() -> Result<String, RoleConfigError> {
    Ok(read_env(AWS_PROFILE)
        .map_err(|error| {
            RoleConfigError::new(format!(
                "invalid profile name in environment variable {AWS_PROFILE}: {error}",
            ))
        })?
        .unwrap_or_else(|| AWS_PROFILE_DEFAULT.to_string()))
}

fn read_env(name: &str) -> Result<Option<String>, String> {
    env::var(name).map(Some).or_else(|error| match error {
        env::VarError::NotPresent => Ok(None),
        env::VarError::NotUnicode(data) => Err(format!("{data:?} contains invalid UTF-8")),
    })
}

fn parse_profile_name(line: &str) -> Option<&str> {
    line.trim().strip_suffix(']').and_then(|line| {
        line.strip_prefix("[profile ")
            .or_else(|| line.strip_prefix('['))
    })
}

fn parse_profile(config: &str, path: &Path, profile: &str) -> Result<RoleConfig, RoleConfigError> {
    let mut in_profile = false;
    let mut found = false;
    let mut region = None;
    let mut role_arn = None;
    let mut duration_seconds = None;

    for line in config.lines() {
        let line = line.trim_matches(' ');
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(next_profile) = parse_profile_name(line) {
            if in_profile {
                break;
            }
            in_profile = next_profile.trim() == profile;
            found |= in_profile;
        } else if in_profile {
            let mut kv = line
                .splitn(2, '=')
                .map(|kv| kv.trim_matches(' '))
                .filter(|kv| !kv.is_empty());
            match [kv.next(), kv.next()] {
                [Some("region"), Some(value)] => region = Some(value.to_string()),
                [Some("role_arn"), Some(value)] => role_arn = Some(value.to_string()),
                [Some("duration_seconds"), Some(value)] => {
                    duration_seconds = Some(value.to_string());
                }
                _ => {}
            }
        }
    }

    if !found {
        return Err(RoleConfigError::new(format!(
            "profile {} is not defined in config file {}",
            profile,
            path.display(),
        )));
    }

    let duration = duration_seconds
        .map_or(Ok(DURATION_SECONDS_DEFAULT), |value| value.parse())
        .map(Duration::from_secs)
        .map_err(|error| {
            RoleConfigError::new(format!(
                "error in profile {} in config file {}: invalid duration_seconds: {}",
                profile,
                path.display(),
                error
            ))
        })?;

    match (region, role_arn) {
        (Some(region), Some(role_arn)) => Ok(RoleConfig {
            region: crate::Region::new(region),
            role_arn,
            duration,
        }),
        (region, role_arn) => {
            let missing: Vec<_> = region
                .map_or_else(|| Some("region"), |_| None)
                .into_iter()
                .chain(role_arn.map_or_else(|| Some("role_arn"), |_| None))
                .collect();
            Err(RoleConfigError::new(format!(
                "incomplete role configuration in profile {}; missing: {}",
                profile,
                missing.join(", ")
            )))
        }
    }
}

async fn read_file(path: &Path) -> Result<String, io::Error> {
    let meta = fs::metadata(&path).await?;
    if !meta.is_file() {
        return Err(io::Error::new(io::ErrorKind::Other, "not a file"));
    }

    let mut file = File::open(&path).await?;
    let mut file_content = String::new();
    file.read_to_string(&mut file_content).await?;

    Ok(file_content)
}

#[cfg(test)]
mod tests {
    use std::{path::Path, time::Duration};

    use super::parse_profile;
    use crate::{Region, RoleConfig};

    const CONFIG: &str = "
[default]
region = us-east-1

# deployment role
[profile deployer]
region = eu-west-1
role_arn = arn:aws:iam::012345678910:role/deployer
duration_seconds = 7200

[profile reader]
role_arn = arn:aws:iam::012345678910:role/reader
";

    fn parse(profile: &str) -> Result<RoleConfig, String> {
        parse_profile(CONFIG, Path::new("config"), profile).map_err(|error| error.to_string())
    }

    #[test]
    fn reads_named_profile() {
        assert_eq!(
            parse("deployer").unwrap(),
            RoleConfig {
                region: Region::new("eu-west-1"),
                role_arn: "arn:aws:iam::012345678910:role/deployer".to_string(),
                duration: Duration::from_secs(7200),
            }
        );
    }

    #[test]
    fn reports_missing_keys() {
        assert_eq!(
            parse("default").unwrap_err(),
            "incomplete role configuration in profile default; missing: role_arn"
        );
        assert_eq!(
            parse("reader").unwrap_err(),
            "incomplete role configuration in profile reader; missing: region"
        );
    }

    #[test]
    fn reports_undefined_profile() {
        assert_eq!(
            parse("missing").unwrap_err(),
            "profile missing is not defined in config file config"
        );
    }

    #[test]
    fn defaults_duration() {
        let config = "[profile ci]\nregion = eu-west-1\nrole_arn = arn:aws:iam::1:role/ci\n";
        let parsed = parse_profile(config, Path::new("config"), "ci").unwrap();
        assert_eq!(parsed.duration, Duration::from_secs(3600));
    }

    #[test]
    fn rejects_invalid_duration() {
        let config = concat!(
            "[ci]\n",
            "region = eu-west-1\n",
            "role_arn = arn:aws:iam::1:role/ci\n",
            "duration_seconds = 1h\n",
        );
        let error = parse_profile(config, Path::new("config"), "ci").unwrap_err();
        assert!(error
            .to_string()
            .starts_with("error in profile ci in config file config: invalid duration_seconds"));
    }
}

//! Profile file and environment loading.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::RunProfile;
use crate::validate::validate_profile;

/// Bearer token for the destination API.
pub const ENV_ACCESS_TOKEN: &str = "DOSSIERMIG_ACCESS_TOKEN";
/// Tenant sent with every destination request.
pub const ENV_TENANT: &str = "DOSSIERMIG_TENANT";
/// Base URL of the destination API.
pub const ENV_BASE_URL: &str = "DOSSIERMIG_BASE_URL";
/// Bearer token for the tenant read by the destination source; defaults to [`ENV_ACCESS_TOKEN`].
pub const ENV_SOURCE_ACCESS_TOKEN: &str = "DOSSIERMIG_SOURCE_ACCESS_TOKEN";
/// Tenant read by the destination source; defaults to [`ENV_TENANT`].
pub const ENV_SOURCE_TENANT: &str = "DOSSIERMIG_SOURCE_TENANT";
/// Base URL read by the destination source; defaults to [`ENV_BASE_URL`].
pub const ENV_SOURCE_BASE_URL: &str = "DOSSIERMIG_SOURCE_BASE_URL";
/// Path of the JSON run profile.
pub const ENV_PROFILE: &str = "DOSSIERMIG_PROFILE";

/// Destination credentials, taken from the environment only.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Base URL of the destination API.
    pub base_url: String,
    /// Bearer token.
    pub access_token: String,
    /// Tenant identifier.
    pub tenant: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("access_token", &"<redacted>")
            .field("tenant", &self.tenant)
            .finish()
    }
}

impl Credentials {
    /// Read credentials through `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] for the first missing or blank variable.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |variable: &'static str| {
            non_blank(&lookup, variable).ok_or(ConfigError::MissingEnv { variable })
        };
        Ok(Self {
            base_url: read(ENV_BASE_URL)?,
            access_token: read(ENV_ACCESS_TOKEN)?,
            tenant: read(ENV_TENANT)?,
        })
    }

    /// Credentials for a tenant used as the source.
    ///
    /// Each `DOSSIERMIG_SOURCE_*` variable falls back to its destination counterpart.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] naming the destination variable when
    /// neither form is set.
    pub fn source_from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |own: &'static str, fallback: &'static str| {
            non_blank(&lookup, own)
                .or_else(|| non_blank(&lookup, fallback))
                .ok_or(ConfigError::MissingEnv { variable: fallback })
        };
        Ok(Self {
            base_url: read(ENV_SOURCE_BASE_URL, ENV_BASE_URL)?,
            access_token: read(ENV_SOURCE_ACCESS_TOKEN, ENV_ACCESS_TOKEN)?,
            tenant: read(ENV_SOURCE_TENANT, ENV_TENANT)?,
        })
    }

    /// Read credentials from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] for the first missing or blank variable.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|variable| std::env::var(variable).ok())
    }

    /// Source tenant credentials from the process environment.
    ///
    /// # Errors
    ///
    /// As for [`Credentials::source_from_lookup`].
    pub fn source_from_env() -> ConfigResult<Self> {
        Self::source_from_lookup(|variable| std::env::var(variable).ok())
    }
}

fn non_blank<F>(lookup: &F, variable: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(variable)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Profile path from `DOSSIERMIG_PROFILE`, or the default file name.
#[must_use]
pub fn profile_path_from<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup(ENV_PROFILE)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map_or_else(|| PathBuf::from(defaults::PROFILE_PATH), PathBuf::from)
}

/// Parse and validate a profile document.
///
/// # Errors
///
/// Returns parse failures and the first validation failure.
pub fn parse_profile(text: &str) -> ConfigResult<RunProfile> {
    let profile: RunProfile =
        serde_json::from_str(text).map_err(|source| ConfigError::Parse { path: None, source })?;
    validate_profile(&profile)?;
    Ok(profile)
}

/// Read, parse, and validate the profile at `path`.
///
/// Relative mapping table paths are resolved against the profile's directory.
///
/// # Errors
///
/// Returns IO, parse, and validation failures.
pub fn load_profile(path: &Path) -> ConfigResult<RunProfile> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "profile.read",
        path: path.to_path_buf(),
        source,
    })?;
    let mut profile: RunProfile =
        serde_json::from_str(text.trim_start_matches('\u{feff}')).map_err(|source| {
            ConfigError::Parse {
                path: Some(path.to_path_buf()),
                source,
            }
        })?;
    if let Some(base) = path.parent() {
        profile.resolve_tables(base);
    }
    validate_profile(&profile)?;
    info!(
        profile = %path.display(),
        mode = ?profile.mode,
        dry_run = profile.dry_run,
        steps = profile.mutators.len(),
        "run profile loaded"
    );
    Ok(profile)
}

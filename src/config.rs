//! Mailbox session configuration

use crate::error::{Error, Result};
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_API_BASE: &str = "https://gmail.googleapis.com";
const DEFAULT_USER: &str = "me";
const DEFAULT_VERIFIER: &str = "gpg";

/// Everything needed to talk to the mailbox service and the verifier
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Scheme and host of the REST API, without a trailing slash.
    pub api_base: String,
    /// Mailbox owner, `me` for the authenticated account.
    pub user: String,
    /// OAuth bearer token.
    pub access_token: String,
    /// Program used to verify signatures and fetch public keys.
    pub verifier: PathBuf,
    /// Extra arguments put before every verifier invocation.
    pub verifier_args: Vec<String>,
}

impl SessionConfig {
    /// Load the session configuration from the environment
    ///
    /// With `path`, that file is read into the environment first and must
    /// not be accessible to group or others. Without it, a `.env` file in
    /// the working directory is used if present. Required variables:
    /// - `MAILTAIL_ACCESS_TOKEN`
    ///
    /// Optional (with defaults):
    /// - `MAILTAIL_API_BASE` (default: `https://gmail.googleapis.com`)
    /// - `MAILTAIL_USER` (default: `me`)
    /// - `MAILTAIL_GPG` (default: `gpg`)
    /// - `MAILTAIL_GPG_ARGS` (default: none), split on whitespace
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file is missing, too permissive or
    /// unreadable, or if a required variable is not set.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                check_permissions(path)?;
                dotenvy::from_path(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {e}", path.display()))
                })?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `MAILTAIL_ACCESS_TOKEN` is missing or
    /// empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let access_token = lookup("MAILTAIL_ACCESS_TOKEN")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Config("MAILTAIL_ACCESS_TOKEN not set".into()))?;

        Ok(Self {
            api_base: lookup("MAILTAIL_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            user: lookup("MAILTAIL_USER").unwrap_or_else(|| DEFAULT_USER.to_string()),
            access_token,
            verifier: lookup("MAILTAIL_GPG")
                .map_or_else(|| PathBuf::from(DEFAULT_VERIFIER), PathBuf::from),
            verifier_args: lookup("MAILTAIL_GPG_ARGS")
                .map(|args| args.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        })
    }
}

#[cfg(unix)]
fn check_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let meta = std::fs::metadata(path)
        .map_err(|e| Error::Config(format!("Missing config file {}: {e}", path.display())))?;
    let mode = meta.permissions().mode();
    if mode & 0o077 != 0 {
        return Err(Error::Config(format!(
            "Config file {} permissions must be 0600 or better, was 0{:o}",
            path.display(),
            mode & 0o777
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(path: &Path) -> Result<()> {
    std::fs::metadata(path)
        .map(|_| ())
        .map_err(|e| Error::Config(format!("Missing config file {}: {e}", path.display())))
}

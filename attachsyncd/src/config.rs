use std::fmt;
use std::path::{Path, PathBuf};

use attachsync_core::StorageRoot;
use thiserror::Error;

use crate::mirror::budget::DEFAULT_UPLOAD_BUDGET;
use crate::mirror::engine::{FailurePolicy, MirrorSettings};

const DEFAULT_SOURCE_API_URL: &str = "https://api.podio.com";
const DEFAULT_DEST_API_URL: &str = "https://cloud-api.yandex.net";
const DEFAULT_SCRATCH_DIR_NAME: &str = "attachsync";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("failed to read config file {path:?}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

#[derive(Clone)]
pub struct SourceCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for SourceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct SyncConfig {
    pub organization: String,
    pub source_api_url: String,
    pub source_credentials: SourceCredentials,
    pub destination_api_url: String,
    pub destination_token: String,
    pub destination_root: StorageRoot,
    pub main_folder: String,
    pub upload_budget: u32,
    pub scratch_dir: PathBuf,
    pub failure_policy: FailurePolicy,
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("organization", &self.organization)
            .field("source_api_url", &self.source_api_url)
            .field("source_credentials", &self.source_credentials)
            .field("destination_api_url", &self.destination_api_url)
            .field("destination_token", &"<redacted>")
            .field("destination_root", &self.destination_root)
            .field("main_folder", &self.main_folder)
            .field("upload_budget", &self.upload_budget)
            .field("scratch_dir", &self.scratch_dir)
            .field("failure_policy", &self.failure_policy)
            .finish()
    }
}

impl SyncConfig {
    /// Loads variables from `path`, or from a `.env` in the working directory
    /// when no path is given, then reads the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|source| ConfigError::File {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let organization = required("ATTACHSYNC_SOURCE_ORG")?;
        let source_credentials = SourceCredentials {
            client_id: required("ATTACHSYNC_SOURCE_CLIENT_ID")?,
            client_secret: required("ATTACHSYNC_SOURCE_CLIENT_SECRET")?,
            username: required("ATTACHSYNC_SOURCE_USERNAME")?,
            password: required("ATTACHSYNC_SOURCE_PASSWORD")?,
        };
        let destination_token = required("ATTACHSYNC_DEST_TOKEN")?;

        let main_folder = required("ATTACHSYNC_DEST_MAIN_FOLDER")?
            .trim_matches('/')
            .to_string();
        if main_folder.is_empty() {
            return Err(ConfigError::Invalid {
                name: "ATTACHSYNC_DEST_MAIN_FOLDER",
                value: "/".to_string(),
            });
        }

        let destination_root = match lookup("ATTACHSYNC_DEST_ROOT") {
            Some(value) => value.parse::<StorageRoot>().map_err(|_| ConfigError::Invalid {
                name: "ATTACHSYNC_DEST_ROOT",
                value,
            })?,
            None => StorageRoot::default(),
        };

        let upload_budget = match lookup("ATTACHSYNC_MAX_UPLOADS") {
            Some(value) => value.trim().parse::<u32>().map_err(|_| ConfigError::Invalid {
                name: "ATTACHSYNC_MAX_UPLOADS",
                value,
            })?,
            None => DEFAULT_UPLOAD_BUDGET,
        };

        let failure_policy = match lookup("ATTACHSYNC_ON_ERROR") {
            Some(value) => parse_failure_policy(&value).ok_or(ConfigError::Invalid {
                name: "ATTACHSYNC_ON_ERROR",
                value,
            })?,
            None => FailurePolicy::default(),
        };

        let scratch_dir = match (lookup("ATTACHSYNC_TEMP_DIR"), dirs::home_dir()) {
            (Some(value), Some(home)) => expand_with_home(&value, &home),
            (Some(value), None) => PathBuf::from(value),
            (None, _) => std::env::temp_dir().join(DEFAULT_SCRATCH_DIR_NAME),
        };

        Ok(Self {
            organization,
            source_api_url: lookup("ATTACHSYNC_SOURCE_API_URL")
                .unwrap_or_else(|| DEFAULT_SOURCE_API_URL.to_string()),
            source_credentials,
            destination_api_url: lookup("ATTACHSYNC_DEST_API_URL")
                .unwrap_or_else(|| DEFAULT_DEST_API_URL.to_string()),
            destination_token,
            destination_root,
            main_folder,
            upload_budget,
            scratch_dir,
            failure_policy,
        })
    }

    pub fn mirror_settings(&self) -> MirrorSettings {
        MirrorSettings {
            organization: self.organization.clone(),
            root: self.destination_root,
            main_folder: self.main_folder.clone(),
            upload_budget: self.upload_budget,
            scratch_dir: self.scratch_dir.clone(),
            failure_policy: self.failure_policy,
        }
    }
}

fn parse_failure_policy(value: &str) -> Option<FailurePolicy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "fail-fast" | "abort" => Some(FailurePolicy::FailFast),
        "continue" | "skip" => Some(FailurePolicy::Continue),
        _ => None,
    }
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

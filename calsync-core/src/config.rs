//! calsync configuration, read from `~/.config/calsync/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, File};
use serde::{Deserialize, Serialize};

use crate::date_range::{DEFAULT_FUTURE_MONTHS, DEFAULT_PAST_DAYS};
use crate::error::{CalSyncError, CalSyncResult};

static DEFAULT_DATA_DIR: &str = "~/.local/share/calsync";
static DEFAULT_USER_ID: &str = "me";

/// What a background pass does with conflicting pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundConflictPolicy {
    /// Leave both sides untouched and keep the conflict surface as is; the
    /// next manual pass reports them.
    #[default]
    Defer,
    /// Add them to the conflict surface without dropping existing entries.
    Surface,
}

/// Whether a local delete waits for the remote delete to succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteDeletePolicy {
    /// Keep the local event when the remote delete fails.
    #[default]
    FailClosed,
    /// Delete locally regardless. The next pass re-creates the event locally
    /// if the remote still lists it.
    FailOpen,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

fn default_provider_timeout_secs() -> u64 {
    10
}

fn default_past_days() -> u64 {
    DEFAULT_PAST_DAYS
}

fn default_future_months() -> u32 {
    DEFAULT_FUTURE_MONTHS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Where the local store keeps its files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Owner of locally created events
    #[serde(default = "default_user_id")]
    pub user_id: String,

    #[serde(default)]
    pub background_conflicts: BackgroundConflictPolicy,

    #[serde(default)]
    pub remote_delete: RemoteDeletePolicy,

    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    #[serde(default = "default_past_days")]
    pub past_days: u64,

    #[serde(default = "default_future_months")]
    pub future_months: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            data_dir: default_data_dir(),
            user_id: default_user_id(),
            background_conflicts: BackgroundConflictPolicy::default(),
            remote_delete: RemoteDeletePolicy::default(),
            provider_timeout_secs: default_provider_timeout_secs(),
            past_days: default_past_days(),
            future_months: default_future_months(),
        }
    }
}

impl SyncConfig {
    pub fn config_path() -> CalSyncResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CalSyncError::Config("Could not determine config directory".into()))?
            .join("calsync");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default location, writing a commented template first if
    /// there is no config yet.
    pub fn load() -> CalSyncResult<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            Self::create_default_config(&path)?;
        }

        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> CalSyncResult<Self> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .build()
            .map_err(|e| CalSyncError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CalSyncError::Config(e.to_string()))
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir.to_string_lossy()).into_owned())
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn create_default_config(path: &Path) -> CalSyncResult<()> {
        let contents = format!(
            "\
# calsync configuration

# Where local events and calendar links are stored:
# data_dir = \"{}\"

# Owner of locally created events:
# user_id = \"{}\"

# What background syncs do with conflicts: \"defer\" or \"surface\"
# background_conflicts = \"defer\"

# Deleting a synced event when the provider can't be reached:
# \"fail_closed\" keeps it, \"fail_open\" deletes it locally anyway
# remote_delete = \"fail_closed\"

# provider_timeout_secs = 10
# past_days = {}
# future_months = {}
",
            DEFAULT_DATA_DIR, DEFAULT_USER_ID, DEFAULT_PAST_DAYS, DEFAULT_FUTURE_MONTHS
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CalSyncError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| CalSyncError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}

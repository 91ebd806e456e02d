//! Process settings, loaded once at startup.
//!
//! Layers, lowest to highest precedence:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, or `coldsync.toml` in the working directory)
//! 3. `COLDSYNC_*` environment variables, `__` between nested keys
//!    (`COLDSYNC_WALKER__SORT_ENTRIES=false`)
//! 4. command-line overrides

use std::path::{Path, PathBuf};
use std::time::Duration;

use coldsync_sink::StorageClass;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::logging::LoggingConfig;
use crate::reconciler::{FailurePolicy, ReconcilerConfig};
use crate::walker::WalkerConfig;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_NAME: &str = "coldsync";

/// Everything a run needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory tree to back up.
    pub root: PathBuf,
    /// SQLite inventory file.
    pub inventory: PathBuf,
    /// Destination directory of the filesystem sink.
    pub destination: PathBuf,
    pub storage_class: StorageClass,
    pub failure_policy: FailurePolicy,
    /// Per-upload timeout in seconds. Unset or zero disables it.
    #[serde(default)]
    pub upload_timeout_secs: Option<u64>,
    pub detect_stale: bool,
    #[serde(default)]
    pub walker: WalkerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Values given on the command line. `None` leaves lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub root: Option<PathBuf>,
    pub inventory: Option<PathBuf>,
    pub destination: Option<PathBuf>,
    pub storage_class: Option<StorageClass>,
    pub failure_policy: Option<FailurePolicy>,
    pub upload_timeout_secs: Option<u64>,
    pub detect_stale: Option<bool>,
    pub log_level: Option<String>,
}

impl Settings {
    /// Load settings from every layer.
    ///
    /// An explicitly named config file must exist; the default one is optional.
    pub fn load(config_file: Option<&Path>, overrides: &SettingsOverrides) -> Result<Self> {
        let mut builder = builder_with_defaults()?;

        builder = match config_file {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_NAME).required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix("COLDSYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder = apply_overrides(builder, overrides)?;

        let settings: Settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Upload timeout, if enabled.
    pub fn upload_timeout(&self) -> Option<Duration> {
        self.upload_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// The reconciler's view of these settings.
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            storage_class: self.storage_class,
            failure_policy: self.failure_policy,
            upload_timeout: self.upload_timeout(),
            detect_stale: self.detect_stale,
            walker: self.walker.clone(),
        }
    }
}

/// Create a config builder with defaults applied.
fn builder_with_defaults() -> std::result::Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("root", ".")?
        .set_default("inventory", ".coldsync/inventory.db")?
        .set_default("destination", ".coldsync/archive")?
        .set_default("storage_class", StorageClass::default().as_str())?
        .set_default("failure_policy", "halt")?
        .set_default("detect_stale", false)
}

fn apply_overrides(
    mut builder: ConfigBuilder<DefaultState>,
    overrides: &SettingsOverrides,
) -> std::result::Result<ConfigBuilder<DefaultState>, ConfigError> {
    if let Some(root) = &overrides.root {
        builder = builder.set_override("root", path_value(root))?;
    }
    if let Some(inventory) = &overrides.inventory {
        builder = builder.set_override("inventory", path_value(inventory))?;
    }
    if let Some(destination) = &overrides.destination {
        builder = builder.set_override("destination", path_value(destination))?;
    }
    if let Some(class) = overrides.storage_class {
        builder = builder.set_override("storage_class", class.as_str())?;
    }
    if let Some(policy) = overrides.failure_policy {
        let policy = match policy {
            FailurePolicy::Halt => "halt",
            FailurePolicy::Continue => "continue",
        };
        builder = builder.set_override("failure_policy", policy)?;
    }
    if let Some(secs) = overrides.upload_timeout_secs {
        builder = builder.set_override(
            "upload_timeout_secs",
            i64::try_from(secs).unwrap_or(i64::MAX),
        )?;
    }
    if let Some(detect_stale) = overrides.detect_stale {
        builder = builder.set_override("detect_stale", detect_stale)?;
    }
    if let Some(level) = &overrides.log_level {
        builder = builder.set_override("logging.level", level.as_str())?;
    }
    Ok(builder)
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

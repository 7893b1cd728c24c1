//! Configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/coldvault/coldvault.toml`
//! - Windows: `%APPDATA%/coldvault/coldvault.toml`
//!
//! Command-line flags override individual values after loading.

use std::path::{Path, PathBuf};

use coldvault_archive::ArchiveOptions;
use coldvault_transfer::{DEFAULT_PART_SIZE, validate_name};
use serde::{Deserialize, Serialize};

/// Archive run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory tree to archive.
    #[serde(default = "default_root_dir")]
    pub root_dir: String,

    /// Destination vault.
    #[serde(default = "default_vault")]
    pub vault: String,

    /// Account owning the vault (`-` = the credentials' account).
    #[serde(default = "default_account_id")]
    pub account_id: String,

    /// Part size in bytes.
    #[serde(default = "default_part_size")]
    pub part_size: usize,

    /// Chunks buffered between reader and uploader.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Storage root of the local vault sink.
    #[serde(default = "default_sink_dir")]
    pub sink_dir: String,
}

fn default_root_dir() -> String {
    "~".into()
}

fn default_vault() -> String {
    "backups".into()
}

fn default_account_id() -> String {
    "-".into()
}

fn default_part_size() -> usize {
    DEFAULT_PART_SIZE
}

fn default_channel_capacity() -> usize {
    coldvault_archive::DEFAULT_CHANNEL_CAPACITY
}

fn default_sink_dir() -> String {
    "~/.local/share/coldvault/vaults".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            vault: default_vault(),
            account_id: default_account_id(),
            part_size: default_part_size(),
            channel_capacity: default_channel_capacity(),
            sink_dir: default_sink_dir(),
        }
    }
}

impl Config {
    /// Loads configuration from `path` (or the platform default), creating a
    /// default file if none exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        } else {
            let config = Config::default();
            config.save(&path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Checks values that would make every upload fail.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.part_size == 0 {
            anyhow::bail!("part_size must be greater than zero");
        }
        if self.root_dir.is_empty() {
            anyhow::bail!("root_dir must not be empty");
        }
        validate_name(&self.vault).map_err(|e| anyhow::anyhow!("vault: {e}"))?;

        if !is_power_of_two_mib(self.part_size) {
            tracing::warn!(
                part_size = self.part_size,
                "part size is not a power-of-two number of MiB; cloud vaults may reject it"
            );
        }
        Ok(())
    }

    /// Root directory with `~` expanded.
    pub fn root_path(&self) -> PathBuf {
        expand_home(&self.root_dir)
    }

    /// Sink directory with `~` expanded.
    pub fn sink_path(&self) -> PathBuf {
        expand_home(&self.sink_dir)
    }

    /// Per-run archive options. The sink directory is never archived.
    pub fn archive_options(&self) -> ArchiveOptions {
        ArchiveOptions {
            account_id: self.account_id.clone(),
            vault: self.vault.clone(),
            part_size: self.part_size,
            channel_capacity: self.channel_capacity,
            exclude: vec![self.sink_path()],
        }
    }
}

fn is_power_of_two_mib(size: usize) -> bool {
    size % DEFAULT_PART_SIZE == 0 && (size / DEFAULT_PART_SIZE).is_power_of_two()
}

/// Expands a leading `~` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    let home = || {
        std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| "/tmp".into())
    };
    if path == "~" {
        PathBuf::from(home())
    } else if let Some(rest) = path.strip_prefix("~/") {
        PathBuf::from(home()).join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("coldvault")
            .join("coldvault.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("coldvault").join("coldvault.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/coldvault/coldvault.toml"))
    }
}

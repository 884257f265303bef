//! Configuration file support for otactl.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (OTACTL_*)
//! 3. Local config file (./otactl.toml)
//! 4. Global config file (~/.config/otactl/config.toml)
//!
//! Besides connection defaults, a config file may declare extra firmware
//! releases that overlay the built-in table:
//!
//! ```toml
//! [connection]
//! port = "/dev/ttyUSB0"
//! baud = 115200
//!
//! [update]
//! channel = "cdn"
//!
//! [[release]]
//! tag = "v2.4.0-rc1"
//! url = "http://lab.local/firmware/v2.4.0-rc1.bin"
//! ```

use directories::ProjectDirs;
use log::{debug, warn};
use otactl::{Channel, Release, ReleaseTable};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: Option<String>,
    /// Default baud rate.
    pub baud: Option<u32>,
}

/// Update behavior configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Default distribution channel ("github" or "cdn").
    pub channel: Option<String>,
}

/// One configured firmware release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseEntry {
    /// Version tag.
    pub tag: String,
    /// Download URL (used for the GitHub channel).
    pub url: String,
    /// CDN mirror URL; falls back to `url` when absent.
    pub cdn_url: Option<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Update settings.
    #[serde(default)]
    pub update: UpdateConfig,
    /// Extra releases overlaid on the built-in table.
    #[serde(default, rename = "release")]
    pub releases: Vec<ReleaseEntry>,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                if let Some(global_config) = Self::load_from_file(&global_path) {
                    debug!("Loaded global config from {}", global_path.display());
                    config.merge(global_config);
                }
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new("otactl.toml")) {
            debug!("Loaded local config from otactl.toml");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "otactl").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        if other.connection.port.is_some() {
            self.connection.port = other.connection.port;
        }
        if other.connection.baud.is_some() {
            self.connection.baud = other.connection.baud;
        }
        if other.update.channel.is_some() {
            self.update.channel = other.update.channel;
        }
        self.releases.extend(other.releases);
    }

    /// The configured default channel, if valid.
    pub fn channel(&self) -> Option<Channel> {
        let raw = self.update.channel.as_deref()?;
        match raw.to_ascii_lowercase().as_str() {
            "github" => Some(Channel::Github),
            "cdn" => Some(Channel::Cdn),
            other => {
                warn!("Ignoring unknown channel in config: {other}");
                None
            },
        }
    }

    /// Build the release table: built-in set overlaid with configured
    /// entries (same tag replaces, new tag appends).
    pub fn release_table(&self) -> ReleaseTable {
        let mut table = ReleaseTable::builtin();
        for entry in &self.releases {
            table.upsert(Release {
                tag: entry.tag.clone(),
                github_url: entry.url.clone(),
                cdn_url: entry.cdn_url.clone().unwrap_or_else(|| entry.url.clone()),
            });
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Default values ----

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.connection.port.is_none());
        assert!(config.connection.baud.is_none());
        assert!(config.update.channel.is_none());
        assert!(config.releases.is_empty());
    }

    // ---- Config merge ----

    #[test]
    fn test_config_merge_overrides_set_fields() {
        let mut base = Config::default();
        base.connection.baud = Some(115200);

        let mut other = Config::default();
        other.connection.port = Some("/dev/ttyUSB0".to_string());
        other.connection.baud = Some(74880);
        other.update.channel = Some("github".to_string());

        base.merge(other);

        assert_eq!(base.connection.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(base.connection.baud, Some(74880));
        assert_eq!(base.update.channel.as_deref(), Some("github"));
    }

    #[test]
    fn test_config_merge_does_not_overwrite_with_none() {
        let mut base = Config::default();
        base.connection.port = Some("/dev/ttyUSB0".to_string());
        base.connection.baud = Some(115200);

        let other = Config::default(); // all None
        base.merge(other);

        assert_eq!(base.connection.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(base.connection.baud, Some(115200));
    }

    #[test]
    fn test_config_merge_extends_releases() {
        let mut base = Config::default();
        base.releases.push(ReleaseEntry {
            tag: "v2.4.0".to_string(),
            url: "http://a/fw.bin".to_string(),
            cdn_url: None,
        });

        let mut other = Config::default();
        other.releases.push(ReleaseEntry {
            tag: "v2.5.0".to_string(),
            url: "http://b/fw.bin".to_string(),
            cdn_url: None,
        });

        base.merge(other);
        assert_eq!(base.releases.len(), 2);
    }

    // ---- TOML ----

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[connection]
port = "/dev/ttyUSB0"
baud = 115200

[update]
channel = "github"

[[release]]
tag = "v2.4.0-rc1"
url = "http://lab.local/firmware/v2.4.0-rc1.bin"
cdn_url = "http://mirror.local/firmware/v2.4.0-rc1.bin"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.connection.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.connection.baud, Some(115200));
        assert_eq!(config.update.channel.as_deref(), Some("github"));
        assert_eq!(config.releases.len(), 1);
        assert_eq!(config.releases[0].tag, "v2.4.0-rc1");
    }

    #[test]
    fn test_config_from_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.connection.port.is_none());
        assert!(config.releases.is_empty());
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let mut config = Config::default();
        config.connection.port = Some("COM3".to_string());
        config.connection.baud = Some(74880);
        config.update.channel = Some("cdn".to_string());
        config.releases.push(ReleaseEntry {
            tag: "v9.0.0".to_string(),
            url: "http://lab.local/fw.bin".to_string(),
            cdn_url: None,
        });

        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(deserialized.connection.port.as_deref(), Some("COM3"));
        assert_eq!(deserialized.connection.baud, Some(74880));
        assert_eq!(deserialized.releases.len(), 1);
    }

    // ---- channel ----

    #[test]
    fn test_channel_parsing() {
        let mut config = Config::default();
        assert_eq!(config.channel(), None);

        config.update.channel = Some("github".to_string());
        assert_eq!(config.channel(), Some(Channel::Github));

        config.update.channel = Some("CDN".to_string());
        assert_eq!(config.channel(), Some(Channel::Cdn));

        config.update.channel = Some("ftp".to_string());
        assert_eq!(config.channel(), None);
    }

    // ---- release_table ----

    #[test]
    fn test_release_table_overlays_builtin() {
        let mut config = Config::default();
        config.releases.push(ReleaseEntry {
            tag: "v2.2.0".to_string(), // overrides a built-in tag
            url: "http://lab.local/custom.bin".to_string(),
            cdn_url: None,
        });
        config.releases.push(ReleaseEntry {
            tag: "v2.4.0-rc1".to_string(), // new tag
            url: "http://lab.local/rc.bin".to_string(),
            cdn_url: Some("http://mirror.local/rc.bin".to_string()),
        });

        let table = config.release_table();
        assert_eq!(table.len(), 4);
        assert_eq!(
            table.resolve("v2.2.0", Channel::Github),
            Some("http://lab.local/custom.bin")
        );
        // cdn_url falls back to url when absent
        assert_eq!(
            table.resolve("v2.2.0", Channel::Cdn),
            Some("http://lab.local/custom.bin")
        );
        assert_eq!(
            table.resolve("v2.4.0-rc1", Channel::Cdn),
            Some("http://mirror.local/rc.bin")
        );
    }

    // ---- load_from_path ----

    #[test]
    fn test_load_from_path_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("otactl.toml");
        fs::write(
            &path,
            r#"
[connection]
port = "/dev/ttyUSB1"
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path);
        assert_eq!(config.connection.port.as_deref(), Some("/dev/ttyUSB1"));
    }

    #[test]
    fn test_load_from_path_nonexistent_falls_back_to_defaults() {
        let config = Config::load_from_path(Path::new("/nonexistent/path/otactl.toml"));
        assert!(config.connection.port.is_none());
    }

    #[test]
    fn test_load_from_path_invalid_toml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("otactl.toml");
        fs::write(&path, "not [ valid { toml").unwrap();

        let config = Config::load_from_path(&path);
        assert!(config.connection.port.is_none());
    }

    // ---- global paths ----

    #[test]
    fn test_global_config_path_names_otactl() {
        if let Some(p) = Config::global_config_path() {
            assert!(p.to_str().unwrap().contains("otactl"));
            assert!(p.to_str().unwrap().ends_with("config.toml"));
        }
    }
}

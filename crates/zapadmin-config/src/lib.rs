//! Configuration file handling for zapadmin.
//!
//! This crate loads `.zapadmin.toml`, which carries the values every
//! versions-file update needs but that are not per-invocation flags: the
//! checksum algorithm, base download URLs, release asset names and the
//! paths of the versions files.
//!
//! # Example
//!
//! ```
//! use zapadmin_config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new(".")).expect("load config");
//! if let Some(algorithm) = config.checksum_algorithm() {
//!     println!("Checksum algorithm: {}", algorithm);
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default configuration file name
pub const CONFIG_FILE: &str = ".zapadmin.toml";

/// Get the config file path for a directory
pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

/// Complete zapadmin configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub checksum: ChecksumConfig,
    #[serde(default)]
    pub daily: DailyConfig,
    #[serde(default)]
    pub main: MainReleaseConfig,
    #[serde(default)]
    pub registries: RegistriesConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
}

impl Config {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the checksum algorithm (e.g. `SHA-256`)
    pub fn checksum_algorithm(&self) -> Option<&str> {
        self.checksum.algorithm.as_deref()
    }

    /// Get the base URL daily releases are published under
    pub fn daily_base_download_url(&self) -> Option<&str> {
        self.daily.base_download_url.as_deref()
    }

    /// Get the versions files updated by default
    pub fn into_files(&self) -> &[PathBuf] {
        &self.registries.into
    }
}

/// Checksum configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChecksumConfig {
    /// Digest algorithm name, written as the prefix of every hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
}

/// Daily (weekly) release configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyConfig {
    /// Base URL, the release directory and file name are appended
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_download_url: Option<String>,
}

/// Main release configuration.
///
/// Values may contain the `@@VERSION@@` and `@@VERSION_UNDERSCORES@@` tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MainReleaseConfig {
    #[serde(default)]
    pub base_download_url: String,
    #[serde(default)]
    pub windows_file_name: String,
    #[serde(default)]
    pub linux_file_name: String,
    #[serde(default)]
    pub mac_file_name: String,
    #[serde(default)]
    pub release_notes: String,
    #[serde(default)]
    pub release_notes_url: String,
}

/// Versions files configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistriesConfig {
    /// Repository path of the main versions file (core releases)
    #[serde(default = "default_main_registry")]
    pub main: String,
    /// Repository path of the versions file tracking add-on releases
    #[serde(default = "default_add_ons_registry")]
    pub add_ons: String,
    /// Versions files updated by the update commands
    #[serde(default)]
    pub into: Vec<PathBuf>,
    /// Where the release state is written
    #[serde(default = "default_release_state")]
    pub release_state: PathBuf,
}

fn default_main_registry() -> String {
    "ZapVersions.xml".to_string()
}

fn default_add_ons_registry() -> String {
    "ZapVersions-dev.xml".to_string()
}

fn default_release_state() -> PathBuf {
    PathBuf::from("build/release_state_last_commit.json")
}

impl Default for RegistriesConfig {
    fn default() -> Self {
        Self {
            main: default_main_registry(),
            add_ons: default_add_ons_registry(),
            into: Vec::new(),
            release_state: default_release_state(),
        }
    }
}

/// Released add-on download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// File listing the add-on ids allowed to be downloaded
    #[serde(default = "default_allowed_add_ons")]
    pub allowed_add_ons: PathBuf,
    /// Directory the add-ons are downloaded into
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_allowed_add_ons() -> PathBuf {
    PathBuf::from("allowed-add-ons.txt")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("build/add-ons")
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            allowed_add_ons: default_allowed_add_ons(),
            output_dir: default_output_dir(),
        }
    }
}

/// Load configuration from a directory
pub fn load_config(dir: &Path) -> Result<Config> {
    load_config_from_file(&config_path(dir))
}

/// Load configuration from a specific file path
pub fn load_config_from_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Find configuration file by walking up the directory tree
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir;

    loop {
        let config_file = current.join(CONFIG_FILE);
        if config_file.exists() {
            return Some(config_file);
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config() {
        let config = Config::new();
        assert!(config.checksum_algorithm().is_none());
        assert!(config.daily_base_download_url().is_none());
        assert!(config.into_files().is_empty());
        assert_eq!(config.registries.main, "ZapVersions.xml");
        assert_eq!(config.registries.add_ons, "ZapVersions-dev.xml");
        assert_eq!(
            config.downloads.output_dir,
            PathBuf::from("build/add-ons")
        );
    }

    #[test]
    fn load_missing_config_returns_default() {
        let td = tempdir().expect("tempdir");
        let config = load_config(td.path()).expect("load");
        assert!(config.checksum_algorithm().is_none());
    }

    #[test]
    fn load_config_from_toml() {
        let td = tempdir().expect("tempdir");
        let path = td.path().join(CONFIG_FILE);

        let content = r#"
[checksum]
algorithm = "SHA-256"

[daily]
base_download_url = "https://github.com/zaproxy/zaproxy/releases/download/w"

[main]
base_download_url = "https://github.com/zaproxy/zaproxy/releases/download/v@@VERSION@@/"
windows_file_name = "ZAP_@@VERSION_UNDERSCORES@@_windows.exe"
linux_file_name = "ZAP_@@VERSION@@_Linux.tar.gz"
mac_file_name = "ZAP_@@VERSION@@.dmg"
release_notes = "Release notes"
release_notes_url = "https://www.zaproxy.org/docs/desktop/releases/@@VERSION@@/"

[registries]
main = "ZapVersions.xml"
add_ons = "ZapVersions-2.14.xml"
into = ["ZapVersions-dev.xml", "ZapVersions.xml"]
release_state = "out/state.json"

[downloads]
allowed_add_ons = "allowed.txt"
output_dir = "out/add-ons"
"#;
        std::fs::write(&path, content).expect("write");

        let config = load_config(td.path()).expect("load");

        assert_eq!(config.checksum_algorithm(), Some("SHA-256"));
        assert_eq!(
            config.daily_base_download_url(),
            Some("https://github.com/zaproxy/zaproxy/releases/download/w")
        );
        assert_eq!(config.main.mac_file_name, "ZAP_@@VERSION@@.dmg");
        assert_eq!(config.registries.add_ons, "ZapVersions-2.14.xml");
        assert_eq!(
            config.into_files(),
            &[
                PathBuf::from("ZapVersions-dev.xml"),
                PathBuf::from("ZapVersions.xml")
            ]
        );
        assert_eq!(config.registries.release_state, PathBuf::from("out/state.json"));
        assert_eq!(config.downloads.allowed_add_ons, PathBuf::from("allowed.txt"));
    }

    #[test]
    fn invalid_toml_fails() {
        let td = tempdir().expect("tempdir");
        std::fs::write(td.path().join(CONFIG_FILE), "[checksum\nalgorithm =").expect("write");

        let err = load_config(td.path()).expect_err("invalid");
        assert!(err.to_string().contains("failed to parse config file"));
    }

    #[test]
    fn find_config_walks_up() {
        let td = tempdir().expect("tempdir");

        let nested = td.path().join("a").join("b").join("c");
        std::fs::create_dir_all(&nested).expect("create dirs");

        let config_path = td.path().join(CONFIG_FILE);
        std::fs::write(&config_path, "[checksum]\nalgorithm = 'SHA-512'").expect("write");

        let found = find_config(&nested);
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn find_config_returns_none_if_not_found() {
        let td = tempdir().expect("tempdir");
        let nested = td.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("create dirs");

        assert!(find_config(&nested).is_none());
    }

    #[test]
    fn config_path_helper() {
        let dir = PathBuf::from("/project");
        assert_eq!(config_path(&dir), PathBuf::from("/project/.zapadmin.toml"));
    }

    #[test]
    fn partial_config_uses_defaults() {
        let td = tempdir().expect("tempdir");
        let path = td.path().join(CONFIG_FILE);

        std::fs::write(&path, "[registries]\ninto = [\"ZapVersions.xml\"]\n").expect("write");

        let config = load_config(td.path()).expect("load");

        assert_eq!(config.into_files(), &[PathBuf::from("ZapVersions.xml")]);
        assert_eq!(config.registries.main, "ZapVersions.xml");
        assert_eq!(
            config.registries.release_state,
            PathBuf::from("build/release_state_last_commit.json")
        );
        assert!(config.main.base_download_url.is_empty());
    }
}

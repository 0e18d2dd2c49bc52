//! Release state persistence for zapadmin.
//!
//! The release state is computed once per build and then read by every step
//! that reacts to a release. Each run overwrites the previous file.
//!
//! # Example
//!
//! ```
//! use zapadmin_state::ReleaseStateStore;
//! use zapadmin_types::{ReleaseState, VersionChange};
//!
//! let dir = tempfile::tempdir().expect("tempdir");
//! let store = ReleaseStateStore::new(dir.path().join("release_state_last_commit.json"));
//!
//! let mut state = ReleaseState::new();
//! state.main_release = Some(VersionChange::new(Some("2.14.0".into()), "2.15.0"));
//! store.save(&state).expect("save");
//!
//! let loaded = store.load().expect("load");
//! assert!(loaded.is_new_main_release());
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use zapadmin_types::ReleaseState;

/// Default release state file name
pub const STATE_FILE: &str = "release_state_last_commit.json";

/// Get the default state file path for a build directory
pub fn state_path(build_dir: &Path) -> PathBuf {
    build_dir.join(STATE_FILE)
}

/// Persistent store for the release state
#[derive(Debug, Clone)]
pub struct ReleaseStateStore {
    path: PathBuf,
}

impl ReleaseStateStore {
    /// Create a store backed by the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store using the default file name in a build directory
    pub fn in_dir(build_dir: &Path) -> Self {
        Self::new(state_path(build_dir))
    }

    /// Save state to disk, replacing any previous state
    pub fn save(&self, state: &ReleaseState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create state dir {}", parent.display()))?;
        }

        let tmp_path = self.path.with_extension("tmp");

        let json = serde_json::to_string_pretty(state)
            .context("failed to serialize release state to JSON")?;

        fs::write(&tmp_path, json)
            .with_context(|| format!("failed to write state file {}", tmp_path.display()))?;

        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to rename state file to {}", self.path.display()))?;

        Ok(())
    }

    /// Load state from disk
    pub fn load(&self) -> Result<ReleaseState> {
        if !self.path.exists() {
            return Err(anyhow::anyhow!(
                "release state file not found: {}",
                self.path.display()
            ));
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read state file {}", self.path.display()))?;

        let state: ReleaseState = serde_json::from_str(&content).with_context(|| {
            format!(
                "failed to parse release state JSON from {}",
                self.path.display()
            )
        })?;

        Ok(state)
    }

    /// Check if state file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Get the path to the state file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

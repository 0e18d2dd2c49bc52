//! Core domain types for zapadmin.
//!
//! This crate provides the types handed between the release-state step and
//! the steps that consume it (website generation, add-on downloads, release
//! dispatch), plus the add-on release request payload.

use serde::{Deserialize, Serialize};

/// A version transition of a single release line between two commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_version: Option<String>,
    current_version: String,
    #[serde(default)]
    new_version: bool,
}

impl VersionChange {
    /// Create a change, deriving whether it is a new version.
    pub fn new(previous_version: Option<String>, current_version: impl Into<String>) -> Self {
        let current_version = current_version.into();
        let new_version = previous_version
            .as_deref()
            .is_none_or(|previous| previous != current_version);
        Self {
            previous_version,
            current_version,
            new_version,
        }
    }

    pub fn previous_version(&self) -> Option<&str> {
        self.previous_version.as_deref()
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// Whether the current version differs from the previous one (or there
    /// was no previous one).
    pub fn is_new_version(&self) -> bool {
        self.new_version
    }
}

/// A version change of one add-on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOnChange {
    id: String,
    #[serde(flatten)]
    change: VersionChange,
}

impl AddOnChange {
    pub fn new(
        id: impl Into<String>,
        previous_version: Option<String>,
        current_version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            change: VersionChange::new(previous_version, current_version),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn change(&self) -> &VersionChange {
        &self.change
    }

    pub fn previous_version(&self) -> Option<&str> {
        self.change.previous_version()
    }

    pub fn current_version(&self) -> &str {
        self.change.current_version()
    }

    pub fn is_new_version(&self) -> bool {
        self.change.is_new_version()
    }
}

/// What was released by the last commit, computed from the versions files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseState {
    /// Main (stable) release, from `core.version`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_release: Option<VersionChange>,
    /// Weekly release, from `core.daily-version`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_release: Option<VersionChange>,
    /// Add-ons whose version changed, in registry order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_ons: Option<Vec<AddOnChange>>,
}

impl ReleaseState {
    /// Create an empty release state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_new_main_release(&self) -> bool {
        self.main_release
            .as_ref()
            .is_some_and(VersionChange::is_new_version)
    }

    pub fn is_new_weekly_release(&self) -> bool {
        self.weekly_release
            .as_ref()
            .is_some_and(VersionChange::is_new_version)
    }

    /// Add-on changes that are new versions.
    pub fn new_add_ons(&self) -> impl Iterator<Item = &AddOnChange> {
        self.add_ons
            .iter()
            .flatten()
            .filter(|change| change.is_new_version())
    }
}

/// Request to release one or more add-ons.
///
/// ```json
/// {"addons": [{"url": "https://.../x.zap", "checksum": "abc..."}]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOnReleaseData {
    #[serde(rename = "addons", default)]
    pub add_ons: Vec<AddOnRelease>,
}

/// A single add-on to release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOnRelease {
    /// Where the add-on is downloaded from (and published at).
    pub url: String,
    /// Expected hex digest of the add-on file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

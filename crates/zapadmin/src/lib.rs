//! # zapadmin
//!
//! Maintenance of the ZAP versions files (`ZapVersions.xml`,
//! `ZapVersions-dev.xml`), the registries ZAP installations read to find new
//! core releases, weekly builds and add-ons.
//!
//! ## Features
//!
//! - **Versions file model**: An in-memory XML tree addressed by typed keys
//!   (`core.linux.hash`, `addon(2)`), saved with a stable layout so that
//!   loading and saving an unchanged file is byte-for-byte stable.
//! - **Add-on merging**: A new add-on release replaces its previous entry and
//!   all entries are rewritten in ascending id order.
//! - **Release updates**: Weekly builds, main releases and add-ons are
//!   checksummed and written into any number of versions files.
//! - **Release state**: What the last commit released, from the git history
//!   of the versions files.
//!
//! ## Pipeline
//!
//! 1. A release file is taken from disk or downloaded over HTTPS
//!    ([`download`]).
//! 2. Its digest is computed and optionally verified ([`checksum`]); add-ons
//!    also have their packaged manifest read ([`manifest`]).
//! 3. Every target versions file is loaded, updated ([`updater`], [`addons`])
//!    and saved ([`document`]).
//! 4. After the change is committed, [`release_state::compute`] tells later
//!    steps what was released.
//!
//! ## Example
//!
//! ```ignore
//! use std::path::PathBuf;
//! use zapadmin::checksum::Sha2Checksums;
//! use zapadmin::download::HttpsDownloader;
//! use zapadmin::updater::{self, AddOnUpdate, ReleaseSource, UpdateContext};
//!
//! let downloader = HttpsDownloader::new()?;
//! let into = [PathBuf::from("ZapVersions-dev.xml")];
//! let ctx = UpdateContext {
//!     into: &into,
//!     checksum_algorithm: "SHA-256",
//!     checksums: &Sha2Checksums,
//!     downloader: &downloader,
//!     download_dir: "build/downloads".as_ref(),
//! };
//! let update = AddOnUpdate {
//!     source: ReleaseSource::File("ascanrules-release-61.zap".into()),
//!     download_url: Some("https://example.org/ascanrules-release-61.zap".into()),
//!     release_date: chrono::Utc::now().date_naive(),
//! };
//! updater::update_add_on(&ctx, &update, &mut reporter)?;
//! ```
//!
//! ## Modules
//!
//! - [`document`]: Versions file tree, keys, load and save
//! - [`keys`]: Well-known keys (`core.*`, `addon_<id>`)
//! - [`addons`]: Add-on entries and the sorted merge
//! - [`manifest`]: Add-on entry from the manifest packaged in an add-on
//! - [`checksum`]: File digests and verification
//! - [`download`]: HTTPS downloads and released add-on downloads
//! - [`updater`]: Daily, main, add-on and batch release updates
//! - [`release_state`]: Release state from the git history
//! - [`verify`]: Consistency of the `core` entries across files
//! - [`error`]: Error type shared by all of the above

pub mod addons;

pub mod checksum;

pub mod document;

/// HTTPS downloads of release files.
pub mod download;

pub mod error;

pub mod keys;

pub mod manifest;

/// Release state of the head commit.
pub mod release_state;

/// Updates of versions files with new releases.
pub mod updater;

pub mod verify;

/// Release state and add-on release request types.
/// Re-exported from zapadmin-types microcrate.
pub use zapadmin_types as types;

/// Release state file persistence.
/// Re-exported from zapadmin-state microcrate.
pub use zapadmin_state as state;

/// Git history access through the `git` binary.
/// Re-exported from zapadmin-git microcrate.
pub use zapadmin_git as git;

pub use document::{Document, Key, Node};
pub use error::{Error, Result};
pub use updater::Reporter;

/// Property-based tests for versions file invariants.
#[cfg(test)]
mod property_tests;

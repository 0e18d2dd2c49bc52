//! Updates of versions files with daily, main and add-on releases.
//!
//! Every flow checks its preconditions first (checksum algorithm, HTTPS
//! URLs, exactly one release source), then prepares the release file and
//! finally loads, mutates and saves each target versions file in turn.
//!
//! Files are updated one after the other: when one fails, the files before
//! it stay updated and the ones after it are not touched.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use zapadmin_types::AddOnReleaseData;

use crate::addons::{self, AddOnEntry};
use crate::checksum::ChecksumService;
use crate::document::Document;
use crate::download::{
    ADD_ON_EXTENSION, DAILY_RELEASE_EXTENSION, Downloader, download_file, ensure_https,
    extract_file_name,
};
use crate::error::{Error, Result};
use crate::keys::{self, Platform};
use crate::manifest;

pub trait Reporter {
    fn info(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

const DAILY_VERSION_PREFIX: &str = "D-";
const VERSION_TOKEN: &str = "@@VERSION@@";
const VERSION_UNDERSCORES_TOKEN: &str = "@@VERSION_UNDERSCORES@@";

/// Where a release file comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseSource {
    File(PathBuf),
    Url(String),
}

impl ReleaseSource {
    /// Exactly one of `file` or `url` must be given.
    pub fn from_options(file: Option<PathBuf>, url: Option<String>) -> Result<Self> {
        match (file, url) {
            (Some(_), Some(_)) => Err(Error::AmbiguousSource),
            (Some(file), None) => Ok(Self::File(file)),
            (None, Some(url)) => Ok(Self::Url(url)),
            (None, None) => Err(Error::MissingSource),
        }
    }
}

/// A release file as written under `core.<platform>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseFile {
    pub file_name: String,
    pub url: String,
    pub hash: String,
    pub size: u64,
}

impl ReleaseFile {
    fn write(&self, document: &mut Document, platform: Platform) {
        document.set_property(&platform.file(), self.file_name.as_str());
        document.set_property(&platform.hash(), self.hash.as_str());
        document.set_property(&platform.size(), self.size.to_string());
        document.set_property(&platform.url(), self.url.as_str());
    }
}

/// Services and targets shared by all update flows.
pub struct UpdateContext<'a> {
    /// Versions files to update.
    pub into: &'a [PathBuf],
    /// Algorithm name, also the prefix of written hashes.
    pub checksum_algorithm: &'a str,
    pub checksums: &'a dyn ChecksumService,
    pub downloader: &'a dyn Downloader,
    /// Directory release files are downloaded into.
    pub download_dir: &'a Path,
}

impl UpdateContext<'_> {
    fn validate(&self) -> Result<()> {
        if self.checksum_algorithm.is_empty() {
            return Err(Error::Validation(
                "the checksum algorithm must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Load, mutate and save every target file, stopping at the first error.
    pub fn update_files(
        &self,
        reporter: &mut dyn Reporter,
        mut mutation: impl FnMut(&mut Document) -> Result<()>,
    ) -> Result<()> {
        self.validate()?;

        for file in self.into {
            if !file.is_file() {
                return Err(Error::NotARegularFile { path: file.clone() });
            }

            let mut document = Document::load_file(file)?;
            mutation(&mut document)?;
            document.save_file(file)?;
            reporter.info(&format!("updated {}", file.display()));
        }
        Ok(())
    }

    fn fetch(
        &self,
        url: &str,
        extension: Option<&str>,
        reporter: &mut dyn Reporter,
    ) -> Result<PathBuf> {
        let file_name = extract_file_name(url, extension)?;
        download_file(
            self.downloader,
            url,
            &self.download_dir.join(file_name),
            reporter,
        )
    }

    fn release_file(&self, path: &Path, url: String, expected: Option<&str>) -> Result<ReleaseFile> {
        let digest = self
            .checksums
            .verify(path, self.checksum_algorithm, expected)?;
        Ok(ReleaseFile {
            file_name: file_name_of(path)?,
            url,
            hash: format!("{}:{digest}", self.checksum_algorithm),
            size: file_size(path)?,
        })
    }
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::NotARegularFile {
            path: path.to_path_buf(),
        })
}

fn file_size(path: &Path) -> Result<u64> {
    Ok(fs::metadata(path).map_err(|e| Error::io(path, e))?.len())
}

fn existing_file(path: &Path) -> Result<PathBuf> {
    if !path.is_file() {
        return Err(Error::NotARegularFile {
            path: path.to_path_buf(),
        });
    }
    Ok(path.to_path_buf())
}

fn require_non_empty(value: &str, name: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Validation(format!("the {name} must not be empty")));
    }
    Ok(())
}

/// Version of a weekly release from its file name, from `D-` up to `.zip`
/// (`ZAP_D-2024-01-15.zip` is `D-2024-01-15`).
pub fn daily_version_from_file_name(file_name: &str) -> Result<String> {
    let begin = file_name
        .find(DAILY_VERSION_PREFIX)
        .ok_or_else(|| Error::MalformedFileName {
            file_name: file_name.to_string(),
            marker: "daily prefix",
            expected: DAILY_VERSION_PREFIX,
        })?;
    let end = file_name
        .find(DAILY_RELEASE_EXTENSION)
        .filter(|end| *end >= begin)
        .ok_or_else(|| Error::MalformedFileName {
            file_name: file_name.to_string(),
            marker: "extension",
            expected: DAILY_RELEASE_EXTENSION,
        })?;
    Ok(file_name[begin..end].to_string())
}

/// Weekly release to publish.
#[derive(Debug, Clone)]
pub struct DailyUpdate {
    pub source: ReleaseSource,
    /// Expected digest, required when downloading.
    pub checksum: Option<String>,
    /// Base URL the release directory and file name are appended to when
    /// updating from a local file.
    pub base_download_url: Option<String>,
}

/// Set `core.daily-version` and `core.daily` in every target file.
pub fn update_daily(
    ctx: &UpdateContext<'_>,
    update: &DailyUpdate,
    reporter: &mut dyn Reporter,
) -> Result<ReleaseFile> {
    ctx.validate()?;

    let (release, url, version) = match &update.source {
        ReleaseSource::File(path) => {
            let base_url = update.base_download_url.as_deref().unwrap_or_default();
            require_non_empty(base_url, "base download URL")?;
            let release = existing_file(path)?;
            let file_name = file_name_of(&release)?;
            let version = daily_version_from_file_name(&file_name)?;
            let url = format!("{base_url}{}/{file_name}", &version[DAILY_VERSION_PREFIX.len()..]);
            (release, url, version)
        }
        ReleaseSource::Url(url) => {
            if update.checksum.as_deref().is_none_or(str::is_empty) {
                return Err(Error::Validation(
                    "the checksum must be provided when downloading the file".to_string(),
                ));
            }
            ensure_https(url)?;
            let file_name = extract_file_name(url, Some(DAILY_RELEASE_EXTENSION))?;
            let version = daily_version_from_file_name(&file_name)?;
            let release = ctx.fetch(url, Some(DAILY_RELEASE_EXTENSION), reporter)?;
            (release, url.clone(), version)
        }
    };

    let file = ctx.release_file(&release, url, update.checksum.as_deref())?;

    ctx.update_files(reporter, |document| {
        document.set_property(&keys::core_daily_version(), version.as_str());
        file.write(document, Platform::Daily);
        Ok(())
    })?;
    Ok(file)
}

/// Main (stable) release to publish. Every value may contain the
/// `@@VERSION@@` and `@@VERSION_UNDERSCORES@@` tokens.
#[derive(Debug, Clone, Default)]
pub struct MainRelease {
    pub version: String,
    pub base_download_url: String,
    pub windows_file_name: String,
    pub linux_file_name: String,
    pub mac_file_name: String,
    pub release_notes: String,
    pub release_notes_url: String,
}

impl MainRelease {
    fn validate(&self) -> Result<()> {
        require_non_empty(&self.version, "version")?;
        require_non_empty(&self.base_download_url, "base download URL")?;
        require_non_empty(&self.windows_file_name, "Windows file name")?;
        require_non_empty(&self.linux_file_name, "Linux file name")?;
        require_non_empty(&self.mac_file_name, "macOS file name")?;
        require_non_empty(&self.release_notes, "release notes")?;
        require_non_empty(&self.release_notes_url, "release notes URL")
    }

    /// Replace the version tokens in `value`.
    pub fn expand(&self, value: &str) -> String {
        value
            .replace(VERSION_TOKEN, &self.version)
            .replace(VERSION_UNDERSCORES_TOKEN, &self.version.replace('.', "_"))
    }
}

/// Set `core.version`, the release notes and the windows, linux and mac
/// release files in every target file.
pub fn update_main(
    ctx: &UpdateContext<'_>,
    release: &MainRelease,
    reporter: &mut dyn Reporter,
) -> Result<Vec<(Platform, ReleaseFile)>> {
    release.validate()?;
    ctx.validate()?;

    let base_url = release.expand(&release.base_download_url);
    ensure_https(&base_url)?;

    let mut files = Vec::new();
    for (platform, name) in [
        (Platform::Windows, &release.windows_file_name),
        (Platform::Linux, &release.linux_file_name),
        (Platform::Mac, &release.mac_file_name),
    ] {
        let url = format!("{base_url}{}", release.expand(name));
        let path = ctx.fetch(&url, None, reporter)?;
        files.push((platform, ctx.release_file(&path, url, None)?));
    }

    let release_notes_url = release.expand(&release.release_notes_url);
    ctx.update_files(reporter, |document| {
        document.set_property(&keys::core_version(), release.version.as_str());
        document.set_property(&keys::core_release_notes(), release.release_notes.as_str());
        document.set_property(&keys::core_release_notes_url(), release_notes_url.as_str());
        for (platform, file) in &files {
            file.write(document, *platform);
        }
        Ok(())
    })?;
    Ok(files)
}

/// Add-on release to merge.
#[derive(Debug, Clone)]
pub struct AddOnUpdate {
    pub source: ReleaseSource,
    /// Where the add-on is published, defaults to the source URL.
    pub download_url: Option<String>,
    pub release_date: NaiveDate,
}

/// Merge the add-on into every target file.
pub fn update_add_on(
    ctx: &UpdateContext<'_>,
    update: &AddOnUpdate,
    reporter: &mut dyn Reporter,
) -> Result<AddOnEntry> {
    ctx.validate()?;

    let download_url = match (&update.source, &update.download_url) {
        (_, Some(url)) => url.clone(),
        (ReleaseSource::Url(url), None) => url.clone(),
        (ReleaseSource::File(_), None) => return Err(Error::MissingDownloadUrl),
    };
    require_non_empty(&download_url, "download URL")?;
    ensure_https(&download_url)?;

    let add_on = match &update.source {
        ReleaseSource::File(path) => existing_file(path)?,
        ReleaseSource::Url(url) => {
            ensure_https(url)?;
            ctx.fetch(url, Some(ADD_ON_EXTENSION), reporter)?
        }
    };

    let entry = add_on_entry(ctx, &add_on, &download_url, None, update.release_date)?;
    merge_into_files(ctx, &entry, reporter)?;
    Ok(entry)
}

fn add_on_entry(
    ctx: &UpdateContext<'_>,
    add_on: &Path,
    download_url: &str,
    expected_checksum: Option<&str>,
    release_date: NaiveDate,
) -> Result<AddOnEntry> {
    let digest = ctx
        .checksums
        .verify(add_on, ctx.checksum_algorithm, expected_checksum)?;
    let hash = format!("{}:{digest}", ctx.checksum_algorithm);
    manifest::extract(add_on, download_url, &hash, release_date)
}

fn merge_into_files(
    ctx: &UpdateContext<'_>,
    entry: &AddOnEntry,
    reporter: &mut dyn Reporter,
) -> Result<()> {
    ctx.update_files(reporter, |document| {
        addons::merge(document, entry.clone());
        Ok(())
    })
}

/// Parse the add-on release request, `{"addons":[{"url":..,"checksum":..}]}`.
pub fn parse_release_data(json: &str) -> Result<AddOnReleaseData> {
    serde_json::from_str(json).map_err(|e| Error::Parse {
        what: "the add-on release data".to_string(),
        message: e.to_string(),
    })
}

/// Download, verify and merge every add-on of the request, returning the
/// commit description listing the released add-ons.
pub fn release_add_ons(
    ctx: &UpdateContext<'_>,
    data: &AddOnReleaseData,
    release_date: NaiveDate,
    reporter: &mut dyn Reporter,
) -> Result<String> {
    ctx.validate()?;
    for release in &data.add_ons {
        ensure_https(&release.url)?;
    }

    let mut released = Vec::new();
    for release in &data.add_ons {
        let add_on = ctx.fetch(&release.url, Some(ADD_ON_EXTENSION), reporter)?;
        let entry = add_on_entry(
            ctx,
            &add_on,
            &release.url,
            release.checksum.as_deref(),
            release_date,
        )?;
        released.push(format!(
            "\n - {} version {}",
            entry.name().unwrap_or(entry.id()),
            entry.version().unwrap_or_default()
        ));
        merge_into_files(ctx, &entry, reporter)?;
    }

    released.sort();
    let mut description = String::from("Release the following add-ons:");
    for line in released {
        description.push_str(&line);
    }
    Ok(description)
}

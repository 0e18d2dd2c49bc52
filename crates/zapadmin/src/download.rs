//! Release file downloads.
//!
//! Only HTTPS URLs are downloaded and a file already present at the
//! destination is reused. Downloads block and have no timeout.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use reqwest::Url;
use reqwest::blocking::Client;
use zapadmin_types::ReleaseState;

use crate::checksum::{ChecksumService, ChecksumString};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::keys;
use crate::updater::Reporter;

/// Extension of add-on files.
pub const ADD_ON_EXTENSION: &str = ".zap";
/// Extension of weekly release files.
pub const DAILY_RELEASE_EXTENSION: &str = ".zip";

/// Fetches a URL into a local file.
pub trait Downloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// [`Downloader`] backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpsDownloader {
    http: Client,
}

impl HttpsDownloader {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .user_agent(format!("zapadmin/{}", env!("CARGO_PKG_VERSION")))
            .timeout(None::<std::time::Duration>)
            .build()
            .map_err(|e| Error::HttpClient(e.to_string()))?;

        Ok(Self { http })
    }
}

impl Downloader for HttpsDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let download_error = |message: String| Error::Download {
            url: url.to_string(),
            message,
        };

        let mut response = self
            .http
            .get(url)
            .send()
            .map_err(|e| download_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(download_error(format!("unexpected status {status}")));
        }

        let tmp_path = dest.with_extension("part");
        let mut file = File::create(&tmp_path).map_err(|e| Error::io(&tmp_path, e))?;
        if let Err(e) = response.copy_to(&mut file) {
            drop(file);
            let _ = fs::remove_file(&tmp_path);
            return Err(download_error(e.to_string()));
        }
        drop(file);

        fs::rename(&tmp_path, dest).map_err(|e| Error::io(dest, e))?;
        Ok(())
    }
}

/// Fail unless `url` parses and uses the HTTPS scheme.
pub fn ensure_https(url: &str) -> Result<()> {
    let parsed = Url::parse(url)
        .map_err(|e| Error::Validation(format!("failed to parse the URL {url}: {e}")))?;
    if !parsed.scheme().eq_ignore_ascii_case("https") {
        return Err(Error::InsecureUrl {
            url: url.to_string(),
        });
    }
    Ok(())
}

/// The text after the last `/` of `url`, which must end with `extension`
/// when one is given.
pub fn extract_file_name(url: &str, extension: Option<&str>) -> Result<String> {
    let file_name = url
        .rsplit_once('/')
        .map(|(_, name)| name)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            Error::Validation(format!("the provided URL does not have a file name: {url}"))
        })?;

    if let Some(extension) = extension
        && !file_name.ends_with(extension)
    {
        return Err(Error::Validation(format!(
            "the provided URL does not have a file with {extension} extension: {file_name}"
        )));
    }
    Ok(file_name.to_string())
}

/// Download `url` to `dest`, reusing an existing file.
pub fn download_file(
    downloader: &dyn Downloader,
    url: &str,
    dest: &Path,
    reporter: &mut dyn Reporter,
) -> Result<PathBuf> {
    ensure_https(url)?;

    if dest.exists() {
        reporter.info(&format!(
            "file already exists at {}, skipping download",
            dest.display()
        ));
        return Ok(dest.to_path_buf());
    }

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    downloader.download(url, dest)?;
    reporter.info(&format!("file downloaded to: {}", dest.display()));
    Ok(dest.to_path_buf())
}

/// Read the ids allowed to be downloaded, one per line. Blank lines and
/// lines starting with `#` are ignored.
pub fn read_allowed_add_ons(path: &Path) -> Result<BTreeSet<String>> {
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

/// Download the add-ons released in `state` that are allowed, verifying each
/// against the hash recorded in `registry`.
///
/// Failures are reported and skipped. Returns the verified files.
pub fn download_released_add_ons(
    state: &ReleaseState,
    registry: &Document,
    allowed: &BTreeSet<String>,
    output_dir: &Path,
    downloader: &dyn Downloader,
    checksums: &dyn ChecksumService,
    reporter: &mut dyn Reporter,
) -> Result<Vec<PathBuf>> {
    let mut downloaded = Vec::new();

    for change in state.new_add_ons() {
        let id = change.id();
        if !allowed.contains(id) {
            reporter.info(&format!("add-on {id} is not allowed, skipping"));
            continue;
        }

        match download_add_on(registry, id, output_dir, downloader, checksums, reporter) {
            Ok(path) => downloaded.push(path),
            Err(e) => reporter.error(&format!("failed to download the add-on {id}: {e}")),
        }
    }

    Ok(downloaded)
}

fn download_add_on(
    registry: &Document,
    id: &str,
    output_dir: &Path,
    downloader: &dyn Downloader,
    checksums: &dyn ChecksumService,
    reporter: &mut dyn Reporter,
) -> Result<PathBuf> {
    let entry = keys::add_on_key(id);
    let url = registry
        .get_string(&entry.clone().child("url"))
        .ok_or_else(|| Error::Validation(format!("no download URL for add-on {id}")))?;
    let hash = registry
        .get_string(&entry.child("hash"))
        .ok_or_else(|| Error::Validation(format!("no hash for add-on {id}")))?;
    let checksum = ChecksumString::parse(hash)?;

    let file_name = extract_file_name(url, Some(ADD_ON_EXTENSION))?;
    let path = download_file(downloader, url, &output_dir.join(file_name), reporter)?;
    checksums.verify(&path, &checksum.algorithm, Some(&checksum.digest))?;
    Ok(path)
}

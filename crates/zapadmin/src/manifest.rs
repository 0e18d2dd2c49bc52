//! Builds an add-on entry from the manifest packaged in an add-on file.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::addons::AddOnEntry;
use crate::document::{Key, Node, parse_tree};
use crate::error::{Error, Result};
use crate::keys;

/// Name of the manifest entry inside an add-on file.
pub const MANIFEST_FILE_NAME: &str = "ZapAddOn.xml";

/// Status written when the manifest declares none.
pub const DEFAULT_STATUS: &str = "alpha";

const DEPENDENCY_FIELDS: [&str; 5] = [
    "id",
    "version",
    "semver",
    "not-before-version",
    "not-from-version",
];

/// Add-on id from a file name: the text before the first `.` and then
/// before the first `-` (`ascanrules-beta-42.zap` is `ascanrules`).
pub fn extract_add_on_id(file_name: &str) -> Result<String> {
    let (stem, _) = file_name
        .split_once('.')
        .ok_or_else(|| Error::MalformedFileName {
            file_name: file_name.to_string(),
            marker: "extension",
            expected: ".",
        })?;
    let id = stem.split('-').next().unwrap_or(stem);
    if id.is_empty() {
        return Err(Error::Validation(format!(
            "the file name does not start with an add-on id: {file_name}"
        )));
    }
    Ok(id.to_string())
}

/// Build the versions file entry of the add-on at `archive`.
///
/// Fields are only written when non-empty.
pub fn extract(
    archive: &Path,
    download_url: &str,
    checksum: &str,
    release_date: NaiveDate,
) -> Result<AddOnEntry> {
    let file_name = archive
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::NotARegularFile {
            path: archive.to_path_buf(),
        })?;
    let id = extract_add_on_id(&file_name)?;
    let size = std::fs::metadata(archive)
        .map_err(|e| Error::io(archive, e))?
        .len();
    let manifest = read_manifest(archive)?;

    let mut data = Node::new(keys::add_on_key(&id).to_string());
    append(&mut data, "name", text(&manifest, "name"));
    append(&mut data, "description", text(&manifest, "description"));
    append(&mut data, "author", text(&manifest, "author"));
    append(&mut data, "version", text(&manifest, "version"));
    append(&mut data, "semver", text(&manifest, "semver"));
    append(&mut data, "file", Some(file_name.as_str()));
    let status = match manifest.find(&Key::new("status")) {
        Some(node) => node.value().unwrap_or(""),
        None => DEFAULT_STATUS,
    };
    append(&mut data, "status", Some(status));
    append(&mut data, "changes", text(&manifest, "changes"));
    append(&mut data, "url", Some(download_url));
    append(&mut data, "hash", Some(checksum));
    append(&mut data, "info", text(&manifest, "url"));
    append(&mut data, "repo", text(&manifest, "repo"));
    append(&mut data, "date", Some(release_date.to_string().as_str()));
    append(&mut data, "size", Some(size.to_string().as_str()));
    append(&mut data, "not-before-version", text(&manifest, "not-before-version"));
    append(&mut data, "not-from-version", text(&manifest, "not-from-version"));
    append_dependencies(&manifest, &mut data);

    Ok(AddOnEntry::new(id, data))
}

fn text<'a>(manifest: &'a Node, name: &str) -> Option<&'a str> {
    manifest.get_string(&Key::new(name))
}

fn append(to: &mut Node, name: &str, value: Option<&str>) {
    append_at(to, &Key::new(name), value);
}

fn append_at(to: &mut Node, key: &Key, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        to.set_property(key, value);
    }
}

fn append_dependencies(manifest: &Node, to: &mut Node) {
    let Some(dependencies) = manifest.configuration_at(&Key::new("dependencies")) else {
        return;
    };

    append_at(
        to,
        &Key::new("dependencies").child("javaversion"),
        dependencies.get_string(&Key::new("javaversion")),
    );

    let add_ons = dependencies.configurations_at(&Key::new("addons").child("addon"));
    for (i, add_on) in add_ons.into_iter().enumerate() {
        let base = Key::new("dependencies").child("addons").indexed("addon", i);
        for field in DEPENDENCY_FIELDS {
            append_at(
                to,
                &base.clone().child(field),
                add_on.get_string(&Key::new(field)),
            );
        }
    }
}

fn read_manifest(archive: &Path) -> Result<Node> {
    let invalid = |message: String| Error::InvalidAddOn {
        path: archive.to_path_buf(),
        message,
    };

    let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
    let mut zip = ZipArchive::new(file).map_err(|e| invalid(e.to_string()))?;
    let mut entry = match zip.by_name(MANIFEST_FILE_NAME) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return Err(Error::MissingManifest {
                path: archive.to_path_buf(),
            });
        }
        Err(e) => return Err(invalid(e.to_string())),
    };

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| invalid(e.to_string()))?;

    parse_tree(&xml, MANIFEST_FILE_NAME)
        .map_err(|e| invalid(format!("failed to parse the manifest: {e}")))
}

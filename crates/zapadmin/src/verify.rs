//! Consistency check of the `core` entries across versions files.

use std::path::{Path, PathBuf};

use crate::document::{Document, Node};
use crate::error::{Error, Result};
use crate::keys::{self, CORE_ELEMENT, Platform};
use crate::updater::Reporter;

const RELEASE_FILE_FIELDS: [&str; 4] = ["url", "file", "hash", "size"];

/// Dotted names of the `core` elements, in document order.
pub fn expected_core_elements() -> Vec<String> {
    let mut names = vec![
        CORE_ELEMENT.to_string(),
        keys::core_version().to_string(),
        keys::core_daily_version().to_string(),
    ];
    for platform in Platform::ALL {
        let key = platform.key().to_string();
        names.push(key.clone());
        names.extend(RELEASE_FILE_FIELDS.iter().map(|field| format!("{key}.{field}")));
    }
    names.push(keys::core_release_notes().to_string());
    names.push(keys::core_release_notes_url().to_string());
    names
}

/// The `core` subtree flattened into `(dotted name, value)` pairs in
/// document order. Elements without text have an empty value.
pub fn core_elements(document: &Document) -> Vec<(String, String)> {
    let mut elements = Vec::new();
    for core in document.configurations_at(&keys::core()) {
        flatten(core, core.name().to_string(), &mut elements);
    }
    elements
}

fn flatten(node: &Node, name: String, out: &mut Vec<(String, String)>) {
    out.push((name.clone(), node.value().unwrap_or_default().to_string()));
    for child in node.children() {
        flatten(child, format!("{name}.{}", child.name()), out);
    }
}

/// Check that every file has exactly the expected `core` elements and that
/// they carry the same values in all files.
pub fn verify_core_entries(files: &[PathBuf], reporter: &mut dyn Reporter) -> Result<()> {
    let Some((first, rest)) = files.split_first() else {
        return Err(Error::Validation(
            "at least one versions file must be provided".to_string(),
        ));
    };

    let expected = expected_core_elements();
    let reference = checked_core_elements(first, &expected)?;
    reporter.info(&format!("{} core elements in {}", reference.len(), first.display()));

    for file in rest {
        let elements = checked_core_elements(file, &expected)?;
        if let Some(((name, value), (_, reference_value))) = elements
            .iter()
            .zip(&reference)
            .find(|(element, reference)| element != reference)
        {
            return Err(Error::InconsistentCore {
                path: file.clone(),
                message: format!(
                    "{name} is '{value}' but '{reference_value}' in {}",
                    first.display()
                ),
            });
        }
        reporter.info(&format!("{} matches {}", file.display(), first.display()));
    }
    Ok(())
}

fn checked_core_elements(file: &Path, expected: &[String]) -> Result<Vec<(String, String)>> {
    if !file.is_file() {
        return Err(Error::NotARegularFile {
            path: file.to_path_buf(),
        });
    }

    let elements = core_elements(&Document::load_file(file)?);
    let names: Vec<&str> = elements.iter().map(|(name, _)| name.as_str()).collect();
    if names != expected {
        return Err(Error::InconsistentCore {
            path: file.to_path_buf(),
            message: format!(
                "unexpected elements, expected [{}] but found [{}]",
                expected.join(", "),
                names.join(", ")
            ),
        });
    }
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updater::tests::CollectingReporter;
    use std::fs;
    use tempfile::tempdir;

    fn release_file(name: &str, size: u32) -> String {
        format!(
            "<{name}><url>https://example.org/{name}</url><file>{name}.bin</file>\
             <hash>SHA-256:abc</hash><size>{size}</size></{name}>"
        )
    }

    fn core_xml(version: &str) -> String {
        let mut xml = format!(
            "<ZAP><core><version>{version}</version><daily-version>D-2024-01-15</daily-version>"
        );
        for platform in ["daily", "windows32", "windows", "linux", "mac"] {
            xml.push_str(&release_file(platform, 10));
        }
        xml.push_str("<relnotes>Notes</relnotes><relnotes-url>https://example.org/notes</relnotes-url>");
        xml.push_str("</core><addon>a</addon></ZAP>");
        xml
    }

    #[test]
    fn expected_elements_layout() {
        let expected = expected_core_elements();
        assert_eq!(expected.len(), 3 + 5 * 5 + 2);
        assert_eq!(&expected[..5], ["core", "core.version", "core.daily-version", "core.daily", "core.daily.url"]);
        assert_eq!(expected.last().map(String::as_str), Some("core.relnotes-url"));
    }

    #[test]
    fn flattens_core_in_document_order() {
        let doc = Document::parse(&core_xml("2.14.0")).expect("parse");
        let elements = core_elements(&doc);

        assert_eq!(elements[0], ("core".to_string(), String::new()));
        assert_eq!(elements[1], ("core.version".to_string(), "2.14.0".to_string()));
        let names: Vec<String> = elements.into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, expected_core_elements());
    }

    #[test]
    fn identical_files_pass() {
        let td = tempdir().expect("tempdir");
        let files = vec![td.path().join("a.xml"), td.path().join("b.xml")];
        for file in &files {
            fs::write(file, core_xml("2.14.0")).expect("write");
        }

        let mut reporter = CollectingReporter::default();
        verify_core_entries(&files, &mut reporter).expect("consistent");
        assert_eq!(reporter.infos.len(), 2);
    }

    #[test]
    fn differing_value_fails() {
        let td = tempdir().expect("tempdir");
        let files = vec![td.path().join("a.xml"), td.path().join("b.xml")];
        fs::write(&files[0], core_xml("2.14.0")).expect("write");
        fs::write(&files[1], core_xml("2.15.0")).expect("write");

        let err = verify_core_entries(&files, &mut CollectingReporter::default())
            .expect_err("inconsistent");
        match err {
            Error::InconsistentCore { path, message } => {
                assert_eq!(path, files[1]);
                assert!(message.contains("core.version is '2.15.0'"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_element_fails() {
        let td = tempdir().expect("tempdir");
        let file = td.path().join("a.xml");
        fs::write(&file, core_xml("2.14.0").replace("<relnotes>Notes</relnotes>", "")).expect("write");

        let err = verify_core_entries(&[file], &mut CollectingReporter::default())
            .expect_err("missing relnotes");
        assert!(matches!(err, Error::InconsistentCore { .. }));
    }

    #[test]
    fn no_files_is_a_validation_error() {
        let err = verify_core_entries(&[], &mut CollectingReporter::default()).expect_err("empty");
        assert!(err.is_validation());
    }
}

//! File digests written to and verified against `hash` elements.
//!
//! Hashes are stored as `<algorithm>:<hex digest>`, with the algorithm name
//! exactly as configured (e.g. `SHA-256:9f86d0...`).

use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::{Error, Result};

/// Digest algorithms accepted in configuration and stored hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl ChecksumAlgorithm {
    /// Parse a name such as `SHA-256` or `sha256`.
    pub fn from_name(name: &str) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(Error::Validation(
                "the checksum algorithm must not be empty".to_string(),
            ));
        }

        let normalized = name.trim().replace('-', "").to_ascii_uppercase();
        match normalized.as_str() {
            "SHA256" => Ok(Self::Sha256),
            "SHA384" => Ok(Self::Sha384),
            "SHA512" => Ok(Self::Sha512),
            _ => Err(Error::UnsupportedAlgorithm(name.to_string())),
        }
    }

    fn hash_file(self, path: &Path) -> Result<String> {
        match self {
            Self::Sha256 => hash_file::<Sha256>(path),
            Self::Sha384 => hash_file::<Sha384>(path),
            Self::Sha512 => hash_file::<Sha512>(path),
        }
    }
}

fn hash_file<D: Digest + io::Write>(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = D::new();
    io::copy(&mut file, &mut hasher).map_err(|e| Error::io(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Computes and verifies file digests.
pub trait ChecksumService {
    /// Hex digest of the file.
    fn digest(&self, file: &Path, algorithm: &str) -> Result<String>;

    /// Digest of the file, failing when `expected` is present, non-empty and
    /// different.
    fn verify(&self, file: &Path, algorithm: &str, expected: Option<&str>) -> Result<String> {
        let actual = self.digest(file, algorithm)?;
        match expected.filter(|e| !e.is_empty()) {
            Some(expected) if expected != actual => Err(Error::ChecksumMismatch {
                path: file.to_path_buf(),
                expected: expected.to_string(),
                actual,
            }),
            _ => Ok(actual),
        }
    }

    /// `<algorithm>:<digest>` as stored in versions files.
    fn checksum_string(&self, file: &Path, algorithm: &str) -> Result<String> {
        Ok(format!("{algorithm}:{}", self.digest(file, algorithm)?))
    }
}

/// SHA-2 backed [`ChecksumService`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha2Checksums;

impl ChecksumService for Sha2Checksums {
    fn digest(&self, file: &Path, algorithm: &str) -> Result<String> {
        ChecksumAlgorithm::from_name(algorithm)?.hash_file(file)
    }
}

/// A stored hash split into algorithm and digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumString {
    pub algorithm: String,
    pub digest: String,
}

impl ChecksumString {
    pub fn parse(hash: &str) -> Result<Self> {
        match hash.split_once(':') {
            Some((algorithm, digest)) if !algorithm.is_empty() && !digest.is_empty() => {
                Ok(Self {
                    algorithm: algorithm.to_string(),
                    digest: digest.to_string(),
                })
            }
            _ => Err(Error::Validation(format!(
                "the hash is not in the form <algorithm>:<digest>: {hash}"
            ))),
        }
    }
}

impl fmt::Display for ChecksumString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn algorithm_names_are_lenient() {
        for name in ["SHA-256", "sha-256", "SHA256", "sha256"] {
            assert_eq!(
                ChecksumAlgorithm::from_name(name).expect("parse"),
                ChecksumAlgorithm::Sha256
            );
        }
        assert_eq!(
            ChecksumAlgorithm::from_name("SHA-512").expect("parse"),
            ChecksumAlgorithm::Sha512
        );
    }

    #[test]
    fn empty_algorithm_is_validation_error() {
        let err = ChecksumAlgorithm::from_name("").expect_err("empty");
        assert!(err.is_validation());
    }

    #[test]
    fn unknown_algorithm_is_unsupported() {
        let err = ChecksumAlgorithm::from_name("MD5").expect_err("md5");
        assert!(matches!(err, Error::UnsupportedAlgorithm(name) if name == "MD5"));
    }

    #[test]
    fn digest_of_known_content() {
        let td = tempdir().expect("tempdir");
        let file = td.path().join("hello.txt");
        fs::write(&file, "hello").expect("write");

        let digest = Sha2Checksums.digest(&file, "SHA-256").expect("digest");
        assert_eq!(digest, HELLO_SHA256);
        assert_eq!(
            Sha2Checksums.checksum_string(&file, "SHA-256").expect("checksum"),
            format!("SHA-256:{HELLO_SHA256}")
        );
    }

    #[test]
    fn verify_accepts_own_digest_and_absent_expectation() {
        let td = tempdir().expect("tempdir");
        let file = td.path().join("a.zap");
        fs::write(&file, b"add-on bytes").expect("write");

        let digest = Sha2Checksums.digest(&file, "SHA-256").expect("digest");
        assert_eq!(
            Sha2Checksums
                .verify(&file, "SHA-256", Some(&digest))
                .expect("verify"),
            digest
        );
        assert_eq!(
            Sha2Checksums.verify(&file, "SHA-256", None).expect("verify"),
            digest
        );
        assert_eq!(
            Sha2Checksums.verify(&file, "SHA-256", Some("")).expect("verify"),
            digest
        );
    }

    #[test]
    fn verify_rejects_wrong_digest() {
        let td = tempdir().expect("tempdir");
        let file = td.path().join("a.zap");
        fs::write(&file, b"add-on bytes").expect("write");

        let err = Sha2Checksums
            .verify(&file, "SHA-256", Some("deadbeef"))
            .expect_err("mismatch");
        match err {
            Error::ChecksumMismatch {
                path,
                expected,
                actual,
            } => {
                assert_eq!(path, file);
                assert_eq!(expected, "deadbeef");
                assert_eq!(actual.len(), 64);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let td = tempdir().expect("tempdir");
        let err = Sha2Checksums
            .digest(&td.path().join("missing"), "SHA-256")
            .expect_err("missing");
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn checksum_string_parse() {
        let parsed = ChecksumString::parse("SHA-256:abc:def").expect("parse");
        assert_eq!(parsed.algorithm, "SHA-256");
        assert_eq!(parsed.digest, "abc:def");
        assert_eq!(parsed.to_string(), "SHA-256:abc:def");

        assert!(ChecksumString::parse("abc").is_err());
        assert!(ChecksumString::parse(":abc").is_err());
    }
}

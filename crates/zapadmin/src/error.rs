use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while maintaining versions files and computing release state.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("the provided URL does not use HTTPS scheme: {url}")]
    InsecureUrl { url: String },

    #[error("only one of the sources, URL or file, can be set at the same time")]
    AmbiguousSource,

    #[error("either one of the sources, URL or file, must be set")]
    MissingSource,

    #[error("the download URL must be provided when specifying the file")]
    MissingDownloadUrl,

    #[error("the provided path does not exist or it's not a file: {path}")]
    NotARegularFile { path: PathBuf },

    #[error("checksums do not match for: {path}\nExpected:\n{expected}\nActual:\n{actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("the file name does not have the expected {marker} ('{expected}'): {file_name}")]
    MalformedFileName {
        file_name: String,
        marker: &'static str,
        expected: &'static str,
    },

    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("the specified add-on does not have the manifest: {path}")]
    MissingManifest { path: PathBuf },

    #[error("invalid add-on {path}: {message}")]
    InvalidAddOn { path: PathBuf, message: String },

    #[error("an error occurred while using the Git repository: {0}")]
    GitRead(String),

    #[error("common ancestor not found between {first} and {second}")]
    AncestorNotFound { first: String, second: String },

    #[error("file not found in the current commit: {path}")]
    FileNotFoundInCommit { path: String },

    #[error("core entries of {path} differ: {message}")]
    InconsistentCore { path: PathBuf, message: String },

    #[error("unsupported checksum algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("failed to download {url}: {message}")]
    Download { url: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Whether the error is a precondition failure raised before any
    /// versions file is read or written.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::InsecureUrl { .. }
                | Error::AmbiguousSource
                | Error::MissingSource
                | Error::MissingDownloadUrl
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

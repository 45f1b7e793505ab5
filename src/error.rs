use thiserror::Error;

/// Why a downloaded body was refused before anything was written to the cache.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("empty response")]
    EmptyResponse,

    #[error("remote ZIP does not exist (HTML page returned)")]
    HtmlPage,

    #[error("response is not a valid ZIP file")]
    NotZip,

    #[error("HTTP error: {0}")]
    Status(reqwest::StatusCode),
}

/// Archive-level failures that abandon a whole period.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("corrupted zip file {path}: {source}")]
    BadZip {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("entry {0} not found in archive")]
    MissingEntry(String),

    #[error("I/O error reading archive: {0}")]
    Io(#[from] std::io::Error),
}

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AedictError>;

#[derive(Error, Debug)]
pub enum AedictError {
    #[error(
        "Failed to create directory '{}'. Please make sure that the storage is mounted and is not write-protected.",
        path.display()
    )]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Transfer(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("Download was cancelled")]
    Cancelled,

    #[error("Malformed catalog line '{line}': {reason}")]
    CatalogParse { line: String, reason: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Home directory not found")]
    HomeDirectoryNotFound,

    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Dictionary '{name}' is not available for download")]
    DictionaryNotFound { name: String },

    #[error("Failed to download dictionary {name}: {message}")]
    DownloadFailed { name: String, message: String },

    #[error("Dictionary '{name}' is not installed")]
    DictionaryMissing { name: String },

    #[error("Kanji '{kanji}' not found in the index")]
    KanjiNotFound { kanji: char },

    #[error("Invalid dictionary entry: {message}")]
    InvalidEntry { message: String },
}

impl AedictError {
    pub fn config_error<S: Into<String>>(message: S) -> Self {
        AedictError::Config {
            message: message.into(),
        }
    }

    pub fn catalog_parse<L: Into<String>, R: Into<String>>(line: L, reason: R) -> Self {
        AedictError::CatalogParse {
            line: line.into(),
            reason: reason.into(),
        }
    }

    /// True for the cooperative cancellation signal, which is never
    /// reported to the user as a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AedictError::Cancelled)
    }
}

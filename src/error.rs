use camino::Utf8PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum RocError {
    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("ROC request failed: {0}")]
    Http(String),

    #[error("ROC API returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("failed to write raw splits to {path}: {message}")]
    OutputWrite { path: Utf8PathBuf, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

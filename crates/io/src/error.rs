use std::path::PathBuf;

use kaitz_recon::PanelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{}: {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("{}: {error}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        error: csv::Error,
    },

    #[error("{}: {error}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        error: zip::result::ZipError,
    },

    #[error("{}: {message}", path.display())]
    Excel { path: PathBuf, message: String },

    #[error("invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("source '{source_name}': no files match {patterns:?}")]
    NoFiles {
        source_name: String,
        patterns: Vec<String>,
    },

    #[error("{}: missing column '{column}'", path.display())]
    MissingHeader { path: PathBuf, column: String },

    #[error("{}: line {line}: {message}", path.display())]
    Field {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("source '{source_name}' failed to load: {message}")]
    SourceFailed { source_name: String, message: String },

    #[error("report serialization: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Panel(#[from] PanelError),
}

impl LoadError {
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            error,
        }
    }

    pub fn field(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Field {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

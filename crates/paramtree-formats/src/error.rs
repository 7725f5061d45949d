//! Error types for paramtree-formats

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Filesystem error: {0}")]
    Fs(#[from] paramtree_fs::Error),

    #[error("Failed to parse {source_name}, line {line}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("Failed to parse JSON config {source_name}: {message}")]
    Json { source_name: String, message: String },

    #[error("Cannot export {name}: {message}")]
    Export { name: String, message: String },

    #[error("No storage format for {path}")]
    UnsupportedFormat { path: String },
}

impl Error {
    pub fn parse(source_name: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            line,
            message: message.into(),
        }
    }
}

/// Failure of an import: either the input is malformed or the client
/// rejected an element.
#[derive(Debug)]
pub enum ImportError<E> {
    Format(Error),
    Client(E),
}

impl<E> From<Error> for ImportError<E> {
    fn from(error: Error) -> Self {
        ImportError::Format(error)
    }
}

impl<E: fmt::Display> fmt::Display for ImportError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Format(e) => write!(f, "{e}"),
            ImportError::Client(e) => write!(f, "{e}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for ImportError<E> {}

impl From<ImportError<std::convert::Infallible>> for Error {
    fn from(error: ImportError<std::convert::Infallible>) -> Self {
        match error {
            ImportError::Format(e) => e,
            ImportError::Client(never) => match never {},
        }
    }
}

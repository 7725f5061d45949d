//! Error types for paramtree-core

use paramtree_formats::ImportError;

use crate::container::RefreshResult;

/// Result type for paramtree-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in paramtree-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A top-level config could not be located in any search directory
    #[error("Configuration not found: {name}")]
    ConfigNotFound { name: String },

    /// An include chain revisits a file that is still being loaded
    #[error("Include cycle: {}", chain.join(" -> "))]
    IncludeCycle { chain: Vec<String> },

    /// A reference or inheritance chain revisits a name on the resolution stack
    #[error("Reference cycle: {}", chain.join(" -> "))]
    ReferenceCycle { chain: Vec<String> },

    /// A name or slot registered twice in incompatible ways
    #[error("Duplicate registration of {name}: {reason}")]
    DuplicateRegistration { name: String, reason: String },

    /// Loaded elements contradict each other
    #[error("Conflict while loading: {message}")]
    Conflict { message: String },

    /// Malformed command line
    #[error("Command line error: {message}")]
    Cmdline { message: String },

    /// Contradictory saver options
    #[error("Invalid save options: {message}")]
    SaveOptions { message: String },

    /// Refresh in strict checking mode found problems
    #[error("Refresh failed:\n{report}")]
    RefreshFailed { report: Box<RefreshResult> },

    /// Misuse of the process-wide container
    #[error("Global container: {message}")]
    Global { message: String },

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from paramtree-fs
    #[error(transparent)]
    Fs(#[from] paramtree_fs::Error),

    /// Data model error from paramtree-meta
    #[error(transparent)]
    Meta(#[from] paramtree_meta::Error),

    /// Format error from paramtree-formats
    #[error(transparent)]
    Format(#[from] paramtree_formats::Error),
}

impl Error {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn cmdline(message: impl Into<String>) -> Self {
        Self::Cmdline {
            message: message.into(),
        }
    }
}

impl From<ImportError<Error>> for Error {
    fn from(error: ImportError<Error>) -> Self {
        match error {
            ImportError::Format(e) => Error::Format(e),
            ImportError::Client(e) => e,
        }
    }
}

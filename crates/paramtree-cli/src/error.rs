//! Error types for paramtree-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] paramtree_core::Error),

    #[error(transparent)]
    Formats(#[from] paramtree_formats::Error),

    #[error(transparent)]
    Meta(#[from] paramtree_meta::Error),

    #[error(transparent)]
    Fs(#[from] paramtree_fs::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A check ran to completion and found problems.
    #[error("{count} problem(s) found")]
    Problems { count: usize },

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }
}

//! Failures reading or writing config and settings files

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file system refused an operation on `path`.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A settings file exists but its contents do not deserialize.
    #[error("{path} is not valid {format}: {message}")]
    SettingsParse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("cannot write settings to {path} as {format}: {message}")]
    SettingsSerialize {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    /// Settings files are recognized by a `.toml` or `.json` suffix only.
    #[error("no settings format for extension '{extension}'")]
    UnsupportedFormat { extension: String },

    /// Another writer holds the staged file.
    #[error("{path} is locked by another writer")]
    Locked { path: PathBuf },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

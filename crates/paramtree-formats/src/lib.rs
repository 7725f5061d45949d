//! Config file formats for paramtree
//!
//! Every format has an importer, which feeds [`LoadedElement`]s one at a
//! time into an [`ImporterClient`], and an exporter, which writes a whole
//! [`LoadedData`] back out. Exporters group parameters into a tree of
//! namespaces and fact blocks so that the output reads like a hand-written
//! file.
//!
//! [`LoadedElement`]: paramtree_meta::LoadedElement

pub mod cstyle;
pub mod error;
pub mod factory;
pub mod json;
mod tree;

pub use cstyle::{CstyleExporter, CstyleImporter};
pub use error::{Error, ImportError, Result};
pub use factory::{ExporterFactory, PIN_VERSION_ENV};
pub use json::{JsonExporter, JsonImporter};

use paramtree_fs::NormalizedPath;
use paramtree_meta::{ConfigFormat, ImporterClient, LoadedData, StorageLocation};

/// Reads one config source and hands its elements to a client in order.
pub trait Importer {
    fn import<C>(&mut self, client: &mut C) -> std::result::Result<(), ImportError<C::Error>>
    where
        C: ImporterClient + ?Sized;
}

/// Renders loaded data in one storage format.
pub trait Exporter: Send + Sync {
    fn format(&self) -> ConfigFormat;

    fn export(&self, data: &LoadedData) -> Result<String>;

    /// Problems that did not prevent the export, e.g. constructs the
    /// pinned format version cannot express.
    fn diagnostics(&self, _data: &LoadedData) -> Vec<String> {
        Vec::new()
    }
}

/// Import text of a known format into `client`.
///
/// `location` stamps every element; it names the source in parse errors
/// when it is file-backed.
pub fn import_str<C>(
    format: ConfigFormat,
    text: &str,
    location: StorageLocation,
    client: &mut C,
) -> std::result::Result<(), ImportError<C::Error>>
where
    C: ImporterClient + ?Sized,
{
    match format {
        ConfigFormat::Cstyle => CstyleImporter::from_text(text, location).import(client),
        ConfigFormat::Json => JsonImporter::from_text(text, location).import(client),
    }
}

/// Import the file behind a file-backed location.
pub fn import_location<C>(
    location: &StorageLocation,
    client: &mut C,
) -> std::result::Result<(), ImportError<C::Error>>
where
    C: ImporterClient + ?Sized,
{
    let path = location.full_file_path().ok_or_else(|| Error::UnsupportedFormat {
        path: location.describe(),
    })?;
    let format = location.format.ok_or_else(|| Error::UnsupportedFormat {
        path: path.to_string(),
    })?;
    let text = paramtree_fs::io::read_text(&path).map_err(Error::from)?;
    tracing::debug!(path = %path, %format, "importing config");
    import_str(format, &text, location.clone(), client)
}

/// Load a single config file into fresh [`LoadedData`].
pub fn load_file(path: &NormalizedPath) -> Result<LoadedData> {
    let location = StorageLocation::from_file_path(path).ok_or_else(|| Error::UnsupportedFormat {
        path: path.to_string(),
    })?;
    let mut data = LoadedData::new();
    import_location(&location, &mut data)?;
    Ok(data)
}

/// Export `data` and write it atomically to `path`, whose extension picks
/// the format.
pub fn save_file(factory: &ExporterFactory, data: &LoadedData, path: &NormalizedPath) -> Result<()> {
    let format = path
        .file_name()
        .and_then(ConfigFormat::from_file_name)
        .ok_or_else(|| Error::UnsupportedFormat {
            path: path.to_string(),
        })?;
    let text = factory.exporter(format).export(data)?;
    paramtree_fs::io::write_atomic(path, text.as_bytes())?;
    tracing::info!(path = %path, %format, "saved config");
    Ok(())
}

//! Command implementations for paramtree-cli

pub mod check;
pub mod convert;
pub mod diff;
pub mod dump;
pub mod templates;

pub use check::run_check;
pub use convert::{run_convert, run_normalize};
pub use diff::run_diff;
pub use dump::run_dump;
pub use templates::{run_instantiate, run_templates};

use std::path::Path;

use paramtree_core::Container;
use paramtree_fs::NormalizedPath;

use crate::error::{CliError, Result};

/// Load `config` into the container, as a file if such a file exists and
/// as a config name otherwise.
pub(crate) fn load_config(container: &mut Container, config: &str) -> Result<()> {
    let path = Path::new(config);
    if path.is_file() {
        container.load_file(&NormalizedPath::new(path))?;
    } else {
        container.load(config)?;
    }
    Ok(())
}

/// Load a single file on its own, without following includes.
pub(crate) fn load_data(path: &Path) -> Result<paramtree_meta::LoadedData> {
    if !path.is_file() {
        return Err(CliError::user(format!("{} is not a file", path.display())));
    }
    Ok(paramtree_formats::load_file(&NormalizedPath::new(path))?)
}

//! Convert and normalize command implementations
//!
//! Both go through a full import and export of a single file; includes are
//! not followed.

use std::path::{Path, PathBuf};

use colored::Colorize;
use paramtree_formats::ExporterFactory;
use paramtree_fs::NormalizedPath;
use paramtree_meta::ConfigFormat;

use super::load_data;
use crate::error::Result;
use crate::settings::Settings;

/// Output path with the settings' save format extension appended when the
/// given name has no known one.
pub(crate) fn output_path(settings: &Settings, output: &Path) -> PathBuf {
    let known = output
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(ConfigFormat::from_file_name)
        .is_some();
    if known {
        return output.to_path_buf();
    }
    let mut name = output.as_os_str().to_os_string();
    name.push(settings.save_format().extension());
    PathBuf::from(name)
}

/// Run the convert command
pub fn run_convert(settings: &Settings, input: &Path, output: &Path) -> Result<()> {
    let data = load_data(input)?;
    let output = output_path(settings, output);
    paramtree_formats::save_file(&ExporterFactory::from_env(), &data, &NormalizedPath::new(&output))?;
    println!(
        "{} {} -> {}",
        "Converted".green().bold(),
        input.display(),
        output.display().to_string().yellow()
    );
    Ok(())
}

/// Run the normalize command
pub fn run_normalize(config: &Path) -> Result<()> {
    let data = load_data(config)?;
    paramtree_formats::save_file(&ExporterFactory::from_env(), &data, &NormalizedPath::new(config))?;
    println!("{} {}", "Normalized".green().bold(), config.display());
    Ok(())
}

//! Template listing and instantiation

use std::path::Path;

use colored::Colorize;
use paramtree_formats::ExporterFactory;
use paramtree_fs::NormalizedPath;
use paramtree_meta::{LoadedData, LoadedParameter, TemplateSpec};

use super::load_data;
use crate::error::Result;

/// Templates of `data`, all of them or those directly below `prefix`.
pub(crate) fn find_templates(data: &LoadedData, prefix: Option<&str>) -> Vec<TemplateSpec> {
    match prefix {
        Some(prefix) => data.list_templates(prefix),
        None => data.template_specs(),
    }
}

/// Run the templates command
pub fn run_templates(config: &Path, prefix: Option<&str>) -> Result<()> {
    let data = load_data(config)?;
    let specs = find_templates(&data, prefix);
    if specs.is_empty() {
        println!("{}", "No subconfig templates.".dimmed());
        return Ok(());
    }
    for spec in specs {
        println!(
            "{}  {}",
            spec.name.bold(),
            format!("({} instance name(s))", spec.arity()).dimmed()
        );
    }
    Ok(())
}

/// Instantiate `spec_name` in `data`, returning the parameters it produced.
pub(crate) fn instantiate(data: &mut LoadedData, spec_name: &str, instances: &[&str]) -> Result<Vec<LoadedParameter>> {
    let spec = data
        .template_specs()
        .into_iter()
        .find(|s| s.name == spec_name)
        .ok_or_else(|| paramtree_meta::Error::UnknownTemplate {
            spec: spec_name.to_string(),
        })?;
    let produced = data.instantiate(&spec, instances)?;
    data.instantiate_template(&spec, instances)?;
    Ok(produced)
}

/// Run the instantiate command
pub fn run_instantiate(config: &Path, spec: &str, instances: &[String], write: bool) -> Result<()> {
    let mut data = load_data(config)?;
    let instances: Vec<&str> = instances.iter().map(String::as_str).collect();
    let produced = instantiate(&mut data, spec, &instances)?;

    for parameter in &produced {
        println!("  {} {} = {}", "+".green(), parameter.metadata.name, parameter.value);
    }
    if write {
        paramtree_formats::save_file(&ExporterFactory::from_env(), &data, &NormalizedPath::new(config))?;
        println!("{} {}", "Updated".green().bold(), config.display());
    }
    Ok(())
}

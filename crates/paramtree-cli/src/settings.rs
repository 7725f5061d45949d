//! Per-user defaults for the CLI
//!
//! Read from `<config dir>/paramtree/settings.toml` unless `--settings`
//! points elsewhere. Command-line flags always win.

use std::collections::BTreeMap;
use std::path::Path;

use paramtree_core::{CheckingMode, Container, ContainerOptions};
use paramtree_fs::{ConfigStore, NormalizedPath};
use paramtree_meta::ConfigFormat;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub facts: BTreeMap<String, String>,
    pub search_paths: Vec<String>,
    pub checking_mode: Option<CheckingMode>,
    pub save_format: Option<ConfigFormat>,
}

impl Settings {
    /// Load `explicit` if given (it must exist), else the per-user file if
    /// present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let store = ConfigStore::new();
        if let Some(path) = explicit {
            return Ok(store.load(&NormalizedPath::new(path))?);
        }
        match default_path() {
            Some(path) => Ok(store.load_or_default(&path)?),
            None => Ok(Self::default()),
        }
    }

    pub fn save_format(&self) -> ConfigFormat {
        self.save_format.unwrap_or(ConfigFormat::Cstyle)
    }

    /// Container options from these settings, with command-line search
    /// directories after the configured ones.
    pub fn container_options(&self, extra_search: &[NormalizedPath], mode: Option<CheckingMode>) -> ContainerOptions {
        let mut options = ContainerOptions::new()
            .with_checking_mode(mode.or(self.checking_mode).unwrap_or_default())
            .with_extra_cmdline(true);
        for dir in &self.search_paths {
            options = options.with_search_path(NormalizedPath::new(dir));
        }
        for dir in extra_search {
            options = options.with_search_path(dir.clone());
        }
        options
    }

    /// Apply configured facts, then `NAME=VALUE` pairs from the command
    /// line, which replace configured values of the same fact.
    pub fn apply_facts(&self, container: &mut Container, pairs: &[String]) -> Result<()> {
        let mut facts = self.facts.clone();
        for pair in pairs {
            let (name, value) = parse_fact(pair)?;
            facts.insert(name.to_string(), value.to_string());
        }
        for (name, value) in &facts {
            container.set_fact(name, value)?;
        }
        Ok(())
    }
}

fn default_path() -> Option<NormalizedPath> {
    dirs::config_dir().map(|dir| NormalizedPath::new(dir.join("paramtree").join("settings.toml")))
}

fn parse_fact(pair: &str) -> Result<(&str, &str)> {
    pair.split_once('=')
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| CliError::user(format!("fact '{pair}' is not of the form NAME=VALUE")))
}

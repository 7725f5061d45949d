//! The runtime container
//!
//! A [`Container`] owns everything loaded from config files and every
//! registered parameter. The usual life cycle is:
//!
//! 1. [`Container::set_cmdline`] and [`Container::set_fact`]
//! 2. [`Container::load`] for each top-level config; includes follow
//! 3. [`Container::register`] for each section
//! 4. [`Container::refresh`] to resolve and write every parameter
//! 5. optionally [`crate::Saver::save`]
//!
//! Steps 2 and 3 may be interleaved; resolution only happens on refresh.

mod cmdline;
mod load;
mod refresh;
mod resolve;
mod templates;

pub use cmdline::Cmdline;
pub use refresh::RefreshResult;
pub use resolve::{ResolvedData, ResolvedValue};
pub(crate) use resolve::UNKNOWN_TARGET;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use paramtree_fs::NormalizedPath;
use paramtree_meta::{Facts, LoadedData, LoadedElement, ParameterSource, TemplateSpec};
use serde::{Deserialize, Serialize};

use crate::backend::{join_name, LegacyBackend, NamespacedBackend, RegistrationBackend};
use crate::error::{Error, Result};
use crate::section::{ConfigSection, Registrar, Registration, RegistrationSink};
use crate::subconfig::SubconfigHandle;

const WILDCARD: &str = "*";

/// How refresh treats mandatory parameters that have only a suggested
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckingMode {
    /// Report them as missing and fail the refresh on any problem.
    #[default]
    Strict,
    /// Use the suggested value and flag the container for saving.
    Autosave,
    /// Use the suggested value with a warning.
    Lenient,
}

impl FromStr for CheckingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "autosave" => Ok(Self::Autosave),
            "lenient" => Ok(Self::Lenient),
            other => Err(Error::cmdline(format!("unknown checking mode '{other}'"))),
        }
    }
}

impl fmt::Display for CheckingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Autosave => write!(f, "autosave"),
            Self::Lenient => write!(f, "lenient"),
        }
    }
}

/// Construction options of a [`Container`].
#[derive(Debug, Clone, Default)]
pub struct ContainerOptions {
    /// Application config directory, searched first for configs.
    pub config_dir: Option<NormalizedPath>,
    /// Searched after the config directory, before search paths declared
    /// in loaded files.
    pub search_paths: Vec<NormalizedPath>,
    pub checking_mode: CheckingMode,
    /// Whether stray command line tokens start the extra command line
    /// instead of being an error.
    pub allow_extra_cmdline: bool,
}

impl ContainerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_dir(mut self, dir: impl Into<NormalizedPath>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    pub fn with_search_path(mut self, dir: impl Into<NormalizedPath>) -> Self {
        self.search_paths.push(dir.into());
        self
    }

    pub fn with_checking_mode(mut self, mode: CheckingMode) -> Self {
        self.checking_mode = mode;
        self
    }

    pub fn with_extra_cmdline(mut self, allow: bool) -> Self {
        self.allow_extra_cmdline = allow;
        self
    }
}

/// A registered subconfig map and the instances already registered from
/// it.
struct SubconfigEntry {
    prefix: String,
    handle: Arc<dyn SubconfigHandle>,
    backend: Arc<dyn RegistrationBackend>,
    registered: Vec<String>,
}

/// Loaded config data plus registered parameters.
pub struct Container {
    options: ContainerOptions,
    facts: Facts,
    data: LoadedData,
    cmdline: Cmdline,
    registrations: Vec<Registration>,
    subconfigs: Vec<SubconfigEntry>,
    /// Search paths declared in loaded files, resolved against the
    /// declaring file's directory.
    search_paths: Vec<NormalizedPath>,
    missing_configs: Vec<String>,
    visited: HashSet<NormalizedPath>,
    loading: Vec<NormalizedPath>,
    removed_prefixes: Vec<String>,
    save_required: bool,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("options", &self.options)
            .field("facts", &self.facts)
            .field("elements", &self.data.len())
            .field("registrations", &self.registrations.len())
            .field("subconfigs", &self.subconfigs.len())
            .finish()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new(ContainerOptions::default())
    }
}

impl Container {
    pub fn new(options: ContainerOptions) -> Self {
        Self {
            options,
            facts: Facts::new(),
            data: LoadedData::new(),
            cmdline: Cmdline::default(),
            registrations: Vec::new(),
            subconfigs: Vec::new(),
            search_paths: Vec::new(),
            missing_configs: Vec::new(),
            visited: HashSet::new(),
            loading: Vec::new(),
            removed_prefixes: Vec::new(),
            save_required: false,
        }
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.options
    }

    pub fn checking_mode(&self) -> CheckingMode {
        self.options.checking_mode
    }

    pub fn facts(&self) -> &Facts {
        &self.facts
    }

    /// Facts must be set before loading the configs they select from.
    pub fn set_fact(&mut self, name: &str, value: &str) -> Result<()> {
        self.facts.add(name, value)?;
        Ok(())
    }

    /// Parse and store the command line, excluding the program name.
    pub fn set_cmdline<I, S>(&mut self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.cmdline = Cmdline::parse(args, self.options.allow_extra_cmdline)?;
        Ok(())
    }

    pub fn cmdline(&self) -> &Cmdline {
        &self.cmdline
    }

    pub fn extra_cmdline(&self) -> &[String] {
        self.cmdline.extra()
    }

    /// Merged elements of all loaded configs whose fact conditions hold.
    pub fn loaded_data(&self) -> &LoadedData {
        &self.data
    }

    /// Whether refresh used suggested values or found outdated metadata
    /// in autosave mode.
    pub fn is_save_required(&self) -> bool {
        self.save_required
    }

    pub(crate) fn clear_save_required(&mut self) {
        self.save_required = false;
    }

    // Registration

    /// Register `section` under `prefix` with the namespaced backend.
    pub fn register<S: ConfigSection + ?Sized>(&mut self, prefix: &str, section: &S) -> Result<()> {
        self.register_with(Arc::new(NamespacedBackend), prefix, section)
    }

    /// Register `section` under `prefix`, also picking up values stored
    /// under `legacy_prefix`.
    pub fn register_legacy<S: ConfigSection + ?Sized>(
        &mut self,
        prefix: &str,
        legacy_prefix: &str,
        section: &S,
    ) -> Result<()> {
        self.register_with(Arc::new(LegacyBackend::new(legacy_prefix)), prefix, section)
    }

    pub fn register_with<S: ConfigSection + ?Sized>(
        &mut self,
        backend: Arc<dyn RegistrationBackend>,
        prefix: &str,
        section: &S,
    ) -> Result<()> {
        let mut registrar = Registrar::new(self, backend, prefix);
        section.declare(&mut registrar);
        registrar.finish()
    }

    /// Names of live registered parameters, in registration order.
    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for registration in self.registrations.iter().filter(|r| r.is_alive()) {
            if !names.iter().any(|n| n == registration.name()) {
                names.push(registration.name().to_string());
            }
        }
        names
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registration(name).is_some()
    }

    /// Where the last refresh took the value of `name` from.
    pub fn parameter_source(&self, name: &str) -> Option<ParameterSource> {
        self.registration(name).map(|r| r.source)
    }

    pub(crate) fn registration(&self, name: &str) -> Option<&Registration> {
        self.registrations
            .iter()
            .find(|r| r.is_alive() && r.name() == name)
    }

    pub(crate) fn registrations(&self) -> impl Iterator<Item = &Registration> {
        self.registrations.iter().filter(|r| r.is_alive())
    }

    // Templates

    /// Loaded templates whose instances live directly below `prefix`.
    pub fn list_templates(&self, prefix: &str) -> Vec<TemplateSpec> {
        self.data.list_templates(prefix)
    }

    /// Create concrete parameters from a loaded template. The new instance
    /// is registered with its subconfig map on the next refresh.
    pub fn instantiate_template(&mut self, spec: &TemplateSpec, instances: &[&str]) -> Result<usize> {
        Ok(self.data.instantiate_template(spec, instances)?)
    }

    // Subconfig maps

    /// Instance names found in the loaded data under `prefix`, in load
    /// order, with descriptions of names that have no parameter below
    /// them.
    pub fn subconfig_instances(&self, prefix: &str) -> (Vec<String>, Vec<String>) {
        let lead = format!("{prefix}.");
        let mut names: Vec<String> = Vec::new();
        let mut errors = Vec::new();
        for element in self.data.iter().filter(|e| e.is_value_bearing()) {
            let Some(rest) = element.name().strip_prefix(&lead) else {
                continue;
            };
            match rest.split_once('.') {
                Some((instance, _)) => {
                    if instance != WILDCARD && !names.iter().any(|n| n == instance) {
                        names.push(instance.to_string());
                    }
                }
                None => errors.push(format!(
                    "{} sits directly in subconfig map {prefix}; expected {prefix}.<instance>.<parameter>",
                    element.name()
                )),
            }
        }
        (names, errors)
    }

    /// Register instances of every subconfig map that are loaded or were
    /// inserted by the application but are not registered yet. Repeats
    /// until nested maps are exhausted.
    pub(crate) fn populate_subconfigs(&mut self) -> Result<Vec<String>> {
        let mut errors: Vec<String> = Vec::new();
        loop {
            let mut pending = Vec::new();
            for (idx, entry) in self.subconfigs.iter().enumerate() {
                if !entry.handle.is_alive() {
                    continue;
                }
                let (mut names, found_errors) = self.subconfig_instances(&entry.prefix);
                for error in found_errors {
                    if !errors.contains(&error) {
                        errors.push(error);
                    }
                }
                for name in entry.handle.instance_names() {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
                for name in names {
                    if entry.registered.contains(&name) {
                        continue;
                    }
                    if let Some(section) = entry.handle.ensure_instance(&name) {
                        pending.push((idx, name, section));
                    }
                }
            }
            if pending.is_empty() {
                return Ok(errors);
            }

            for (idx, name, section) in pending {
                let prefix = join_name(&self.subconfigs[idx].prefix, &name);
                let backend = self.subconfigs[idx].backend.clone();
                self.subconfigs[idx].registered.push(name);
                self.removed_prefixes.retain(|p| *p != prefix);
                tracing::debug!(instance = %prefix, "registering subconfig instance");
                self.register_with(backend, &prefix, section.as_ref())?;
            }
        }
    }

    /// Forget registrations whose storage is gone. Instances removed from
    /// their subconfig map take their loaded parameters with them.
    pub(crate) fn prune(&mut self) {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.is_alive());
        let pruned = before - self.registrations.len();
        if pruned > 0 {
            tracing::debug!(pruned, "dropped registrations of destroyed sections");
        }

        let mut removed = Vec::new();
        for entry in self.subconfigs.iter_mut().filter(|e| e.handle.is_alive()) {
            let live = entry.handle.instance_names();
            let prefix = entry.prefix.clone();
            entry.registered.retain(|name| {
                let keep = live.contains(name);
                if !keep {
                    removed.push(join_name(&prefix, name));
                }
                keep
            });
        }
        self.subconfigs.retain(|e| e.handle.is_alive());

        for prefix in removed {
            let lead = format!("{prefix}.");
            self.data.retain(|element| {
                let name = element.name();
                let scoped = matches!(
                    element,
                    LoadedElement::Parameter(_)
                        | LoadedElement::Reference(_)
                        | LoadedElement::Override(_)
                        | LoadedElement::Inheritance(_)
                );
                !(scoped && (name == prefix || name.starts_with(&lead)))
            });
            tracing::info!(instance = %prefix, "subconfig instance removed");
            if !self.removed_prefixes.contains(&prefix) {
                self.removed_prefixes.push(prefix);
            }
        }
    }

    /// Prefixes of subconfig instances removed since loading.
    pub(crate) fn removed_prefixes(&self) -> &[String] {
        &self.removed_prefixes
    }

    /// Prefixes of registered subconfig maps that are not nested inside
    /// another map's instance.
    pub(crate) fn top_level_subconfigs(&self) -> impl Iterator<Item = (&str, &dyn SubconfigHandle, &Arc<dyn RegistrationBackend>)> {
        self.subconfigs
            .iter()
            .filter(|entry| entry.handle.is_alive())
            .filter(move |entry| {
                !self
                    .subconfigs
                    .iter()
                    .any(|outer| entry.prefix.starts_with(&format!("{}.", outer.prefix)))
            })
            .map(|entry| (entry.prefix.as_str(), entry.handle.as_ref(), &entry.backend))
    }
}

impl RegistrationSink for Container {
    fn parameter(&mut self, registration: Registration) -> Result<()> {
        if let Some(id) = registration.binding.slot_id() {
            if let Some(existing) = self
                .registrations
                .iter()
                .find(|r| r.is_alive() && r.binding.slot_id() == Some(id))
            {
                return Err(Error::DuplicateRegistration {
                    name: registration.name().to_string(),
                    reason: format!("its storage is already registered as {}", existing.name()),
                });
            }
        }

        if let Some(existing) = self.registration(registration.name()) {
            let strict = existing.backend.strict_metadata() && registration.backend.strict_metadata();
            if !existing.metadata.is_equivalent(&registration.metadata, strict) {
                return Err(Error::DuplicateRegistration {
                    name: registration.name().to_string(),
                    reason: "registered again with different metadata".to_string(),
                });
            }
        }

        tracing::debug!(
            name = registration.name(),
            backend = registration.backend.name(),
            "registered parameter"
        );
        self.registrations.push(registration);
        Ok(())
    }

    fn subconfig(
        &mut self,
        prefix: String,
        handle: Arc<dyn SubconfigHandle>,
        backend: Arc<dyn RegistrationBackend>,
    ) -> Result<()> {
        if self
            .subconfigs
            .iter()
            .any(|e| e.prefix == prefix && e.handle.is_alive())
        {
            return Err(Error::DuplicateRegistration {
                name: prefix,
                reason: "subconfig map registered twice".to_string(),
            });
        }
        tracing::debug!(prefix = %prefix, "registered subconfig map");
        self.subconfigs.push(SubconfigEntry {
            prefix,
            handle,
            backend,
            registered: Vec::new(),
        });
        Ok(())
    }
}

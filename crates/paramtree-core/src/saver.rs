//! Writing the container back to config files
//!
//! The saver starts from the files the container loaded and rewrites them
//! so that diffs stay small: elements keep their position, fact blocks and
//! comments, registered parameters replace their loaded counterparts in
//! place, and only parameters no file knew about are appended.

use paramtree_formats::ExporterFactory;
use paramtree_fs::NormalizedPath;
use paramtree_meta::{
    ConfigFormat, ElementKind, FactCondition, LoadedData, LoadedElement, LoadedParameter,
    LoadedReference, Metadata, ParameterSource, StorageLocation,
};
use regex::Regex;

use crate::container::{Container, UNKNOWN_TARGET};
use crate::error::{Error, Result};
use crate::section::Registration;

/// Where saved elements go within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveOrder {
    /// Replace loaded elements in place; new ones go to the end.
    #[default]
    Loaded,
    /// Remove and re-append, so the file follows registration order.
    Application,
}

/// What happens to loaded parameters nobody registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownParameterPolicy {
    /// Preload the existing target files and keep what is in them.
    #[default]
    Keep,
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// Save registered parameters only.
    #[default]
    OnlyRegistered,
    /// Also save loaded parameters nobody registered.
    AllLoaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveValueMode {
    /// Write what was loaded; the process's values only fill gaps.
    KeepLoadedValues,
    /// Write the values currently held by the registered parameters.
    #[default]
    AdoptProcessValues,
}

/// Options of a [`Saver`].
#[derive(Debug, Clone)]
pub struct SaveOptions {
    pub order: SaveOrder,
    pub unknown: UnknownParameterPolicy,
    pub mode: SaveMode,
    pub values: SaveValueMode,
    /// Save optional parameters even when they equal their default.
    pub force_optionals: bool,
    /// Only files whose name matches are written.
    pub filename_filter: Option<Regex>,
    /// Only parameters whose name matches are saved.
    pub parameter_filter: Option<Regex>,
    /// Write every file into this directory instead of where it was loaded
    /// from.
    pub target_dir: Option<NormalizedPath>,
    /// Format of files created for parameters no loaded file can take.
    pub default_format: ConfigFormat,
    /// Write templates synthesized from registered subconfig maps.
    pub write_templates: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            order: SaveOrder::default(),
            unknown: UnknownParameterPolicy::default(),
            mode: SaveMode::default(),
            values: SaveValueMode::default(),
            force_optionals: false,
            filename_filter: None,
            parameter_filter: None,
            target_dir: None,
            default_format: ConfigFormat::Cstyle,
            write_templates: true,
        }
    }
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_order(mut self, order: SaveOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_unknown(mut self, unknown: UnknownParameterPolicy) -> Self {
        self.unknown = unknown;
        self
    }

    pub fn with_mode(mut self, mode: SaveMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_values(mut self, values: SaveValueMode) -> Self {
        self.values = values;
        self
    }

    pub fn with_target_dir(mut self, dir: impl Into<NormalizedPath>) -> Self {
        self.target_dir = Some(dir.into());
        self
    }

    pub fn with_parameter_filter(mut self, filter: Regex) -> Self {
        self.parameter_filter = Some(filter);
        self
    }

    pub fn with_filename_filter(mut self, filter: Regex) -> Self {
        self.filename_filter = Some(filter);
        self
    }

    pub fn force_optionals(mut self) -> Self {
        self.force_optionals = true;
        self
    }

    /// Reject combinations that cannot be honoured.
    pub fn validate(&self) -> Result<()> {
        if self.order == SaveOrder::Loaded && self.unknown == UnknownParameterPolicy::Discard {
            return Err(Error::SaveOptions {
                message: "loaded order needs the loaded files, which discarding unknown parameters drops"
                    .to_string(),
            });
        }
        if self.values == SaveValueMode::AdoptProcessValues && self.mode != SaveMode::OnlyRegistered {
            return Err(Error::SaveOptions {
                message: "process values exist only for registered parameters".to_string(),
            });
        }
        Ok(())
    }
}

/// One file about to be written.
#[derive(Debug, Clone)]
pub struct SaveTarget {
    /// The loaded file this target replaces, or the file being created.
    pub location: StorageLocation,
    /// Where the file is written.
    pub path: NormalizedPath,
    pub data: LoadedData,
}

impl SaveTarget {
    fn format(&self) -> ConfigFormat {
        self.location.format.unwrap_or(ConfigFormat::Cstyle)
    }
}

/// Writes a container's state back to its config files.
#[derive(Debug, Clone)]
pub struct Saver {
    options: SaveOptions,
    factory: ExporterFactory,
}

impl Saver {
    pub fn new(options: SaveOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            factory: ExporterFactory::from_env(),
        })
    }

    pub fn with_factory(mut self, factory: ExporterFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn options(&self) -> &SaveOptions {
        &self.options
    }

    /// Build the content of every file to write, without writing.
    pub fn collect(&self, container: &mut Container) -> Result<Vec<SaveTarget>> {
        container.prune();
        let mut targets = self.seed_targets(container)?;

        for target in &mut targets {
            remove_prefixes(&mut target.data, container.removed_prefixes());
        }

        let mut seen: Vec<&str> = Vec::new();
        for registration in container.registrations() {
            if !registration.save || seen.contains(&registration.name()) {
                continue;
            }
            seen.push(registration.name());
            if self.filtered_out(registration.name()) {
                continue;
            }
            self.save_registered(container, registration, &mut targets);
        }

        if self.options.mode == SaveMode::AllLoaded {
            self.save_unregistered(container, &mut targets);
        }
        self.save_templates(container, &mut targets)?;

        if let Some(filter) = &self.options.filename_filter {
            targets.retain(|t| t.path.file_name().is_some_and(|name| filter.is_match(name)));
        }
        Ok(targets)
    }

    /// Collect and write every target atomically. Returns the written paths.
    pub fn save(&self, container: &mut Container) -> Result<Vec<NormalizedPath>> {
        let targets = self.collect(container)?;
        let mut written = Vec::with_capacity(targets.len());
        for target in targets {
            let exporter = self.factory.exporter(target.format());
            for diagnostic in exporter.diagnostics(&target.data) {
                tracing::warn!(path = %target.path, "{diagnostic}");
            }
            let text = exporter.export(&target.data)?;
            paramtree_fs::io::write_atomic(&target.path, text.as_bytes())?;
            tracing::info!(path = %target.path, elements = target.data.len(), "saved config");
            written.push(target.path);
        }
        container.clear_save_required();
        Ok(written)
    }

    fn filtered_out(&self, name: &str) -> bool {
        self.options
            .parameter_filter
            .as_ref()
            .is_some_and(|filter| !filter.is_match(name))
    }

    fn output_path(&self, location: &StorageLocation) -> Option<NormalizedPath> {
        let path = location.full_file_path()?;
        match &self.options.target_dir {
            Some(dir) => Some(dir.join(path.file_name()?)),
            None => Some(path),
        }
    }

    /// One target per loaded file.
    fn seed_targets(&self, container: &Container) -> Result<Vec<SaveTarget>> {
        let mut targets = Vec::new();
        for location in container.loaded_data().loaded_locations() {
            let Some(path) = self.output_path(&location) else {
                continue;
            };
            let data = match self.options.unknown {
                UnknownParameterPolicy::Keep if path.is_file() => paramtree_formats::load_file(&path)?,
                UnknownParameterPolicy::Keep => elements_of(container.loaded_data(), &location, |_| true),
                UnknownParameterPolicy::Discard => elements_of(container.loaded_data(), &location, |e| {
                    !e.is_value_bearing() && e.kind() != ElementKind::TemplateParameter
                }),
            };
            tracing::debug!(path = %path, elements = data.len(), "save target");
            targets.push(SaveTarget { location, path, data });
        }
        Ok(targets)
    }

    fn save_registered(&self, container: &Container, registration: &Registration, targets: &mut Vec<SaveTarget>) {
        let name = registration.name();
        let data = container.loaded_data();
        let loaded = loaded_value(data, name);
        let deprecated = if loaded.is_none() {
            registration
                .deprecated_names
                .iter()
                .find_map(|old| loaded_value(data, old))
        } else {
            None
        };
        let original = loaded.or(deprecated);

        let Some(element) = self.element_for(registration, original) else {
            return;
        };

        let target = match original {
            Some(element) => self.target_for(element.location(), targets),
            None => self.place(container, name, targets),
        };
        let target = &mut targets[target];

        if let Some(old) = deprecated {
            tracing::debug!(old = old.name(), new = name, "renaming deprecated parameter");
            replace_in_place(&mut target.data, old, element);
            return;
        }
        match self.options.order {
            SaveOrder::Loaded => target.data.add_element(element),
            SaveOrder::Application => target.data.append_element(element),
        };
    }

    /// The element to write for a registered parameter, `None` to skip it.
    fn element_for(&self, registration: &Registration, original: Option<&LoadedElement>) -> Option<LoadedElement> {
        let name = registration.name();
        let metadata = registration.metadata.clone();
        let location = original
            .map(|e| e.location().clone())
            .unwrap_or_else(|| StorageLocation::from_source(ParameterSource::FileOrdinary));

        if let Some(original) = original {
            if registration.rejected && registration.binding.current() == registration.refreshed {
                tracing::error!(name, "loaded value was rejected on refresh, saving it unchanged");
                return Some(with_identity(original, metadata, location));
            }
            let keep_loaded = match self.options.values {
                SaveValueMode::KeepLoadedValues => true,
                SaveValueMode::AdoptProcessValues => {
                    let unchanged = registration.binding.current() == registration.refreshed;
                    let from_reference = registration.source == ParameterSource::ResolvedReference;
                    unchanged && (from_reference || registration.source.is_override())
                }
            };
            if keep_loaded {
                return Some(with_identity(original, metadata, location));
            }
        }

        let value = registration.binding.current()?;
        if original.is_none()
            && metadata.optional
            && !self.options.force_optionals
            && metadata.default_value.as_deref() == Some(value.as_str())
        {
            return None;
        }

        if let Err(e) = registration.binding.check(&value) {
            tracing::warn!(name, value = %value, error = %e, "unparsable value saved as unknown reference");
            return Some(LoadedElement::Reference(LoadedReference {
                target: UNKNOWN_TARGET.to_string(),
                metadata,
                location,
            }));
        }
        if let Some(violation) = metadata.restriction.as_ref().and_then(|r| r.check(name, &value)) {
            tracing::error!(name, "{violation}");
        }
        Some(LoadedElement::Parameter(LoadedParameter {
            value,
            metadata,
            location,
        }))
    }

    fn save_unregistered(&self, container: &Container, targets: &mut Vec<SaveTarget>) {
        for element in container.loaded_data().iter().filter(|e| e.is_value_bearing()) {
            if container.is_registered(element.name()) || self.filtered_out(element.name()) {
                continue;
            }
            let idx = self.target_for(element.location(), targets);
            let target = &mut targets[idx];
            let present = target
                .data
                .get_with_facts(element.kind(), element.name(), element.facts())
                .is_some();
            if !present {
                target.data.add_element(element.clone());
            }
        }
    }

    fn save_templates(&self, container: &Container, targets: &mut Vec<SaveTarget>) -> Result<()> {
        let loaded = container.loaded_data().of_kind(ElementKind::TemplateParameter);
        for element in loaded {
            let idx = self.target_for(element.location(), targets);
            if !targets[idx].data.contains(ElementKind::TemplateParameter, element.name()) {
                targets[idx].data.add_element(element.clone());
            }
        }
        if !self.options.write_templates {
            return Ok(());
        }

        let removed = container.removed_prefixes();
        for template in container.synthesize_templates()? {
            let name = template.metadata.name.clone();
            let known = targets
                .iter()
                .any(|t| t.data.contains(ElementKind::TemplateParameter, &name));
            if known || self.filtered_out(&name) || under_any(&name, removed) {
                continue;
            }
            let idx = self.place(container, &name, targets);
            targets[idx].data.add_element(LoadedElement::TemplateParameter(template));
        }
        Ok(())
    }

    /// Index of the target for a loaded file, created if needed.
    fn target_for(&self, location: &StorageLocation, targets: &mut Vec<SaveTarget>) -> usize {
        let identity = location.file_identity();
        if let Some(idx) = targets.iter().position(|t| t.location == identity) {
            return idx;
        }
        let path = self
            .output_path(&identity)
            .unwrap_or_else(|| NormalizedPath::new(&identity.name));
        targets.push(SaveTarget {
            location: identity,
            path,
            data: LoadedData::new(),
        });
        targets.len() - 1
    }

    /// Target for a parameter no file knows: next to the parameter sharing
    /// the longest dotted prefix, preferring the shallowest one; otherwise
    /// a config named after the first segment.
    fn place(&self, container: &Container, name: &str, targets: &mut Vec<SaveTarget>) -> usize {
        let segments: Vec<&str> = name.split('.').collect();
        let mut best: Option<(usize, usize, usize)> = None;
        for (idx, target) in targets.iter().enumerate() {
            for element in target.data.iter() {
                let other: Vec<&str> = match element {
                    LoadedElement::Parameter(_) | LoadedElement::Reference(_) | LoadedElement::TemplateParameter(_) => {
                        element.name().split('.').collect()
                    }
                    _ => continue,
                };
                let common = segments
                    .iter()
                    .zip(&other)
                    .take_while(|(a, b)| a == b)
                    .count();
                if common == 0 {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((best_common, best_len, _)) => {
                        common > best_common || (common == best_common && other.len() < best_len)
                    }
                };
                if better {
                    best = Some((common, other.len(), idx));
                }
            }
        }
        if let Some((_, _, idx)) = best {
            return idx;
        }

        let first = segments[0];
        if let Some(idx) = targets.iter().position(|t| t.location.name == first) {
            return idx;
        }
        let dir = self
            .options
            .target_dir
            .clone()
            .or_else(|| container.options().config_dir.clone())
            .unwrap_or_else(|| NormalizedPath::new("."));
        let location = StorageLocation::file(dir.as_str(), first, self.options.default_format);
        let path = dir.join(&format!("{first}{}", self.options.default_format.extension()));
        tracing::debug!(path = %path, name, "new config file for unplaced parameter");
        targets.push(SaveTarget {
            location,
            path,
            data: LoadedData::new(),
        });
        targets.len() - 1
    }
}

fn loaded_value<'d>(data: &'d LoadedData, name: &str) -> Option<&'d LoadedElement> {
    data.get(ElementKind::Parameter, name)
        .or_else(|| data.get(ElementKind::Reference, name))
}

/// The loaded element carried over under the registration's name and
/// metadata.
fn with_identity(original: &LoadedElement, metadata: Metadata, location: StorageLocation) -> LoadedElement {
    match original {
        LoadedElement::Reference(reference) => LoadedElement::Reference(LoadedReference {
            target: reference.target.clone(),
            metadata,
            location,
        }),
        LoadedElement::Parameter(param) => LoadedElement::Parameter(LoadedParameter {
            value: param.value.clone(),
            metadata,
            location,
        }),
        other => other.clone(),
    }
}

fn elements_of(data: &LoadedData, location: &StorageLocation, keep: impl Fn(&LoadedElement) -> bool) -> LoadedData {
    let identity = location.file_identity();
    data.iter()
        .filter(|e| e.location().file_identity() == identity && keep(e))
        .cloned()
        .collect()
}

fn under_any(name: &str, prefixes: &[String]) -> bool {
    prefixes
        .iter()
        .any(|p| name == p || name.strip_prefix(p.as_str()).is_some_and(|rest| rest.starts_with('.')))
}

fn remove_prefixes(data: &mut LoadedData, prefixes: &[String]) {
    if prefixes.is_empty() {
        return;
    }
    data.retain(|element| {
        let scoped = matches!(
            element,
            LoadedElement::Parameter(_)
                | LoadedElement::Reference(_)
                | LoadedElement::Override(_)
                | LoadedElement::Inheritance(_)
        );
        !(scoped && under_any(element.name(), prefixes))
    });
}

/// Put `new` where `old` was. If the file already has `new`'s name under
/// the same conditions, `old` is just dropped.
fn replace_in_place(data: &mut LoadedData, old: &LoadedElement, new: LoadedElement) {
    let facts: Vec<FactCondition> = old.facts().to_vec();
    if data.get_with_facts(ElementKind::Parameter, new.name(), &facts).is_some()
        || data.get_with_facts(ElementKind::Reference, new.name(), &facts).is_some()
    {
        data.remove(old.kind(), old.name(), Some(&facts));
        data.add_element(new);
        return;
    }
    if data.get_with_facts(old.kind(), old.name(), &facts).is_none() {
        data.add_element(new);
        return;
    }

    let mut replacement = Some(new);
    let elements: Vec<LoadedElement> = data
        .iter()
        .map(|element| {
            let is_old = element.kind() == old.kind()
                && element.name() == old.name()
                && element.facts() == facts.as_slice();
            if is_old {
                if let Some(new) = replacement.take() {
                    return new;
                }
            }
            element.clone()
        })
        .collect();
    *data = elements.into_iter().collect();
}

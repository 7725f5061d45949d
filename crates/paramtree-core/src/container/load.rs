//! Loading configs into the container, following includes

use paramtree_formats::{import_location, import_str};
use paramtree_fs::NormalizedPath;
use paramtree_meta::{
    ConfigFormat, ElementKind, ImporterClient, LoadedData, LoadedElement, LoadedMapping,
    StorageLocation,
};

use super::Container;
use crate::error::{Error, Result};

impl Container {
    /// Load a config by name, e.g. `ports` or `site/ports`, searching the
    /// config directory and all search paths. Config mappings apply.
    pub fn load(&mut self, name: &str) -> Result<()> {
        let location = self.locate(name, None).ok_or_else(|| Error::ConfigNotFound {
            name: name.to_string(),
        })?;
        self.load_location(location)
    }

    /// Load the config file at `path`; its extension picks the format.
    pub fn load_file(&mut self, path: &NormalizedPath) -> Result<()> {
        let location = StorageLocation::from_file_path(path).ok_or_else(|| {
            paramtree_formats::Error::UnsupportedFormat {
                path: path.to_string(),
            }
        })?;
        self.load_location(location)
    }

    /// Load config text. Includes are resolved relative to
    /// `location.directory`.
    pub fn load_str(&mut self, format: ConfigFormat, text: &str, location: StorageLocation) -> Result<()> {
        let dir = NormalizedPath::new(&location.directory);
        let mut loader = Loader { container: self, dir };
        import_str(format, text, location, &mut loader)?;
        Ok(())
    }

    /// Merge already imported data as if it had just been loaded.
    pub fn merge(&mut self, data: &LoadedData) -> Result<()> {
        let mut loader = Loader {
            container: self,
            dir: NormalizedPath::new(""),
        };
        for element in data.iter() {
            if let Some(dir) = element.location().full_file_path().and_then(|p| p.parent()) {
                loader.dir = dir;
            }
            loader.add_element(element.clone())?;
        }
        Ok(())
    }

    /// Directories a relative config name is looked up in, in order.
    pub fn search_directories(&self, including_dir: Option<&NormalizedPath>) -> Vec<NormalizedPath> {
        let mut dirs: Vec<NormalizedPath> = Vec::new();
        let candidates = self
            .options
            .config_dir
            .iter()
            .chain(&self.options.search_paths)
            .chain(&self.search_paths)
            .chain(including_dir);
        for dir in candidates {
            if !dirs.contains(dir) {
                dirs.push(dir.clone());
            }
        }
        if dirs.is_empty() {
            dirs.push(NormalizedPath::new("."));
        }
        dirs
    }

    /// Configs that were included but could not be found.
    pub fn missing_configs(&self) -> &[String] {
        &self.missing_configs
    }

    fn mapping_for(&self, name: &str) -> Option<&LoadedMapping> {
        self.data
            .of_kind(ElementKind::Mapping)
            .filter_map(|element| match element {
                LoadedElement::Mapping(mapping) if mapping.from == name => Some(mapping),
                _ => None,
            })
            .last()
    }

    fn locate(&self, name: &str, including_dir: Option<&NormalizedPath>) -> Option<StorageLocation> {
        let target = match self.mapping_for(name) {
            Some(mapping) => {
                let mapped = mapping.full_mapping();
                tracing::debug!(from = name, to = %mapped, "config mapping applied");
                mapped
            }
            None => name.to_string(),
        };

        let target_path = NormalizedPath::new(&target);
        let candidates: Vec<NormalizedPath> = if target_path.is_absolute() {
            vec![target_path]
        } else {
            self.search_directories(including_dir)
                .iter()
                .map(|dir| dir.join(&target))
                .collect()
        };

        for candidate in candidates {
            if ConfigFormat::from_file_name(candidate.as_str()).is_some() && candidate.is_file() {
                return StorageLocation::from_file_path(&candidate);
            }
            for format in ConfigFormat::ALL {
                let file = NormalizedPath::new(format!("{candidate}{}", format.extension()));
                if file.is_file() {
                    return StorageLocation::from_file_path(&file);
                }
            }
        }
        None
    }

    fn load_include(&mut self, name: &str, including_dir: &NormalizedPath) -> Result<()> {
        match self.locate(name, Some(including_dir)) {
            Some(location) => self.load_location(location),
            None => {
                tracing::warn!(config = name, from = %including_dir, "included config not found");
                let description = format!("{name} (included from {including_dir})");
                if !self.missing_configs.contains(&description) {
                    self.missing_configs.push(description);
                }
                Ok(())
            }
        }
    }

    fn load_location(&mut self, location: StorageLocation) -> Result<()> {
        let path = location.full_file_path().ok_or_else(|| {
            paramtree_formats::Error::UnsupportedFormat {
                path: location.describe(),
            }
        })?;
        let key = path.canonical_key();

        if let Some(pos) = self.loading.iter().position(|p| *p == key) {
            let mut chain: Vec<String> = self.loading[pos..].iter().map(ToString::to_string).collect();
            chain.push(key.to_string());
            return Err(Error::IncludeCycle { chain });
        }
        if self.visited.contains(&key) {
            return Err(Error::conflict(format!("{path} is included twice")));
        }
        self.visited.insert(key.clone());
        self.loading.push(key);

        let dir = path.parent().unwrap_or_else(|| NormalizedPath::new("."));
        let result = {
            let mut loader = Loader { container: self, dir };
            import_location(&location, &mut loader)
        };
        self.loading.pop();
        result?;

        tracing::info!(path = %path, "loaded config");
        Ok(())
    }
}

/// Merges imported elements into the container as they arrive.
struct Loader<'c> {
    container: &'c mut Container,
    /// Directory of the file being read.
    dir: NormalizedPath,
}

impl ImporterClient for Loader<'_> {
    type Error = Error;

    fn add_element(&mut self, element: LoadedElement) -> Result<()> {
        if !element.location().facts_met(&self.container.facts) {
            tracing::trace!(
                name = element.name(),
                facts = %element.location().facts_string(),
                "skipping element of inactive fact block"
            );
            return Ok(());
        }

        match &element {
            LoadedElement::Define(define) => {
                self.container
                    .facts
                    .add(&define.name, &define.value)
                    .map_err(|e| Error::conflict(format!("{e} in {}", define.location.describe())))?;
            }
            LoadedElement::Include(include) => {
                let name = include.path.clone();
                self.container.data.add_element(element);
                return self.container.load_include(&name, &self.dir);
            }
            LoadedElement::SearchPath(search) => {
                let dir = self.dir.join(&search.path);
                if !self.container.search_paths.contains(&dir) {
                    tracing::debug!(dir = %dir, "search path added");
                    self.container.search_paths.push(dir);
                }
            }
            LoadedElement::Mapping(mapping) => {
                if let Some(existing) = self.container.mapping_for(&mapping.from) {
                    if existing.full_mapping() != mapping.full_mapping() {
                        tracing::warn!(
                            from = %mapping.from,
                            previous = %existing.full_mapping(),
                            new = %mapping.full_mapping(),
                            "config mapping redefined, the later one wins"
                        );
                    }
                }
            }
            LoadedElement::Override(dev) => {
                let data = &self.container.data;
                if data.contains(ElementKind::Parameter, &dev.name) || data.contains(ElementKind::Reference, &dev.name) {
                    return Err(Error::conflict(format!(
                        "override of {} in {} comes after the parameter was loaded",
                        dev.name,
                        dev.location.describe()
                    )));
                }
            }
            LoadedElement::Inheritance(inheritance) => {
                if let Some(LoadedElement::Inheritance(existing)) = self
                    .container
                    .data
                    .get(ElementKind::Inheritance, &inheritance.section)
                {
                    if existing.parent != inheritance.parent {
                        return Err(Error::DuplicateRegistration {
                            name: inheritance.section.clone(),
                            reason: format!(
                                "inherits from both {} and {}",
                                existing.parent, inheritance.parent
                            ),
                        });
                    }
                }
            }
            LoadedElement::Parameter(_) | LoadedElement::Reference(_) => {
                self.note_duplicate(&element);
            }
            LoadedElement::TemplateParameter(_) => {}
        }

        self.container.data.add_element(element);
        Ok(())
    }
}

impl Loader<'_> {
    /// The same name under the same conditions from two different files.
    /// The later one wins.
    fn note_duplicate(&mut self, element: &LoadedElement) {
        let data = &self.container.data;
        let previous = [ElementKind::Parameter, ElementKind::Reference]
            .into_iter()
            .find_map(|kind| data.get_with_facts(kind, element.name(), element.facts()));
        let Some(previous) = previous else {
            return;
        };
        let (old, new) = (previous.location(), element.location());
        if old.file_identity() == new.file_identity() {
            return;
        }
        let description = format!("{} ({} and {})", element.name(), old.describe(), new.describe());
        tracing::debug!(duplicate = %description, "parameter loaded twice");
        self.container.data.record_duplicate(description);
    }
}

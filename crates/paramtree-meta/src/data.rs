//! Ordered collection of loaded elements

use std::collections::HashMap;
use std::convert::Infallible;

use serde::Serialize;

use crate::element::{
    ElementKind, ImporterClient, LoadedElement, LoadedParameter, LoadedReference,
};
use crate::error::{Error, Result};
use crate::location::{FactCondition, StorageLocation};

const WILDCARD: &str = "*";

/// A subconfig template: a dotted name pattern with `*` segments, plus the
/// location of its template parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateSpec {
    /// Name up to (excluding) the final `.*`, e.g. `alertchecker.filters`
    /// or `alertchecker.filters.*.regions`.
    pub name: String,
    pub location: StorageLocation,
}

impl TemplateSpec {
    pub fn new(name: impl Into<String>, location: StorageLocation) -> Self {
        Self {
            name: name.into(),
            location,
        }
    }

    /// Number of instance names needed to instantiate this template.
    pub fn arity(&self) -> usize {
        self.name.split('.').filter(|s| *s == WILDCARD).count() + 1
    }
}

/// What one or more config files contain, in load order.
///
/// An element's identity is its kind, its name and its fact conditions.
/// Adding an element with an existing identity replaces the earlier one in
/// place, which keeps file order stable across edits. A parameter and a
/// reference never coexist for the same name and fact conditions.
#[derive(Debug, Clone, Default)]
pub struct LoadedData {
    elements: Vec<LoadedElement>,
    index: HashMap<(ElementKind, String), Vec<usize>>,
    duplicates: Vec<String>,
}

impl PartialEq for LoadedData {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements && self.duplicates == other.duplicates
    }
}

impl LoadedData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadedElement> {
        self.elements.iter()
    }

    pub fn elements(&self) -> &[LoadedElement] {
        &self.elements
    }

    /// Elements of one kind, in load order.
    pub fn of_kind(&self, kind: ElementKind) -> impl Iterator<Item = &LoadedElement> {
        self.elements.iter().filter(move |e| e.kind() == kind)
    }

    /// Add or replace in place. Returns the element's position.
    pub fn add_element(&mut self, element: LoadedElement) -> usize {
        self.remove_conflicting(&element);
        if let Some(pos) = self.position(element.kind(), element.name(), Some(element.facts())) {
            self.elements[pos] = element;
            return pos;
        }
        self.push(element)
    }

    /// Add at the end, removing any element with the same identity first.
    pub fn append_element(&mut self, element: LoadedElement) -> usize {
        self.remove_conflicting(&element);
        let facts = element.facts().to_vec();
        self.remove(element.kind(), element.name(), Some(&facts));
        self.push(element)
    }

    fn push(&mut self, element: LoadedElement) -> usize {
        let pos = self.elements.len();
        self.index
            .entry((element.kind(), element.name().to_string()))
            .or_default()
            .push(pos);
        self.elements.push(element);
        pos
    }

    fn remove_conflicting(&mut self, element: &LoadedElement) {
        let rival = match element.kind() {
            ElementKind::Parameter => ElementKind::Reference,
            ElementKind::Reference => ElementKind::Parameter,
            _ => return,
        };
        let facts = element.facts().to_vec();
        if self.remove(rival, element.name(), Some(&facts)) {
            tracing::debug!(name = element.name(), "replaced value/reference of the same name");
        }
    }

    fn position(&self, kind: ElementKind, name: &str, facts: Option<&[FactCondition]>) -> Option<usize> {
        self.index
            .get(&(kind, name.to_string()))?
            .iter()
            .copied()
            .find(|&pos| facts.is_none_or(|f| self.elements[pos].facts() == f))
    }

    /// First element of `kind` named `name`, under any fact conditions.
    pub fn get(&self, kind: ElementKind, name: &str) -> Option<&LoadedElement> {
        self.position(kind, name, None).map(|pos| &self.elements[pos])
    }

    pub fn get_with_facts(
        &self,
        kind: ElementKind,
        name: &str,
        facts: &[FactCondition],
    ) -> Option<&LoadedElement> {
        self.position(kind, name, Some(facts))
            .map(|pos| &self.elements[pos])
    }

    pub fn get_mut(&mut self, kind: ElementKind, name: &str) -> Option<&mut LoadedElement> {
        let pos = self.position(kind, name, None)?;
        Some(&mut self.elements[pos])
    }

    pub fn parameter(&self, name: &str) -> Option<&LoadedParameter> {
        match self.get(ElementKind::Parameter, name) {
            Some(LoadedElement::Parameter(p)) => Some(p),
            _ => None,
        }
    }

    pub fn reference(&self, name: &str) -> Option<&LoadedReference> {
        match self.get(ElementKind::Reference, name) {
            Some(LoadedElement::Reference(r)) => Some(r),
            _ => None,
        }
    }

    pub fn contains(&self, kind: ElementKind, name: &str) -> bool {
        self.position(kind, name, None).is_some()
    }

    /// Remove an element. `facts = None` removes the first match under any
    /// conditions.
    pub fn remove(&mut self, kind: ElementKind, name: &str, facts: Option<&[FactCondition]>) -> bool {
        let Some(pos) = self.position(kind, name, facts) else {
            return false;
        };
        self.elements.remove(pos);
        self.rebuild_index();
        true
    }

    /// Remove a parameter or reference with exactly these conditions.
    pub fn remove_parameter(&mut self, name: &str, facts: &[FactCondition]) -> bool {
        let removed_param = self.remove(ElementKind::Parameter, name, Some(facts));
        let removed_ref = self.remove(ElementKind::Reference, name, Some(facts));
        removed_param || removed_ref
    }

    /// Keep only elements for which `keep` returns true.
    pub fn retain(&mut self, keep: impl FnMut(&LoadedElement) -> bool) {
        self.elements.retain(keep);
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (pos, element) in self.elements.iter().enumerate() {
            self.index
                .entry((element.kind(), element.name().to_string()))
                .or_default()
                .push(pos);
        }
    }

    /// Record a name loaded more than once, for diagnostics.
    pub fn record_duplicate(&mut self, description: impl Into<String>) {
        let description = description.into();
        if !self.duplicates.contains(&description) {
            self.duplicates.push(description);
        }
    }

    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// Distinct files elements were loaded from, without conditions.
    pub fn loaded_locations(&self) -> Vec<StorageLocation> {
        let mut locations: Vec<StorageLocation> = Vec::new();
        for element in &self.elements {
            let location = element.location();
            if !location.is_file_backed() {
                continue;
            }
            let identity = location.file_identity();
            if !locations.contains(&identity) {
                locations.push(identity);
            }
        }
        locations
    }

    /// Structural comparison ignoring order, file identity and comments.
    pub fn same_elements(&self, other: &LoadedData) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let mut unmatched: Vec<&LoadedElement> = other.elements.iter().collect();
        for element in &self.elements {
            match unmatched.iter().position(|o| element.same_content(o)) {
                Some(pos) => {
                    unmatched.swap_remove(pos);
                }
                None => return false,
            }
        }
        true
    }

    /// Every template specification the template parameters imply, in
    /// first-seen order. A parameter `a.*.b.*.c` implies `a` and `a.*.b`.
    pub fn template_specs(&self) -> Vec<TemplateSpec> {
        let mut specs: Vec<TemplateSpec> = Vec::new();
        for element in self.of_kind(ElementKind::TemplateParameter) {
            let segments: Vec<&str> = element.name().split('.').collect();
            for (idx, segment) in segments.iter().enumerate() {
                if *segment != WILDCARD || idx == 0 {
                    continue;
                }
                let spec = TemplateSpec::new(segments[..idx].join("."), element.location().clone());
                if !specs.contains(&spec) {
                    specs.push(spec);
                }
            }
        }
        specs
    }

    /// Templates whose instances would live directly below `prefix`.
    ///
    /// Matching is segment-wise; a `*` in a template name matches any
    /// concrete segment of `prefix`. For `alertchecker.filters.f1.regions`
    /// this finds `alertchecker.filters.*.regions`.
    pub fn list_templates(&self, prefix: &str) -> Vec<TemplateSpec> {
        let prefix_segments: Vec<&str> = prefix.split('.').collect();
        let mut specs: Vec<TemplateSpec> = Vec::new();

        for element in self.of_kind(ElementKind::TemplateParameter) {
            let segments: Vec<&str> = element.name().split('.').collect();
            if segments.len() <= prefix_segments.len() {
                continue;
            }
            let matches = prefix_segments
                .iter()
                .zip(&segments)
                .all(|(p, t)| p == t || *t == WILDCARD);
            if !matches || segments[prefix_segments.len()] != WILDCARD {
                continue;
            }
            let spec = TemplateSpec::new(
                segments[..prefix_segments.len()].join("."),
                element.location().clone(),
            );
            if !specs.contains(&spec) {
                specs.push(spec);
            }
        }
        specs
    }

    /// Concrete parameters for one instance tuple of `spec`.
    ///
    /// `instances` supplies one name per `*` in the spec name, left to
    /// right, plus the name of the new instance itself. Nothing is added;
    /// see [`LoadedData::instantiate_template`].
    pub fn instantiate(&self, spec: &TemplateSpec, instances: &[&str]) -> Result<Vec<LoadedParameter>> {
        let expected = spec.arity();
        if instances.len() != expected {
            return Err(Error::TemplateArity {
                spec: spec.name.clone(),
                expected,
                actual: instances.len(),
            });
        }

        let mut wildcard_idx = 0;
        let mut concrete: Vec<&str> = Vec::new();
        for segment in spec.name.split('.') {
            if segment == WILDCARD {
                concrete.push(instances[wildcard_idx]);
                wildcard_idx += 1;
            } else {
                concrete.push(segment);
            }
        }
        let concrete_prefix = format!("{}.{}", concrete.join("."), instances[expected - 1]);
        let template_prefix = format!("{}.{}.", spec.name, WILDCARD);

        let mut produced = Vec::new();
        for element in self.of_kind(ElementKind::TemplateParameter) {
            let LoadedElement::TemplateParameter(template) = element else {
                continue;
            };
            if template.location != spec.location {
                continue;
            }
            let Some(rest) = template.metadata.name.strip_prefix(&template_prefix) else {
                continue;
            };
            // nested templates are instantiated separately
            if rest.split('.').any(|s| s == WILDCARD) {
                continue;
            }
            let mut metadata = template.metadata.clone();
            metadata.name = format!("{concrete_prefix}.{rest}");
            produced.push(LoadedParameter {
                value: template.value.clone(),
                metadata,
                location: spec.location.clone(),
            });
        }

        if produced.is_empty() {
            return Err(Error::UnknownTemplate {
                spec: spec.name.clone(),
            });
        }
        Ok(produced)
    }

    /// Instantiate and add the parameters that do not exist yet.
    ///
    /// Idempotent per instance tuple. Fails without any change on wrong
    /// arity or unknown template. Returns the number of parameters added.
    pub fn instantiate_template(&mut self, spec: &TemplateSpec, instances: &[&str]) -> Result<usize> {
        let produced = self.instantiate(spec, instances)?;
        let mut added = 0;
        for parameter in produced {
            let name = parameter.metadata.name.clone();
            if self.contains(ElementKind::Parameter, &name) || self.contains(ElementKind::Reference, &name) {
                continue;
            }
            self.add_element(LoadedElement::Parameter(parameter));
            added += 1;
        }
        tracing::debug!(template = %spec.name, ?instances, added, "instantiated subconfig template");
        Ok(added)
    }
}

impl ImporterClient for LoadedData {
    type Error = Infallible;

    fn add_element(&mut self, element: LoadedElement) -> std::result::Result<(), Infallible> {
        LoadedData::add_element(self, element);
        Ok(())
    }
}

impl Extend<LoadedElement> for LoadedData {
    fn extend<I: IntoIterator<Item = LoadedElement>>(&mut self, iter: I) {
        for element in iter {
            LoadedData::add_element(self, element);
        }
    }
}

impl FromIterator<LoadedElement> for LoadedData {
    fn from_iter<I: IntoIterator<Item = LoadedElement>>(iter: I) -> Self {
        let mut data = LoadedData::new();
        data.extend(iter);
        data
    }
}

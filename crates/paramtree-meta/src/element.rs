//! The format-independent representation of every config construct.

use serde::{Deserialize, Serialize};

use crate::location::{FactCondition, StorageLocation};
use crate::metadata::Metadata;

/// A parameter with a literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedParameter {
    pub value: String,
    pub metadata: Metadata,
    pub location: StorageLocation,
}

/// A parameter whose value is another parameter's resolved value.
///
/// `target` is the raw reference expression: a plain dotted name or a
/// composite such as `[$(a.b);"-";$(c.d)]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedReference {
    pub target: String,
    pub metadata: Metadata,
    pub location: StorageLocation,
}

/// `name = value;` in a developer override section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedOverride {
    pub name: String,
    pub value: String,
    pub location: StorageLocation,
}

/// `#define fact value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedDefine {
    pub name: String,
    pub value: String,
    pub location: StorageLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedInclude {
    pub path: String,
    pub location: StorageLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedSearchPath {
    pub path: String,
    pub location: StorageLocation,
}

/// Redirects requests for config `from` to `mapped_dir/mapped_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedMapping {
    pub from: String,
    pub mapped_dir: String,
    pub mapped_name: String,
    pub location: StorageLocation,
}

impl LoadedMapping {
    /// The config name the mapping points to.
    pub fn full_mapping(&self) -> String {
        if self.mapped_dir.is_empty() {
            self.mapped_name.clone()
        } else {
            format!("{}/{}", self.mapped_dir.trim_end_matches('/'), self.mapped_name)
        }
    }
}

/// `namespace section : parent`: `section` sees everything under `parent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedInheritance {
    pub parent: String,
    pub section: String,
    pub location: StorageLocation,
}

/// A parameter of a subconfig template; its name contains `*` segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedTemplateParameter {
    pub value: String,
    pub metadata: Metadata,
    pub location: StorageLocation,
}

/// Discriminant of [`LoadedElement`], part of an element's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Parameter,
    Reference,
    Override,
    Define,
    Include,
    SearchPath,
    Mapping,
    Inheritance,
    TemplateParameter,
}

/// One construct discovered in a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadedElement {
    Parameter(LoadedParameter),
    Reference(LoadedReference),
    Override(LoadedOverride),
    Define(LoadedDefine),
    Include(LoadedInclude),
    SearchPath(LoadedSearchPath),
    Mapping(LoadedMapping),
    Inheritance(LoadedInheritance),
    TemplateParameter(LoadedTemplateParameter),
}

impl LoadedElement {
    pub fn kind(&self) -> ElementKind {
        match self {
            LoadedElement::Parameter(_) => ElementKind::Parameter,
            LoadedElement::Reference(_) => ElementKind::Reference,
            LoadedElement::Override(_) => ElementKind::Override,
            LoadedElement::Define(_) => ElementKind::Define,
            LoadedElement::Include(_) => ElementKind::Include,
            LoadedElement::SearchPath(_) => ElementKind::SearchPath,
            LoadedElement::Mapping(_) => ElementKind::Mapping,
            LoadedElement::Inheritance(_) => ElementKind::Inheritance,
            LoadedElement::TemplateParameter(_) => ElementKind::TemplateParameter,
        }
    }

    /// The name identifying the element within its kind.
    pub fn name(&self) -> &str {
        match self {
            LoadedElement::Parameter(p) => &p.metadata.name,
            LoadedElement::Reference(r) => &r.metadata.name,
            LoadedElement::Override(o) => &o.name,
            LoadedElement::Define(d) => &d.name,
            LoadedElement::Include(i) => &i.path,
            LoadedElement::SearchPath(s) => &s.path,
            LoadedElement::Mapping(m) => &m.from,
            LoadedElement::Inheritance(i) => &i.section,
            LoadedElement::TemplateParameter(t) => &t.metadata.name,
        }
    }

    pub fn location(&self) -> &StorageLocation {
        match self {
            LoadedElement::Parameter(p) => &p.location,
            LoadedElement::Reference(r) => &r.location,
            LoadedElement::Override(o) => &o.location,
            LoadedElement::Define(d) => &d.location,
            LoadedElement::Include(i) => &i.location,
            LoadedElement::SearchPath(s) => &s.location,
            LoadedElement::Mapping(m) => &m.location,
            LoadedElement::Inheritance(i) => &i.location,
            LoadedElement::TemplateParameter(t) => &t.location,
        }
    }

    pub fn location_mut(&mut self) -> &mut StorageLocation {
        match self {
            LoadedElement::Parameter(p) => &mut p.location,
            LoadedElement::Reference(r) => &mut r.location,
            LoadedElement::Override(o) => &mut o.location,
            LoadedElement::Define(d) => &mut d.location,
            LoadedElement::Include(i) => &mut i.location,
            LoadedElement::SearchPath(s) => &mut s.location,
            LoadedElement::Mapping(m) => &mut m.location,
            LoadedElement::Inheritance(i) => &mut i.location,
            LoadedElement::TemplateParameter(t) => &mut t.location,
        }
    }

    pub fn facts(&self) -> &[FactCondition] {
        &self.location().facts
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            LoadedElement::Parameter(p) => Some(&p.metadata),
            LoadedElement::Reference(r) => Some(&r.metadata),
            LoadedElement::TemplateParameter(t) => Some(&t.metadata),
            _ => None,
        }
    }

    /// Parameters and references both define a value for a dotted name.
    pub fn is_value_bearing(&self) -> bool {
        matches!(self, LoadedElement::Parameter(_) | LoadedElement::Reference(_))
    }

    /// Structural equality: same kind, name, content and fact conditions.
    ///
    /// File identity, provenance and comments are ignored, so an element
    /// re-imported from an exported copy compares equal to the original.
    pub fn same_content(&self, other: &LoadedElement) -> bool {
        if self.facts() != other.facts() {
            return false;
        }
        match (self, other) {
            (LoadedElement::Parameter(a), LoadedElement::Parameter(b)) => {
                a.value == b.value && a.metadata == b.metadata
            }
            (LoadedElement::Reference(a), LoadedElement::Reference(b)) => {
                a.target == b.target && a.metadata == b.metadata
            }
            (LoadedElement::TemplateParameter(a), LoadedElement::TemplateParameter(b)) => {
                a.value == b.value && a.metadata == b.metadata
            }
            (LoadedElement::Override(a), LoadedElement::Override(b)) => {
                a.name == b.name && a.value == b.value
            }
            (LoadedElement::Define(a), LoadedElement::Define(b)) => {
                a.name == b.name && a.value == b.value
            }
            (LoadedElement::Include(a), LoadedElement::Include(b)) => a.path == b.path,
            (LoadedElement::SearchPath(a), LoadedElement::SearchPath(b)) => a.path == b.path,
            (LoadedElement::Mapping(a), LoadedElement::Mapping(b)) => {
                a.from == b.from && a.full_mapping() == b.full_mapping()
            }
            (LoadedElement::Inheritance(a), LoadedElement::Inheritance(b)) => {
                a.parent == b.parent && a.section == b.section
            }
            _ => false,
        }
    }
}

/// Receives elements from an importer, one call per element in file order.
///
/// Implemented by [`crate::LoadedData`] to collect a file's contents and by
/// the runtime container, which merges elements as they arrive and may
/// reject them.
pub trait ImporterClient {
    type Error;

    fn add_element(&mut self, element: LoadedElement) -> Result<(), Self::Error>;
}

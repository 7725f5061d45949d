//! Data model for paramtree.
//!
//! Everything an importer can discover in a config file is represented here
//! independently of the storage format: where it came from
//! ([`StorageLocation`]), what it declares ([`Metadata`]), and the element
//! itself ([`LoadedElement`]). [`LoadedData`] is the ordered collection of
//! elements that one or more files contain.

pub mod data;
pub mod element;
pub mod error;
pub mod format;
pub mod location;
pub mod metadata;
pub mod restriction;
pub mod text;

pub use data::{LoadedData, TemplateSpec};
pub use element::{
    ElementKind, ImporterClient, LoadedDefine, LoadedElement, LoadedInclude, LoadedInheritance,
    LoadedMapping, LoadedOverride, LoadedParameter, LoadedReference, LoadedSearchPath,
    LoadedTemplateParameter,
};
pub use error::{Error, Result};
pub use format::{ConfigFormat, ParameterSource};
pub use location::{FactCondition, Facts, StorageLocation};
pub use metadata::Metadata;
pub use restriction::Restriction;

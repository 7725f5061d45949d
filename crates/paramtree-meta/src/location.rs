//! Storage locations and fact conditions

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use paramtree_fs::NormalizedPath;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::format::{ConfigFormat, ParameterSource};

/// A block of config that is active only for some values of one fact.
///
/// `level` is the namespace depth at which the block was opened, so a
/// condition stack can be rebuilt at the same place when exporting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactCondition {
    pub level: usize,
    pub fact: String,
    pub values: Vec<String>,
}

impl FactCondition {
    pub fn new(level: usize, fact: impl Into<String>) -> Self {
        Self {
            level,
            fact: fact.into(),
            values: Vec::new(),
        }
    }

    pub fn with_values<I, S>(level: usize, fact: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            level,
            fact: fact.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn add_value(&mut self, value: impl Into<String>) {
        self.values.push(value.into());
    }

    /// Whether the current value of the fact is among the allowed values.
    /// Unspecified facts have the empty value.
    pub fn is_met(&self, facts: &Facts) -> bool {
        let current = facts.get(&self.fact);
        self.values.iter().any(|v| v == current)
    }
}

impl fmt::Display for FactCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|v| format!("{} == {}", self.fact, v))
            .collect();
        f.write_str(&parts.join(" || "))
    }
}

/// The facts of the current deployment, e.g. `site = tower`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facts {
    values: BTreeMap<String, String>,
}

impl Facts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from pairs, rejecting empty and repeated facts.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut facts = Self::new();
        for (name, value) in pairs {
            facts.add(name, value)?;
        }
        Ok(facts)
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        let value = value.into();
        if name.is_empty() || value.is_empty() {
            return Err(Error::EmptyFact { name, value });
        }
        if let Some(existing) = self.values.get(&name) {
            return Err(Error::DuplicateFact {
                name,
                existing: existing.clone(),
                value,
            });
        }
        self.values.insert(name, value);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.values.remove(name)
    }

    /// Current value of `name`, or the empty string if unspecified.
    pub fn get(&self, name: &str) -> &str {
        self.values.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Where a loaded element came from.
///
/// Equality and hashing consider the file identity (directory, name,
/// format) and the fact-condition stack. Provenance, comments and the
/// inherited-from name are transient and ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageLocation {
    /// Directory containing the config file.
    pub directory: String,
    /// Logical config name, without extension.
    pub name: String,
    /// `None` for elements that do not come from a file.
    pub format: Option<ConfigFormat>,
    pub source: ParameterSource,
    pub facts: Vec<FactCondition>,
    /// Plain comment lines preceding the element.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<String>,
    /// For inherited parameters, the parent parameter's name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<String>,
}

impl StorageLocation {
    /// A location inside a config file.
    pub fn file(
        directory: impl Into<String>,
        name: impl Into<String>,
        format: ConfigFormat,
    ) -> Self {
        Self {
            directory: directory.into(),
            name: name.into(),
            format: Some(format),
            source: ParameterSource::FileOrdinary,
            ..Self::default()
        }
    }

    /// A location for values that do not come from any file.
    pub fn from_source(source: ParameterSource) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    /// Derive a location from a full file path, e.g. `/etc/cfg/ports.pt`.
    pub fn from_file_path(path: &NormalizedPath) -> Option<Self> {
        let file_name = path.file_name()?;
        let format = ConfigFormat::from_file_name(file_name)?;
        let name = &file_name[..file_name.len() - format.extension().len()];
        let directory = path
            .parent()
            .map(|p| p.as_str().to_string())
            .unwrap_or_default();
        Some(Self::file(directory, name, format))
    }

    pub fn is_file_backed(&self) -> bool {
        self.format.is_some() && !self.name.is_empty()
    }

    /// Full path of the backing file, if any.
    pub fn full_file_path(&self) -> Option<NormalizedPath> {
        let format = self.format?;
        if self.name.is_empty() {
            return None;
        }
        let file_name = format!("{}{}", self.name, format.extension());
        Some(NormalizedPath::new(&self.directory).join(&file_name))
    }

    /// Human readable origin for diagnostics.
    pub fn describe(&self) -> String {
        match self.full_file_path() {
            Some(path) => path.to_string(),
            None => self.source.to_string(),
        }
    }

    pub fn push_condition(&mut self, condition: FactCondition) {
        self.facts.push(condition);
    }

    pub fn pop_condition(&mut self) -> Option<FactCondition> {
        self.facts.pop()
    }

    /// Whether every condition on the stack is met by `facts`.
    pub fn facts_met(&self, facts: &Facts) -> bool {
        self.facts.iter().all(|c| c.is_met(facts))
    }

    /// All conditions joined by `&&`; empty if unconditional.
    pub fn facts_string(&self) -> String {
        self.facts
            .iter()
            .map(|c| format!("({c})"))
            .collect::<Vec<_>>()
            .join(" && ")
    }

    /// Same file, no conditions, no transient data.
    pub fn file_identity(&self) -> Self {
        Self {
            directory: self.directory.clone(),
            name: self.name.clone(),
            format: self.format,
            source: ParameterSource::FileOrdinary,
            ..Self::default()
        }
    }
}

impl PartialEq for StorageLocation {
    fn eq(&self, other: &Self) -> bool {
        self.directory == other.directory
            && self.name == other.name
            && self.format == other.format
            && self.facts == other.facts
    }
}

impl Eq for StorageLocation {}

impl Hash for StorageLocation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.directory.hash(state);
        self.name.hash(state);
        self.format.hash(state);
        self.facts.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn site_condition(values: &[&str]) -> FactCondition {
        FactCondition::with_values(0, "site", values.iter().copied())
    }

    #[test]
    fn test_condition_display() {
        assert_eq!(site_condition(&["a", "b"]).to_string(), "site == a || site == b");
    }

    #[test]
    fn test_unspecified_fact_is_empty_value() {
        let facts = Facts::new();
        assert!(!site_condition(&["a"]).is_met(&facts));
        assert!(site_condition(&[""]).is_met(&facts));
    }

    #[test]
    fn test_facts_met_requires_all_conditions() {
        let facts = Facts::from_pairs([("site", "a"), ("mode", "ops")]).unwrap();
        let mut location = StorageLocation::file("cfg", "ports", ConfigFormat::Cstyle);
        location.push_condition(site_condition(&["a", "b"]));
        assert!(location.facts_met(&facts));

        location.push_condition(FactCondition::with_values(1, "mode", ["test"]));
        assert!(!location.facts_met(&facts));
    }

    #[test]
    fn test_add_fact_rejects_empty_and_duplicates() {
        let mut facts = Facts::new();
        assert!(matches!(facts.add("", "x"), Err(Error::EmptyFact { .. })));
        assert!(matches!(facts.add("site", ""), Err(Error::EmptyFact { .. })));
        facts.add("site", "a").unwrap();
        assert!(matches!(
            facts.add("site", "b"),
            Err(Error::DuplicateFact { .. })
        ));
    }

    #[test]
    fn test_equality_ignores_transient_fields() {
        let a = StorageLocation::file("cfg", "ports", ConfigFormat::Cstyle);
        let mut b = a.clone();
        b.source = ParameterSource::InheritedParameter;
        b.comments.push("note".into());
        b.inherited_from = Some("parent.x".into());
        assert_eq!(a, b);

        b.push_condition(site_condition(&["a"]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_full_file_path_and_back() {
        let location = StorageLocation::file("/etc/cfg", "ports", ConfigFormat::Json);
        let path = location.full_file_path().unwrap();
        assert_eq!(path.as_str(), "/etc/cfg/ports.json");
        assert_eq!(StorageLocation::from_file_path(&path).unwrap(), location);
    }

    #[test]
    fn test_cmdline_location_has_no_file() {
        let location = StorageLocation::from_source(ParameterSource::CmdlineParam);
        assert!(!location.is_file_backed());
        assert_eq!(location.describe(), "command line");
    }
}

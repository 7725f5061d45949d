//! Demand-driven value resolution
//!
//! Values are resolved name by name with memoization. A name already on the
//! resolution stack is a cycle. Highest precedence first:
//!
//! 1. command line switch of the registered parameter
//! 2. `--dotted.name` on the command line
//! 3. developer override from a config file
//! 4. loaded parameter or reference (last loaded wins)
//! 5. value inherited from a parent section
//! 6. value loaded under a deprecated name
//! 7. default

use std::collections::{HashMap, HashSet};

use paramtree_meta::text::{quote, split_nested, unquote};
use paramtree_meta::{ElementKind, LoadedElement, ParameterSource};
use serde::Serialize;

use super::{CheckingMode, Container};
use crate::error::{Error, Result};
use crate::section::Registration;

/// Target of a reference whose value is deliberately unknown.
pub(crate) const UNKNOWN_TARGET: &str = "???";

/// A resolved value in config text form and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedValue {
    pub value: String,
    pub source: ParameterSource,
    /// Taken from a suggested value because nothing else provided one.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub suggested: bool,
}

impl ResolvedValue {
    fn new(value: impl Into<String>, source: ParameterSource) -> Self {
        Self {
            value: value.into(),
            source,
            suggested: false,
        }
    }

    fn with_source(self, source: ParameterSource) -> Self {
        Self { source, ..self }
    }
}

/// Every loaded parameter and reference resolved, without registrations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedData {
    /// Resolved values in load order.
    pub values: Vec<(String, ResolvedValue)>,
    /// `name -> target` for references that lead nowhere.
    pub unresolved: Vec<String>,
}

impl Container {
    /// Resolve `name` against the loaded data, the command line and the
    /// registrations. `Ok(None)` means nothing provides a value.
    pub fn resolve(&self, name: &str) -> Result<Option<ResolvedValue>> {
        Resolver::new(self).resolve(name)
    }

    /// Resolve every loaded parameter and reference.
    pub fn resolve_loaded(&self) -> Result<ResolvedData> {
        let mut resolver = Resolver::new(self);
        let mut names: Vec<&str> = Vec::new();
        for element in self.data.iter().filter(|e| e.is_value_bearing()) {
            if !names.contains(&element.name()) {
                names.push(element.name());
            }
        }

        let mut values = Vec::new();
        for name in names {
            if let Some(value) = resolver.resolve(name)? {
                values.push((name.to_string(), value));
            }
        }
        Ok(ResolvedData {
            values,
            unresolved: resolver.unresolved,
        })
    }
}

pub(crate) struct Resolver<'c> {
    container: &'c Container,
    values: HashMap<&'c str, &'c LoadedElement>,
    overrides: HashMap<&'c str, &'c str>,
    parents: HashMap<&'c str, &'c str>,
    registrations: HashMap<&'c str, &'c Registration>,
    memo: HashMap<String, Option<ResolvedValue>>,
    stack: Vec<String>,
    noted: HashSet<String>,
    /// `name -> target` for references that lead nowhere.
    pub(crate) unresolved: Vec<String>,
    /// `old -> new` for values found under deprecated names.
    pub(crate) deprecated: Vec<String>,
    /// References between registered parameters of different types.
    pub(crate) mismatches: Vec<String>,
}

impl<'c> Resolver<'c> {
    pub(crate) fn new(container: &'c Container) -> Self {
        let mut values = HashMap::new();
        let mut overrides = HashMap::new();
        let mut parents = HashMap::new();
        for element in container.data.iter() {
            match element {
                LoadedElement::Parameter(_) | LoadedElement::Reference(_) => {
                    values.insert(element.name(), element);
                }
                LoadedElement::Override(dev) => {
                    overrides.insert(dev.name.as_str(), dev.value.as_str());
                }
                LoadedElement::Inheritance(inheritance) => {
                    parents.insert(inheritance.section.as_str(), inheritance.parent.as_str());
                }
                _ => {}
            }
        }

        let mut registrations = HashMap::new();
        for registration in container.registrations() {
            registrations.entry(registration.name()).or_insert(registration);
        }

        Self {
            container,
            values,
            overrides,
            parents,
            registrations,
            memo: HashMap::new(),
            stack: Vec::new(),
            noted: HashSet::new(),
            unresolved: Vec::new(),
            deprecated: Vec::new(),
            mismatches: Vec::new(),
        }
    }

    pub(crate) fn resolve(&mut self, name: &str) -> Result<Option<ResolvedValue>> {
        if let Some(hit) = self.memo.get(name) {
            return Ok(hit.clone());
        }
        if let Some(pos) = self.stack.iter().position(|n| n == name) {
            let mut chain = self.stack[pos..].to_vec();
            chain.push(name.to_string());
            return Err(Error::ReferenceCycle { chain });
        }

        self.stack.push(name.to_string());
        let result = self.lookup(name);
        self.stack.pop();

        let value = result?;
        if let Some(value) = &value {
            tracing::trace!(name, value = %value.value, source = %value.source, "resolved");
        }
        self.memo.insert(name.to_string(), value.clone());
        Ok(value)
    }

    fn lookup(&mut self, name: &str) -> Result<Option<ResolvedValue>> {
        let registration = self.registrations.get(name).copied();
        let container = self.container;
        let cmdline = &container.cmdline;

        if let Some(value) = registration
            .and_then(|r| r.metadata.cmdline_switch.as_deref())
            .and_then(|switch| cmdline.switch(switch))
        {
            return Ok(Some(ResolvedValue::new(value, ParameterSource::CmdlineParam)));
        }
        if let Some(value) = cmdline.override_value(name) {
            return Ok(Some(ResolvedValue::new(value, ParameterSource::CmdlineOverride)));
        }
        if let Some(registration) = registration.filter(|r| r.pure_cmdline) {
            return Ok(registration
                .metadata
                .default_value
                .clone()
                .map(|v| ResolvedValue::new(v, ParameterSource::DefaultPure)));
        }
        if let Some(value) = self.overrides.get(name) {
            return Ok(Some(ResolvedValue::new(*value, ParameterSource::FileDevOverride)));
        }
        if let Some(element) = self.values.get(name).copied() {
            return self.from_element(name, element);
        }
        if let Some(value) = self.inherited(name)? {
            return Ok(Some(value));
        }

        let Some(registration) = registration else {
            return Ok(None);
        };
        if let Some(value) = self.deprecated_value(name, registration)? {
            return Ok(Some(value));
        }
        self.default_value(name, registration)
    }

    fn from_element(&mut self, name: &str, element: &LoadedElement) -> Result<Option<ResolvedValue>> {
        match element {
            LoadedElement::Parameter(param) => Ok(Some(ResolvedValue::new(
                param.value.clone(),
                ParameterSource::FileOrdinary,
            ))),
            LoadedElement::Reference(reference) => self.follow_reference(name, &reference.target),
            _ => Ok(None),
        }
    }

    /// Walk the sections containing `name` from the innermost outwards and
    /// look the remaining suffix up in each section's parent.
    fn inherited(&mut self, name: &str) -> Result<Option<ResolvedValue>> {
        let mut section = name;
        while let Some((outer, _)) = section.rsplit_once('.') {
            section = outer;
            let Some(parent) = self.parents.get(section).copied() else {
                continue;
            };
            let suffix = &name[section.len()..];
            let candidate = format!("{parent}{suffix}");
            if let Some(value) = self.resolve(&candidate)? {
                tracing::debug!(name, from = %candidate, "inherited value");
                return Ok(Some(value.with_source(ParameterSource::InheritedParameter)));
            }
        }
        Ok(None)
    }

    fn deprecated_value(&mut self, name: &str, registration: &Registration) -> Result<Option<ResolvedValue>> {
        let container = self.container;
        for old in &registration.deprecated_names {
            let found = if let Some(value) = container.cmdline.override_value(old) {
                Some(ResolvedValue::new(value, ParameterSource::CmdlineOverride))
            } else if let Some(value) = self.overrides.get(old.as_str()) {
                Some(ResolvedValue::new(*value, ParameterSource::FileDevOverride))
            } else if let Some(element) = self.values.get(old.as_str()).copied() {
                self.from_element(old, element)?
            } else {
                None
            };

            if let Some(value) = found {
                let note = format!("{old} -> {name}");
                tracing::debug!(deprecated = %note, "value found under deprecated name");
                if !self.deprecated.contains(&note) {
                    self.deprecated.push(note);
                }
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn default_value(&mut self, name: &str, registration: &Registration) -> Result<Option<ResolvedValue>> {
        let metadata = &registration.metadata;
        if metadata.optional {
            return Ok(metadata
                .default_value
                .clone()
                .map(|v| ResolvedValue::new(v, ParameterSource::DefaultOptional)));
        }
        if self.container.checking_mode() == CheckingMode::Strict {
            return Ok(None);
        }

        let suggested = match metadata.suggested_reference.as_deref() {
            Some(target) => self.follow_reference(name, target)?,
            None => metadata
                .default_value
                .clone()
                .map(|v| ResolvedValue::new(v, ParameterSource::DefaultOptional)),
        };
        Ok(suggested.map(|value| ResolvedValue {
            suggested: true,
            ..value
        }))
    }

    fn follow_reference(&mut self, name: &str, target: &str) -> Result<Option<ResolvedValue>> {
        let target = target.trim();
        if target == UNKNOWN_TARGET {
            self.note_unresolved(name, target);
            return Ok(None);
        }
        if let Some(inner) = target.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            return self.composite(name, target, inner);
        }

        match self.resolve(target)? {
            Some(value) => {
                self.check_types(name, target);
                Ok(Some(value.with_source(ParameterSource::ResolvedReference)))
            }
            None => {
                self.note_unresolved(name, target);
                Ok(None)
            }
        }
    }

    /// `[$(a.b);"-";$(c)]` concatenates the pieces. Quoted literals and
    /// text-typed targets contribute their unquoted content; the result is
    /// quoted again only when `name` is text-typed, so `["[";$(a);"]"]`
    /// can build a list.
    fn composite(&mut self, name: &str, target: &str, inner: &str) -> Result<Option<ResolvedValue>> {
        let Some(parts) = split_nested(inner, ';') else {
            self.note_unresolved(name, target);
            return Ok(None);
        };

        let mut text = String::new();
        for part in parts {
            let part = part.trim();
            let Some(token) = part.strip_prefix("$(").and_then(|p| p.strip_suffix(')')) else {
                text.push_str(&unquote(part).unwrap_or_else(|| part.to_string()));
                continue;
            };
            let token = token.trim();
            let Some(value) = self.resolve(token)? else {
                self.note_unresolved(name, token);
                return Ok(None);
            };
            if self.is_text(token) {
                text.push_str(&unquote(&value.value).unwrap_or(value.value));
            } else {
                text.push_str(&value.value);
            }
        }

        let value = if self.is_text(name) { quote(&text) } else { text };
        Ok(Some(ResolvedValue::new(value, ParameterSource::ResolvedReference)))
    }

    /// Declared type of a registered or loaded name.
    fn declared_type(&self, name: &str) -> Option<String> {
        if let Some(type_name) = self
            .registrations
            .get(name)
            .and_then(|r| r.metadata.type_name.clone())
        {
            return Some(type_name);
        }
        self.values
            .get(name)
            .and_then(|e| e.metadata())
            .and_then(|m| m.type_name.clone())
    }

    /// Whether values of `name` are quoted text. Untyped names count as
    /// text.
    fn is_text(&self, name: &str) -> bool {
        self.declared_type(name)
            .is_none_or(|t| matches!(t.as_str(), "string" | "path"))
    }

    fn check_types(&mut self, name: &str, target: &str) {
        let type_of = |n: &str| {
            self.registrations
                .get(n)
                .and_then(|r| r.metadata.type_name.clone())
                .or_else(|| {
                    self.container
                        .data
                        .get(ElementKind::Parameter, n)
                        .and_then(|e| e.metadata())
                        .and_then(|m| m.type_name.clone())
                })
        };
        let (Some(own), Some(other)) = (type_of(name), type_of(target)) else {
            return;
        };
        if own != other {
            let note = format!("{name} ({own}) refers to {target} ({other})");
            if self.noted.insert(note.clone()) {
                self.mismatches.push(note);
            }
        }
    }

    fn note_unresolved(&mut self, name: &str, target: &str) {
        let note = format!("{name} -> {target}");
        if self.noted.insert(note.clone()) {
            tracing::debug!(reference = %note, "unresolved reference");
            self.unresolved.push(note);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::{ConfigSection, ParamSpec, Registrar};
    use crate::slot::Param;
    use crate::value::ParamValue;
    use paramtree_meta::{ConfigFormat, StorageLocation};
    use pretty_assertions::assert_eq;

    fn container_with(text: &str) -> Container {
        let mut container = Container::default();
        container
            .load_str(ConfigFormat::Cstyle, text, StorageLocation::default())
            .unwrap();
        container
    }

    fn value_of(container: &Container, name: &str) -> Option<(String, ParameterSource)> {
        container
            .resolve(name)
            .unwrap()
            .map(|v| (v.value, v.source))
    }

    #[test]
    fn test_reference_chain() {
        let container = container_with(
            "namespace daq {\nint & fdp_cmd = fdp2.cmd;\n}\n\
             namespace fdp2 {\nint & cmd = ports.cmd;\n}\n\
             namespace ports {\nint cmd = 123;\n}\n",
        );
        assert_eq!(
            value_of(&container, "daq.fdp_cmd"),
            Some(("123".to_string(), ParameterSource::ResolvedReference))
        );
        assert_eq!(
            value_of(&container, "ports.cmd"),
            Some(("123".to_string(), ParameterSource::FileOrdinary))
        );
    }

    #[test]
    fn test_reference_cycle_names_the_chain() {
        let container = container_with("namespace x {\nint & a = x.b;\nint & b = x.a;\n}\n");
        let err = container.resolve("x.a").unwrap_err();
        let Error::ReferenceCycle { chain } = err else {
            panic!("expected reference cycle, got {err}");
        };
        assert_eq!(chain, vec!["x.a", "x.b", "x.a"]);
    }

    #[test]
    fn test_composite_reference() {
        let container = container_with(
            "namespace host {\nstring name = \"tower\";\nint port = 80;\n}\n\
             namespace url {\nstring & full = [$(host.name);\":\";$(host.port)];\n}\n",
        );
        assert_eq!(
            value_of(&container, "url.full"),
            Some(("\"tower:80\"".to_string(), ParameterSource::ResolvedReference))
        );
    }

    #[test]
    fn test_composite_reference_builds_a_list() {
        let container = container_with(
            "namespace a {\nint x = 1;\nint y = 2;\nstring name = \"n\";\n}\n\
             namespace b {\nlist<int> & ports = [\"[\";$(a.x);\",\";$(a.y);\"]\"];\n\
             list<string> & names = [\"[\";$(a.name);\"]\"];\n}\n",
        );
        let ports = value_of(&container, "b.ports").unwrap().0;
        assert_eq!(ports, "[1,2]");
        assert_eq!(Vec::<i32>::parse(&ports), Ok(vec![1, 2]));
        assert_eq!(value_of(&container, "b.names").unwrap().0, "[n]");
    }

    #[test]
    fn test_composite_list_reaches_the_slot() {
        #[derive(Default)]
        struct Ports {
            ports: Param<Vec<i32>>,
        }
        impl ConfigSection for Ports {
            fn declare(&self, reg: &mut Registrar<'_>) {
                reg.add(ParamSpec::new("ports", &self.ports));
            }
        }

        let mut container = container_with(
            "namespace a {\nint x = 1;\nint y = 2;\n}\n\
             namespace b {\nlist<int> & ports = [\"[\";$(a.x);\",\";$(a.y);\"]\"];\n}\n",
        );
        let section = Ports::default();
        container.register("b", &section).unwrap();

        let report = container.refresh().unwrap();

        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert_eq!(section.ports.get(), vec![1, 2]);
    }

    #[test]
    fn test_unresolved_reference_is_noted() {
        let container = container_with("namespace a {\nint & x = nowhere.y;\nint z = 1;\n}\n");
        let data = container.resolve_loaded().unwrap();
        assert_eq!(data.unresolved, vec!["a.x -> nowhere.y"]);
        assert_eq!(data.values.len(), 1);
        assert_eq!(data.values[0].0, "a.z");
    }

    #[test]
    fn test_multi_level_inheritance() {
        let container = container_with(
            "namespace base {\nint port = 1;\nint timeout = 5;\n}\n\
             namespace mid : base {\nint port = 2;\n}\n\
             namespace leaf : mid {\n}\n",
        );
        assert_eq!(
            value_of(&container, "leaf.port"),
            Some(("2".to_string(), ParameterSource::InheritedParameter))
        );
        assert_eq!(
            value_of(&container, "leaf.timeout"),
            Some(("5".to_string(), ParameterSource::InheritedParameter))
        );
        assert_eq!(
            value_of(&container, "mid.port"),
            Some(("2".to_string(), ParameterSource::FileOrdinary))
        );
    }

    #[test]
    fn test_inheritance_of_nested_section() {
        let container = container_with(
            "namespace base {\nnamespace net {\nint port = 1;\n}\n}\n\
             namespace child : base {\n}\n",
        );
        assert_eq!(value_of(&container, "child.net.port").map(|v| v.0), Some("1".to_string()));
    }

    #[test]
    fn test_command_line_and_dev_override_precedence() {
        let mut container = container_with("a.x = 2;\nnamespace a {\nint x = 1;\nint y = 1;\n}\n");
        assert_eq!(
            value_of(&container, "a.x"),
            Some(("2".to_string(), ParameterSource::FileDevOverride))
        );
        container.set_cmdline(["--a.x", "3"]).unwrap();
        assert_eq!(
            value_of(&container, "a.x"),
            Some(("3".to_string(), ParameterSource::CmdlineOverride))
        );
        assert_eq!(
            value_of(&container, "a.y"),
            Some(("1".to_string(), ParameterSource::FileOrdinary))
        );
    }

    #[test]
    fn test_unknown_target_never_resolves() {
        let container = container_with("namespace a {\nint & x = ???;\n}\n");
        assert_eq!(container.resolve("a.x").unwrap(), None);
    }
}

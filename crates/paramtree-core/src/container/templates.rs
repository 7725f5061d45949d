//! Template synthesis from registered subconfig maps

use std::any::TypeId;
use std::sync::Arc;

use paramtree_meta::{LoadedTemplateParameter, StorageLocation};

use super::{Container, WILDCARD};
use crate::backend::{join_name, RegistrationBackend};
use crate::error::Result;
use crate::section::{Registrar, Registration, RegistrationSink};
use crate::subconfig::SubconfigHandle;

/// Collects what a prototype section declares instead of registering it.
#[derive(Default)]
struct TemplateSink {
    parameters: Vec<LoadedTemplateParameter>,
    maps: Vec<(String, Arc<dyn SubconfigHandle>)>,
}

impl RegistrationSink for TemplateSink {
    fn parameter(&mut self, registration: Registration) -> Result<()> {
        if !registration.save {
            return Ok(());
        }
        let value = registration
            .metadata
            .default_value
            .clone()
            .or_else(|| registration.binding.current())
            .unwrap_or_default();
        self.parameters.push(LoadedTemplateParameter {
            value,
            metadata: registration.metadata,
            location: StorageLocation::default(),
        });
        Ok(())
    }

    fn subconfig(
        &mut self,
        prefix: String,
        handle: Arc<dyn SubconfigHandle>,
        _backend: Arc<dyn RegistrationBackend>,
    ) -> Result<()> {
        self.maps.push((prefix, handle));
        Ok(())
    }
}

impl Container {
    /// One template parameter per leaf parameter path below every
    /// registered subconfig map, with each map segment replaced by `*`.
    ///
    /// A section type that contains itself is only followed as deep as
    /// subconfig maps are actually registered.
    pub fn synthesize_templates(&self) -> Result<Vec<LoadedTemplateParameter>> {
        let mut out = Vec::new();
        for (prefix, handle, backend) in self.top_level_subconfigs() {
            let mut path = vec![handle.section_type()];
            self.synthesize(prefix, handle, backend, &mut path, &mut out)?;
        }
        tracing::debug!(templates = out.len(), "synthesized subconfig templates");
        Ok(out)
    }

    fn synthesize(
        &self,
        prefix: &str,
        handle: &dyn SubconfigHandle,
        backend: &Arc<dyn RegistrationBackend>,
        path: &mut Vec<TypeId>,
        out: &mut Vec<LoadedTemplateParameter>,
    ) -> Result<()> {
        let pattern = join_name(prefix, WILDCARD);
        let prototype = handle.prototype();
        let mut sink = TemplateSink::default();
        let mut registrar = Registrar::new(&mut sink, backend.clone(), &pattern);
        prototype.declare(&mut registrar);
        registrar.finish()?;

        for parameter in sink.parameters {
            if !out.iter().any(|p| p.metadata.name == parameter.metadata.name) {
                out.push(parameter);
            }
        }

        for (nested_prefix, nested) in sink.maps {
            let section_type = nested.section_type();
            if path.contains(&section_type) && !self.has_registered_map(&nested_prefix) {
                tracing::trace!(prefix = %nested_prefix, "stopping at recursive subconfig type");
                continue;
            }
            path.push(section_type);
            let result = self.synthesize(&nested_prefix, nested.as_ref(), backend, path, out);
            path.pop();
            result?;
        }
        Ok(())
    }

    /// Whether a live subconfig map is registered under a prefix matching
    /// `pattern`, where `*` matches any one segment.
    fn has_registered_map(&self, pattern: &str) -> bool {
        let wanted: Vec<&str> = pattern.split('.').collect();
        self.subconfigs
            .iter()
            .filter(|entry| entry.handle.is_alive())
            .any(|entry| {
                let segments: Vec<&str> = entry.prefix.split('.').collect();
                segments.len() == wanted.len()
                    && segments
                        .iter()
                        .zip(&wanted)
                        .all(|(have, want)| *want == WILDCARD || have == want)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::{ConfigSection, ParamSpec};
    use crate::slot::Param;
    use crate::subconfig::SubconfigMap;
    use paramtree_meta::ConfigFormat;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Limit {
        max: Param<i32>,
    }

    impl ConfigSection for Limit {
        fn declare(&self, reg: &mut Registrar<'_>) {
            reg.add(ParamSpec::new("max", &self.max).optional(3));
        }
    }

    #[derive(Default)]
    struct Filter {
        port: Param<i32>,
        session: Param<String>,
        limits: SubconfigMap<Limit>,
    }

    impl ConfigSection for Filter {
        fn declare(&self, reg: &mut Registrar<'_>) {
            reg.add(ParamSpec::new("port", &self.port).help("Port"));
            reg.add(ParamSpec::new("session", &self.session).pure_cmdline(String::new()));
            reg.subconfig("limits", &self.limits);
        }
    }

    #[derive(Default)]
    struct Checker {
        filters: SubconfigMap<Filter>,
    }

    impl ConfigSection for Checker {
        fn declare(&self, reg: &mut Registrar<'_>) {
            reg.subconfig("filters", &self.filters);
        }
    }

    #[derive(Default)]
    struct Node {
        value: Param<i32>,
        children: SubconfigMap<Node>,
    }

    impl ConfigSection for Node {
        fn declare(&self, reg: &mut Registrar<'_>) {
            reg.add(ParamSpec::new("value", &self.value));
            reg.subconfig("children", &self.children);
        }
    }

    fn names(templates: &[LoadedTemplateParameter]) -> Vec<&str> {
        templates.iter().map(|t| t.metadata.name.as_str()).collect()
    }

    #[test]
    fn test_nested_maps_become_wildcards() {
        let mut container = Container::default();
        let checker = Checker::default();
        container.register("alertchecker", &checker).unwrap();

        let templates = container.synthesize_templates().unwrap();
        assert_eq!(
            names(&templates),
            vec!["alertchecker.filters.*.port", "alertchecker.filters.*.limits.*.max"]
        );
        assert_eq!(templates[1].value, "3");
    }

    #[test]
    fn test_recursive_type_stops_without_instances() {
        let mut container = Container::default();
        let root = Node::default();
        container.register("tree", &root).unwrap();

        let templates = container.synthesize_templates().unwrap();
        assert_eq!(names(&templates), vec!["tree.children.*.value"]);
    }

    #[test]
    fn test_recursive_type_follows_registered_depth() {
        let mut container = Container::default();
        container
            .load_str(
                ConfigFormat::Cstyle,
                "namespace tree {\nint value = 0;\nnamespace children {\nnamespace a {\nint value = 1;\n}\n}\n}\n",
                StorageLocation::default(),
            )
            .unwrap();
        let root = Node::default();
        container.register("tree", &root).unwrap();
        container.refresh().unwrap();

        let templates = container.synthesize_templates().unwrap();
        assert_eq!(
            names(&templates),
            vec!["tree.children.*.value", "tree.children.*.children.*.value"]
        );
    }
}

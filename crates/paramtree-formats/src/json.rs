//! JSON config format (`.json`)
//!
//! The document mirrors the cstyle layout: a header of directives, the
//! subconfig templates, and a body tree of namespaces, fact blocks and
//! values. Fact conditions of body elements are implied by the nesting;
//! header entries carry theirs explicitly.

use std::collections::HashSet;

use paramtree_meta::{
    ConfigFormat, ElementKind, FactCondition, ImporterClient, LoadedData, LoadedDefine,
    LoadedElement, LoadedInclude, LoadedInheritance, LoadedMapping, LoadedOverride,
    LoadedParameter, LoadedReference, LoadedSearchPath, LoadedTemplateParameter, Metadata,
    ParameterSource, StorageLocation,
};
use serde::{Deserialize, Serialize};

use crate::cstyle::{CURRENT_VERSION, MIN_VERSION};
use crate::error::{Error, ImportError, Result};
use crate::tree::{body_elements, template_groups, Node, SectionTree};
use crate::{Exporter, Importer};

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    version: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    header: Vec<HeaderEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    templates: Vec<Template>,
    #[serde(default)]
    body: Vec<BodyNode>,
}

#[derive(Debug, Serialize, Deserialize)]
struct HeaderEntry {
    #[serde(flatten)]
    directive: Directive,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    facts: Vec<FactCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    comments: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "directive", rename_all = "snake_case")]
enum Directive {
    Define {
        name: String,
        value: String,
    },
    Override {
        name: String,
        value: String,
    },
    Map {
        from: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        dir: String,
        to: String,
    },
    Search {
        path: String,
    },
    Include {
        path: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct Template {
    name: String,
    #[serde(default)]
    children: Vec<BodyNode>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum BodyNode {
    Namespace {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inherits: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        comments: Vec<String>,
        #[serde(default)]
        children: Vec<BodyNode>,
    },
    If {
        fact: String,
        values: Vec<String>,
        #[serde(default)]
        children: Vec<BodyNode>,
    },
    Param(ValueNode),
    Reference(ValueNode),
}

/// A value with its metadata; `name` is the leaf name.
#[derive(Debug, Serialize, Deserialize)]
struct ValueNode {
    value: String,
    #[serde(flatten)]
    metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    comments: Vec<String>,
}

// Export

/// Exports [`LoadedData`] as a JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExporter;

impl JsonExporter {
    pub fn new() -> Self {
        Self
    }
}

impl Exporter for JsonExporter {
    fn format(&self) -> ConfigFormat {
        ConfigFormat::Json
    }

    fn export(&self, data: &LoadedData) -> Result<String> {
        let templates = template_groups(data)
            .into_iter()
            .map(|(name, members)| {
                let tree = SectionTree::build(members, &format!("{name}.*"));
                Ok(Template {
                    children: convert_nodes(&tree.roots, 1)?,
                    name,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let body = SectionTree::build(body_elements(data), "");
        let document = Document {
            version: CURRENT_VERSION,
            header: header_entries(data),
            templates,
            body: convert_nodes(&body.roots, 0)?,
        };

        let mut text = serde_json::to_string_pretty(&document).map_err(|e| Error::Export {
            name: "document".into(),
            message: e.to_string(),
        })?;
        text.push('\n');
        Ok(text)
    }
}

fn header_entries(data: &LoadedData) -> Vec<HeaderEntry> {
    let order = [
        ElementKind::Define,
        ElementKind::Override,
        ElementKind::Mapping,
        ElementKind::SearchPath,
        ElementKind::Include,
    ];
    order
        .into_iter()
        .flat_map(|kind| data.of_kind(kind))
        .filter_map(|element| {
            let directive = match element {
                LoadedElement::Define(d) => Directive::Define {
                    name: d.name.clone(),
                    value: d.value.clone(),
                },
                LoadedElement::Override(o) => Directive::Override {
                    name: o.name.clone(),
                    value: o.value.clone(),
                },
                LoadedElement::Mapping(m) => Directive::Map {
                    from: m.from.clone(),
                    dir: m.mapped_dir.clone(),
                    to: m.mapped_name.clone(),
                },
                LoadedElement::SearchPath(s) => Directive::Search { path: s.path.clone() },
                LoadedElement::Include(i) => Directive::Include { path: i.path.clone() },
                _ => return None,
            };
            Some(HeaderEntry {
                directive,
                facts: element.facts().to_vec(),
                comments: element.location().comments.clone(),
            })
        })
        .collect()
}

fn convert_nodes(nodes: &[Node<'_>], depth: usize) -> Result<Vec<BodyNode>> {
    nodes
        .iter()
        .map(|node| {
            Ok(match node {
                Node::Namespace {
                    name,
                    inheritance,
                    children,
                } => BodyNode::Namespace {
                    name: name.clone(),
                    inherits: inheritance.map(|i| i.parent.clone()),
                    comments: inheritance.map(|i| i.location.comments.clone()).unwrap_or_default(),
                    children: convert_nodes(children, depth + 1)?,
                },
                Node::Condition { condition, children } => BodyNode::If {
                    fact: condition.fact.clone(),
                    values: condition.values.clone(),
                    children: convert_nodes(children, depth)?,
                },
                Node::Value(element) => {
                    if depth == 0 {
                        return Err(Error::Export {
                            name: element.name().to_string(),
                            message: "parameters must belong to a namespace".into(),
                        });
                    }
                    value_node(element).ok_or_else(|| Error::Export {
                        name: element.name().to_string(),
                        message: "not a parameter".into(),
                    })?
                }
            })
        })
        .collect()
}

fn value_node(element: &LoadedElement) -> Option<BodyNode> {
    let comments = element.location().comments.clone();
    let leaf = |metadata: &Metadata| Metadata {
        name: metadata.leaf_name().to_string(),
        ..metadata.clone()
    };
    match element {
        LoadedElement::Reference(r) => Some(BodyNode::Reference(ValueNode {
            value: r.target.clone(),
            metadata: leaf(&r.metadata),
            comments,
        })),
        LoadedElement::Parameter(LoadedParameter { value, metadata, .. })
        | LoadedElement::TemplateParameter(LoadedTemplateParameter { value, metadata, .. }) => {
            Some(BodyNode::Param(ValueNode {
                value: value.clone(),
                metadata: leaf(metadata),
                comments,
            }))
        }
        _ => None,
    }
}

// Import

/// Imports a JSON document.
#[derive(Debug, Clone)]
pub struct JsonImporter {
    text: String,
    location: StorageLocation,
}

impl JsonImporter {
    pub fn from_text(text: impl Into<String>, location: StorageLocation) -> Self {
        Self {
            text: text.into(),
            location,
        }
    }

    fn source_name(&self) -> String {
        self.location
            .full_file_path()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "input string".to_string())
    }
}

impl Importer for JsonImporter {
    fn import<C>(&mut self, client: &mut C) -> std::result::Result<(), ImportError<C::Error>>
    where
        C: ImporterClient + ?Sized,
    {
        let source_name = self.source_name();
        let invalid = |message: String| -> ImportError<C::Error> {
            ImportError::Format(Error::Json {
                source_name: source_name.clone(),
                message,
            })
        };

        let document: Document = serde_json::from_str(&self.text).map_err(|e| invalid(e.to_string()))?;
        if !(MIN_VERSION..=CURRENT_VERSION).contains(&document.version) {
            return Err(invalid(format!("unsupported config version {}", document.version)));
        }

        let mut base = self.location.clone();
        base.facts.clear();
        base.comments.clear();

        for entry in document.header {
            let mut location = base.clone();
            location.facts = entry.facts;
            location.comments = entry.comments;
            let element = match entry.directive {
                Directive::Define { name, value } => LoadedElement::Define(LoadedDefine { name, value, location }),
                Directive::Override { name, value } => {
                    location.source = ParameterSource::FileDevOverride;
                    LoadedElement::Override(LoadedOverride { name, value, location })
                }
                Directive::Map { from, dir, to } => LoadedElement::Mapping(LoadedMapping {
                    from,
                    mapped_dir: dir,
                    mapped_name: to,
                    location,
                }),
                Directive::Search { path } => LoadedElement::SearchPath(LoadedSearchPath { path, location }),
                Directive::Include { path } => LoadedElement::Include(LoadedInclude { path, location }),
            };
            client.add_element(element).map_err(ImportError::Client)?;
        }

        let mut walker = Walker {
            location: base,
            client,
            invalid: &invalid,
        };

        let mut seen = HashSet::new();
        for template in document.templates {
            let name = template.name;
            if name.is_empty() || name.ends_with('*') || name.ends_with('.') {
                return Err(invalid(format!("invalid subconfig template name '{name}'")));
            }
            if !seen.insert(name.clone()) {
                return Err(invalid(format!("subconfig template '{name}' is defined twice")));
            }
            walker.walk(template.children, &format!("{name}.*"), 0, true)?;
        }

        walker.walk(document.body, "", 0, false)?;
        tracing::debug!(source = %source_name, "parsed json config");
        Ok(())
    }
}

struct Walker<'c, 'f, C: ?Sized, F> {
    location: StorageLocation,
    client: &'c mut C,
    invalid: &'f F,
}

impl<C, F> Walker<'_, '_, C, F>
where
    C: ImporterClient + ?Sized,
    F: Fn(String) -> ImportError<C::Error>,
{
    fn walk(
        &mut self,
        nodes: Vec<BodyNode>,
        prefix: &str,
        depth: usize,
        in_template: bool,
    ) -> std::result::Result<(), ImportError<C::Error>> {
        for node in nodes {
            match node {
                BodyNode::Namespace {
                    name,
                    inherits,
                    comments,
                    children,
                } => {
                    if name.is_empty() || name.contains('.') {
                        return Err((self.invalid)(format!("invalid namespace name '{name}'")));
                    }
                    let section = if prefix.is_empty() {
                        name
                    } else {
                        format!("{prefix}.{name}")
                    };
                    if let Some(parent) = inherits {
                        if in_template {
                            return Err((self.invalid)(
                                "inheritance is not supported in subconfig templates".into(),
                            ));
                        }
                        let mut location = self.location.clone();
                        location.comments = comments;
                        self.emit(LoadedElement::Inheritance(LoadedInheritance {
                            parent,
                            section: section.clone(),
                            location,
                        }))?;
                    }
                    self.walk(children, &section, depth + 1, in_template)?;
                }
                BodyNode::If { fact, values, children } => {
                    if in_template {
                        return Err((self.invalid)(
                            "fact conditions are not allowed in subconfig templates".into(),
                        ));
                    }
                    if fact.is_empty() || values.is_empty() {
                        return Err((self.invalid)("fact condition without fact or values".into()));
                    }
                    if self.location.facts.iter().any(|c| c.fact == fact) {
                        return Err((self.invalid)(format!(
                            "fact '{fact}' is already constrained by an enclosing condition"
                        )));
                    }
                    self.location.push_condition(FactCondition::with_values(depth, fact, values));
                    self.walk(children, prefix, depth, in_template)?;
                    self.location.pop_condition();
                }
                BodyNode::Param(node) | BodyNode::Reference(node) if prefix.is_empty() => {
                    return Err((self.invalid)(format!(
                        "parameter '{}' must belong to a namespace",
                        node.metadata.name
                    )));
                }
                BodyNode::Param(node) => {
                    let (value, metadata, location) = self.value_parts(node, prefix);
                    let element = if in_template {
                        LoadedElement::TemplateParameter(LoadedTemplateParameter {
                            value,
                            metadata,
                            location,
                        })
                    } else {
                        LoadedElement::Parameter(LoadedParameter {
                            value,
                            metadata,
                            location,
                        })
                    };
                    self.emit(element)?;
                }
                BodyNode::Reference(node) => {
                    if in_template {
                        return Err((self.invalid)(
                            "references are not supported in subconfig templates".into(),
                        ));
                    }
                    let (target, metadata, location) = self.value_parts(node, prefix);
                    self.emit(LoadedElement::Reference(LoadedReference {
                        target,
                        metadata,
                        location,
                    }))?;
                }
            }
        }
        Ok(())
    }

    fn value_parts(&self, node: ValueNode, prefix: &str) -> (String, Metadata, StorageLocation) {
        let mut metadata = node.metadata;
        metadata.name = format!("{prefix}.{}", metadata.name);
        let mut location = self.location.clone();
        location.comments = node.comments;
        (node.value, metadata, location)
    }

    fn emit(&mut self, element: LoadedElement) -> std::result::Result<(), ImportError<C::Error>> {
        self.client.add_element(element).map_err(ImportError::Client)
    }
}

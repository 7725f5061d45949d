//! Grouping of flat elements into namespaces and fact blocks.
//!
//! Both exporters write the body of a config as nested namespaces. A fact
//! condition recorded at namespace depth `d` is re-opened right before the
//! `d`-th namespace of the path, or right before the leaf when the path has
//! only `d` namespaces. Siblings sharing a namespace or condition share one
//! node, in first-seen order.

use paramtree_meta::{ElementKind, FactCondition, LoadedData, LoadedElement, LoadedInheritance};

#[derive(Debug)]
pub(crate) enum Node<'a> {
    Namespace {
        name: String,
        inheritance: Option<&'a LoadedInheritance>,
        children: Vec<Node<'a>>,
    },
    Condition {
        condition: FactCondition,
        children: Vec<Node<'a>>,
    },
    /// A parameter or reference.
    Value(&'a LoadedElement),
}

enum Step<'s> {
    Namespace(&'s str),
    Condition(&'s FactCondition),
}

#[derive(Debug, Default)]
pub(crate) struct SectionTree<'a> {
    pub roots: Vec<Node<'a>>,
}

impl<'a> SectionTree<'a> {
    /// Build from parameters, references and inheritances; other kinds are
    /// skipped. Names are split at dots with `prefix` removed first.
    pub fn build<I>(elements: I, prefix: &str) -> Self
    where
        I: IntoIterator<Item = &'a LoadedElement>,
    {
        let mut tree = SectionTree::default();
        for element in elements {
            let name = element.name();
            let relative = if prefix.is_empty() {
                name
            } else {
                match name.strip_prefix(prefix).and_then(|r| r.strip_prefix('.')) {
                    Some(rest) => rest,
                    None => continue,
                }
            };
            match element {
                LoadedElement::Parameter(_)
                | LoadedElement::Reference(_)
                | LoadedElement::TemplateParameter(_) => {
                    let segments: Vec<&str> = relative.split('.').collect();
                    let namespaces = &segments[..segments.len() - 1];
                    let steps = path_steps(namespaces, element.facts(), namespaces.len());
                    let children = descend(&mut tree.roots, &steps);
                    children.push(Node::Value(element));
                }
                LoadedElement::Inheritance(inheritance) => {
                    let segments: Vec<&str> = relative.split('.').collect();
                    let steps = path_steps(&segments, element.facts(), segments.len() - 1);
                    tree.attach_inheritance(&steps, inheritance);
                }
                _ => {}
            }
        }
        tree
    }

    fn attach_inheritance(&mut self, steps: &[Step<'_>], inheritance: &'a LoadedInheritance) {
        let Some((Step::Namespace(last), parents)) = steps.split_last() else {
            return;
        };
        let siblings = descend(&mut self.roots, parents);
        let existing = siblings.iter_mut().find_map(|node| match node {
            Node::Namespace {
                name,
                inheritance: slot @ None,
                ..
            } if name == last => Some(slot),
            _ => None,
        });
        match existing {
            Some(slot) => *slot = Some(inheritance),
            None => siblings.push(Node::Namespace {
                name: (*last).to_string(),
                inheritance: Some(inheritance),
                children: Vec::new(),
            }),
        }
    }
}

/// Elements that form the body of a config: values and inheritances.
pub(crate) fn body_elements(data: &LoadedData) -> impl Iterator<Item = &LoadedElement> {
    data.iter().filter(|e| e.is_value_bearing() || e.kind() == ElementKind::Inheritance)
}

/// Template parameters grouped by template name, in first-seen order.
///
/// The template of `a.*.b.*.c` is `a.*.b`: everything before the last
/// wildcard segment.
pub(crate) fn template_groups(data: &LoadedData) -> Vec<(String, Vec<&LoadedElement>)> {
    let mut groups: Vec<(String, Vec<&LoadedElement>)> = Vec::new();
    for element in data.of_kind(ElementKind::TemplateParameter) {
        let Some((name, _)) = element.name().rsplit_once(".*.") else {
            continue;
        };
        match groups.iter_mut().find(|(group, _)| group == name) {
            Some((_, members)) => members.push(element),
            None => groups.push((name.to_string(), vec![element])),
        }
    }
    groups
}

/// Interleave namespace segments with the conditions that belong before
/// them. Conditions deeper than `max_level` are placed at `max_level`.
fn path_steps<'s>(namespaces: &[&'s str], facts: &'s [FactCondition], max_level: usize) -> Vec<Step<'s>> {
    let mut steps = Vec::with_capacity(namespaces.len() + facts.len());
    let mut pending = facts.iter().peekable();
    for depth in 0..=namespaces.len() {
        while let Some(condition) = pending.next_if(|c| c.level.min(max_level) <= depth) {
            steps.push(Step::Condition(condition));
        }
        if let Some(segment) = namespaces.get(depth) {
            steps.push(Step::Namespace(segment));
        }
    }
    steps
}

fn descend<'t, 'a>(mut nodes: &'t mut Vec<Node<'a>>, steps: &[Step<'_>]) -> &'t mut Vec<Node<'a>> {
    for step in steps {
        let pos = nodes.iter().position(|node| match (node, step) {
            (Node::Namespace { name, .. }, Step::Namespace(segment)) => name == segment,
            (Node::Condition { condition, .. }, Step::Condition(wanted)) => condition == *wanted,
            _ => false,
        });
        let pos = match pos {
            Some(pos) => pos,
            None => {
                nodes.push(match step {
                    Step::Namespace(segment) => Node::Namespace {
                        name: (*segment).to_string(),
                        inheritance: None,
                        children: Vec::new(),
                    },
                    Step::Condition(condition) => Node::Condition {
                        condition: (*condition).clone(),
                        children: Vec::new(),
                    },
                });
                nodes.len() - 1
            }
        };
        nodes = match &mut nodes[pos] {
            Node::Namespace { children, .. } | Node::Condition { children, .. } => children,
            Node::Value(_) => unreachable!("value nodes are never matched by a step"),
        };
    }
    nodes
}

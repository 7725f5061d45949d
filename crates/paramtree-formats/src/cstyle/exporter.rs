//! Writer for cstyle config text.

use paramtree_meta::text::quote;
use paramtree_meta::{ConfigFormat, ElementKind, FactCondition, LoadedData, LoadedElement, Metadata};

use super::{
    namespace_keyword, COMMENT, CMDLINE, CURRENT_VERSION, DEFINE, ENDIF, ENDMAP, EOF_MARKER, IF,
    INCLUDE, MAP, METADATA_PREFIX, MIN_VERSION, OPTIONAL, RESTRICTION, SEARCH, SUGGESTED,
    SUGGESTED_REF, TEMPLATE, TEMPLATE_VERSION, VERSION_DIRECTIVE,
};
use crate::Exporter;
use crate::error::{Error, Result};
use crate::tree::{body_elements, template_groups, Node, SectionTree};

const INDENT: &str = "    ";
const HELP_WIDTH: usize = 80;
const SEPARATOR: &str =
    "// -----------------------------------------------------------------------------";

/// Exports [`LoadedData`] as cstyle text of a given structural version.
#[derive(Debug, Clone, Copy)]
pub struct CstyleExporter {
    version: u32,
}

impl Default for CstyleExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CstyleExporter {
    pub fn new() -> Self {
        Self {
            version: CURRENT_VERSION,
        }
    }

    /// Versions outside the supported range are clamped.
    pub fn with_version(version: u32) -> Self {
        Self {
            version: version.clamp(MIN_VERSION, CURRENT_VERSION),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    fn omitted_templates(&self, data: &LoadedData) -> Vec<String> {
        if self.version >= TEMPLATE_VERSION {
            return Vec::new();
        }
        template_groups(data).into_iter().map(|(name, _)| name).collect()
    }
}

impl Exporter for CstyleExporter {
    fn format(&self) -> ConfigFormat {
        ConfigFormat::Cstyle
    }

    fn export(&self, data: &LoadedData) -> Result<String> {
        let mut writer = Writer::new(self.version);
        writer.line(format!("{VERSION_DIRECTIVE} {}", self.version));
        writer.write_header(data);

        if self.version >= TEMPLATE_VERSION {
            writer.write_templates(data)?;
        } else {
            for name in self.omitted_templates(data) {
                tracing::warn!(
                    template = %name,
                    version = self.version,
                    "subconfig template omitted, the pinned config version cannot express it"
                );
            }
        }

        let tree = SectionTree::build(body_elements(data), "");
        writer.write_nodes(&tree.roots, 0)?;

        writer.blank();
        writer.line(format!("// {EOF_MARKER}"));
        Ok(writer.out)
    }

    fn diagnostics(&self, data: &LoadedData) -> Vec<String> {
        self.omitted_templates(data)
            .into_iter()
            .map(|name| {
                format!(
                    "Subconfig template '{name}' cannot be written with config version {}; only its instances are kept",
                    self.version
                )
            })
            .collect()
    }
}

struct Writer {
    out: String,
    indent: usize,
    keyword: &'static str,
    /// Conditions currently open in the header section.
    open: Vec<FactCondition>,
}

impl Writer {
    fn new(version: u32) -> Self {
        Self {
            out: String::new(),
            indent: 0,
            keyword: namespace_keyword(version),
            open: Vec::new(),
        }
    }

    fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn blank(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    fn after_condition(&self) -> bool {
        self.out
            .trim_end()
            .rsplit('\n')
            .next()
            .is_some_and(|last| last.trim_start().starts_with(IF))
    }

    fn comments(&mut self, comments: &[String]) {
        for comment in comments {
            if comment.is_empty() {
                self.line("//");
            } else {
                self.line(format!("// {comment}"));
            }
        }
    }

    /// Write `text`, indenting continuation lines one level deeper.
    fn statement(&mut self, text: &str) {
        let mut lines = text.lines();
        if let Some(first) = lines.next() {
            self.line(first);
        }
        self.indent += 1;
        for rest in lines {
            self.line(rest);
        }
        self.indent -= 1;
    }

    // Header

    /// Reuse the common prefix of the open conditions, close the rest and
    /// open what is missing.
    fn establish(&mut self, facts: &[FactCondition]) {
        let common = self
            .open
            .iter()
            .zip(facts)
            .take_while(|(open, wanted)| open == wanted)
            .count();
        while self.open.len() > common {
            if let Some(condition) = self.open.pop() {
                self.line(format!("{ENDIF} // {condition}"));
            }
        }
        for condition in &facts[common..] {
            self.line(format!("{IF} {condition}"));
            self.open.push(condition.clone());
        }
    }

    fn write_header(&mut self, data: &LoadedData) {
        let before = self.out.len();
        self.blank();

        for element in data.of_kind(ElementKind::Define) {
            let LoadedElement::Define(define) = element else { continue };
            self.establish(&define.location.facts);
            self.comments(&define.location.comments);
            let value = if define.value.contains(char::is_whitespace) {
                quote(&define.value)
            } else {
                define.value.clone()
            };
            self.line(format!("{DEFINE} {} {value}", define.name));
        }

        for element in data.of_kind(ElementKind::Override) {
            let LoadedElement::Override(dev) = element else { continue };
            self.establish(&dev.location.facts);
            self.comments(&dev.location.comments);
            self.statement(&format!("{} = {};", dev.name, dev.value));
        }

        let mut open_map: Option<&str> = None;
        for element in data.of_kind(ElementKind::Mapping) {
            let LoadedElement::Mapping(mapping) = element else { continue };
            let reopen = open_map != Some(mapping.mapped_dir.as_str()) || self.open != mapping.location.facts;
            if reopen {
                if open_map.take().is_some() {
                    self.line(ENDMAP);
                }
                self.establish(&mapping.location.facts);
                if mapping.mapped_dir.is_empty() {
                    self.line(MAP);
                } else {
                    self.line(format!("{MAP} {}", quote(&mapping.mapped_dir)));
                }
                open_map = Some(mapping.mapped_dir.as_str());
            }
            self.comments(&mapping.location.comments);
            if mapping.from == mapping.mapped_name {
                self.line(&mapping.from);
            } else {
                self.line(format!("{} : {}", mapping.from, mapping.mapped_name));
            }
        }
        if open_map.is_some() {
            self.line(ENDMAP);
        }

        for element in data.of_kind(ElementKind::SearchPath) {
            let LoadedElement::SearchPath(search) = element else { continue };
            self.establish(&search.location.facts);
            self.comments(&search.location.comments);
            self.line(format!("{SEARCH} {}", quote(&search.path)));
        }

        for element in data.of_kind(ElementKind::Include) {
            let LoadedElement::Include(include) = element else { continue };
            self.establish(&include.location.facts);
            self.comments(&include.location.comments);
            self.line(format!("{INCLUDE} {}", quote(&include.path)));
        }

        self.establish(&[]);
        if self.out.len() == before + 1 {
            // nothing but the blank line
            self.out.truncate(before);
        }
    }

    // Templates and body

    fn write_templates(&mut self, data: &LoadedData) -> Result<()> {
        for (name, members) in template_groups(data) {
            self.blank();
            self.line(format!("{TEMPLATE} {name} {{"));
            self.indent += 1;
            let tree = SectionTree::build(members, &format!("{name}.*"));
            self.write_nodes(&tree.roots, 1)?;
            self.indent -= 1;
            self.line(format!("}} // {TEMPLATE} {name}"));
        }
        Ok(())
    }

    fn write_nodes(&mut self, nodes: &[Node<'_>], depth: usize) -> Result<()> {
        for node in nodes {
            match node {
                Node::Namespace {
                    name,
                    inheritance,
                    children,
                } => {
                    if depth == 0 {
                        if !self.after_condition() {
                            self.blank();
                        }
                        self.line(SEPARATOR);
                    }
                    let header = match inheritance {
                        Some(inheritance) => {
                            self.comments(&inheritance.location.comments);
                            format!("{} {name} : {}", self.keyword, inheritance.parent)
                        }
                        None => format!("{} {name}", self.keyword),
                    };
                    self.line(format!("{header} {{"));
                    self.indent += 1;
                    self.write_nodes(children, depth + 1)?;
                    self.indent -= 1;
                    self.line(format!("}} // {} {name}", self.keyword));
                }
                Node::Condition { condition, children } => {
                    if depth == 0 && !self.after_condition() {
                        self.blank();
                    }
                    self.line(format!("{IF} {condition}"));
                    self.write_nodes(children, depth)?;
                    self.line(format!("{ENDIF} // {condition}"));
                }
                Node::Value(element) => {
                    if depth == 0 {
                        return Err(Error::Export {
                            name: element.name().to_string(),
                            message: "parameters must belong to a namespace".into(),
                        });
                    }
                    self.write_value(element);
                }
            }
        }
        Ok(())
    }

    fn write_value(&mut self, element: &LoadedElement) {
        let (metadata, reference, value) = match element {
            LoadedElement::Parameter(p) => (&p.metadata, false, &p.value),
            LoadedElement::Reference(r) => (&r.metadata, true, &r.target),
            LoadedElement::TemplateParameter(t) => (&t.metadata, false, &t.value),
            _ => return,
        };
        self.comments(&element.location().comments);
        self.write_metadata(metadata);

        let type_name = metadata.type_name.as_deref().unwrap_or_else(|| {
            tracing::warn!(name = %metadata.name, "parameter without declared type written as string");
            "string"
        });
        let marker = if reference { "& " } else { "" };
        self.statement(&format!("{type_name} {marker}{} = {value};", metadata.leaf_name()));
    }

    fn write_metadata(&mut self, metadata: &Metadata) {
        let mut tags = Vec::new();
        if let Some(switch) = &metadata.cmdline_switch {
            tags.push(format!("{CMDLINE} {switch}"));
        }
        if let Some(default) = &metadata.default_value {
            tags.push(format!("{SUGGESTED} {default}"));
        }
        if let Some(reference) = &metadata.suggested_reference {
            tags.push(format!("{SUGGESTED_REF} {reference}"));
        }
        if metadata.optional {
            tags.push(format!("{OPTIONAL} 1"));
        }
        if let Some(restriction) = &metadata.restriction {
            tags.push(format!("{RESTRICTION} {restriction}"));
        }
        if let Some(comment) = &metadata.user_comment {
            tags.push(format!("{COMMENT} {comment}"));
        }

        for help_line in wrap(&metadata.help, HELP_WIDTH) {
            self.line(format!("{METADATA_PREFIX} {help_line}"));
        }
        if !metadata.help.is_empty() && !tags.is_empty() {
            self.line(METADATA_PREFIX);
        }
        for tag in tags {
            self.line(format!("{METADATA_PREFIX} {tag}"));
        }
    }
}

/// Greedy word wrap; words longer than `width` get a line of their own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("aa bb cc", 5), vec!["aa bb", "cc"]);
        assert_eq!(wrap("", 5), Vec::<String>::new());
        assert_eq!(wrap("toolongword x", 4), vec!["toolongword", "x"]);
    }

    #[test]
    fn test_version_is_clamped() {
        assert_eq!(CstyleExporter::with_version(0).version(), MIN_VERSION);
        assert_eq!(CstyleExporter::with_version(9).version(), CURRENT_VERSION);
    }
}

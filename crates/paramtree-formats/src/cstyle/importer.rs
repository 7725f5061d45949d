//! Parser for cstyle config text.

use std::collections::HashSet;
use std::sync::LazyLock;

use paramtree_meta::text::{find_unnested, unquote};
use paramtree_meta::{
    FactCondition, ImporterClient, LoadedDefine, LoadedElement, LoadedInclude, LoadedInheritance,
    LoadedMapping, LoadedOverride, LoadedParameter, LoadedReference, LoadedSearchPath,
    LoadedTemplateParameter, Metadata, ParameterSource, Restriction, StorageLocation,
};
use regex::Regex;

use super::{
    directive, namespace_keyword, COMMENT, CMDLINE, CURRENT_VERSION, DEFINE, ENDIF, ENDMAP,
    EOF_MARKER, IF, INCLUDE, MAP, METADATA_PREFIX, MIN_VERSION, OPTIONAL, RESTRICTION, SEARCH,
    SUGGESTED, SUGGESTED_REF, TEMPLATE, VERSION_DIRECTIVE,
};
use crate::Importer;
use crate::error::{Error, ImportError, Result};

static PARAMETER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<type>[^\s&=]+)\s*(?P<reference>&)?\s*(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*=\s*(?s:(?P<value>.*))$",
    )
    .expect("Invalid parameter regex")
});

static OVERRIDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z0-9_]+)+)\s*=\s*(?s:(?P<value>.*))$")
        .expect("Invalid override regex")
});

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid identifier regex"));

const INPUT_STRING: &str = "input string";

/// Imports cstyle text.
///
/// Every element is stamped with a clone of the base location carrying the
/// fact conditions open at that point and the comment lines above it.
#[derive(Debug, Clone)]
pub struct CstyleImporter {
    text: String,
    location: StorageLocation,
}

impl CstyleImporter {
    pub fn from_text(text: impl Into<String>, location: StorageLocation) -> Self {
        Self {
            text: text.into(),
            location,
        }
    }

    /// Read the file behind a file-backed location.
    pub fn from_file(location: StorageLocation) -> Result<Self> {
        let path = location.full_file_path().ok_or_else(|| Error::UnsupportedFormat {
            path: location.describe(),
        })?;
        let text = paramtree_fs::io::read_text(&path)?;
        Ok(Self::from_text(text, location))
    }

    fn source_name(&self) -> String {
        self.location
            .full_file_path()
            .map(|p| p.to_string())
            .unwrap_or_else(|| INPUT_STRING.to_string())
    }
}

impl Importer for CstyleImporter {
    fn import<C>(&mut self, client: &mut C) -> std::result::Result<(), ImportError<C::Error>>
    where
        C: ImporterClient + ?Sized,
    {
        let mut location = self.location.clone();
        location.facts.clear();
        location.comments.clear();
        let parser = Parser {
            lines: self.text.lines().collect(),
            next: 0,
            line_no: 0,
            source_name: self.source_name(),
            location,
            comments: Vec::new(),
            version: CURRENT_VERSION,
            depth: 0,
            body_started: false,
            templates: HashSet::new(),
            client,
        };
        parser.run()
    }
}

type Parsed<T, E> = std::result::Result<T, ImportError<E>>;

struct Parser<'t, 'c, C: ?Sized> {
    lines: Vec<&'t str>,
    next: usize,
    /// 1-based number of the line last looked at.
    line_no: usize,
    source_name: String,
    location: StorageLocation,
    comments: Vec<String>,
    version: u32,
    depth: usize,
    body_started: bool,
    templates: HashSet<String>,
    client: &'c mut C,
}

impl<'t, C> Parser<'t, '_, C>
where
    C: ImporterClient + ?Sized,
{
    fn run(mut self) -> Parsed<(), C::Error> {
        self.read_version()?;

        while let Some(line) = self.peek() {
            if directive(line, IF).is_some() || directive(line, ENDIF).is_some() {
                self.read_condition(line, false)?;
            } else if let Some(rest) = directive(line, DEFINE) {
                self.header_allowed(DEFINE)?;
                self.advance();
                self.read_define(rest)?;
            } else if let Some(rest) = directive(line, MAP) {
                self.header_allowed(MAP)?;
                self.advance();
                self.read_mapping_block(rest)?;
            } else if let Some(rest) = directive(line, SEARCH) {
                self.header_allowed(SEARCH)?;
                self.advance();
                let path = self.quoted(rest, SEARCH)?;
                let location = self.element_location();
                self.emit(LoadedElement::SearchPath(LoadedSearchPath { path, location }))?;
            } else if let Some(rest) = directive(line, INCLUDE) {
                self.header_allowed(INCLUDE)?;
                self.advance();
                let path = self.quoted(rest, INCLUDE)?;
                let location = self.element_location();
                self.emit(LoadedElement::Include(LoadedInclude { path, location }))?;
            } else if directive(line, VERSION_DIRECTIVE).is_some() {
                return self.error(format!("{VERSION_DIRECTIVE} must be the first line"));
            } else if let Some(rest) = directive(line, TEMPLATE) {
                self.body_started = true;
                self.advance();
                self.read_template(rest)?;
            } else if let Some(rest) = directive(line, namespace_keyword(self.version)) {
                self.body_started = true;
                self.advance();
                self.read_namespace(rest, "", false)?;
            } else if line.starts_with('}') {
                return self.error("Unexpected '}'");
            } else if line.starts_with(METADATA_PREFIX) || self.body_started {
                return self.error("Parameters must be declared inside a namespace");
            } else {
                self.read_override()?;
            }
        }

        if let Some(open) = self.location.facts.last() {
            return self.error(format!("Unterminated #if {open}"));
        }
        tracing::debug!(source = %self.source_name, version = self.version, "parsed cstyle config");
        Ok(())
    }

    // Line handling

    /// Next significant line, trimmed. Blank lines and plain comments are
    /// consumed; comments are kept for the next element.
    fn peek(&mut self) -> Option<&'t str> {
        while self.next < self.lines.len() {
            let line = self.lines[self.next].trim();
            self.line_no = self.next + 1;
            if line.is_empty() {
                self.next += 1;
                continue;
            }
            if let Some(comment) = line.strip_prefix("//") {
                if !comment.starts_with('!') {
                    let comment = comment.trim();
                    if !is_decoration(comment) {
                        self.comments.push(comment.to_string());
                    }
                    self.next += 1;
                    continue;
                }
            }
            return Some(line);
        }
        None
    }

    fn advance(&mut self) {
        self.next += 1;
    }

    /// Text up to the terminating `;`, which may be several lines away.
    /// Continuation lines are trimmed and joined with newlines.
    fn read_statement(&mut self) -> Parsed<String, C::Error> {
        let start = self.line_no;
        let Some(first) = self.peek() else {
            return self.error("Unexpected end of input");
        };
        self.advance();

        let mut text = first.to_string();
        loop {
            if let Some(end) = find_unnested(&text, ';') {
                let trailing = text[end + 1..].trim();
                if !trailing.is_empty() && !trailing.starts_with("//") {
                    return self.error(format!("Unexpected text after ';': '{trailing}'"));
                }
                text.truncate(end);
                return Ok(text.trim_end().to_string());
            }
            if self.next >= self.lines.len() {
                return self.error_at(start, "Missing ';'");
            }
            let line = self.lines[self.next].trim();
            self.line_no = self.next + 1;
            self.next += 1;
            text.push('\n');
            text.push_str(line);
        }
    }

    /// Header of a `{`-block, with the brace on the same or the next line.
    fn open_block(&mut self, header: &str, what: &str) -> Parsed<String, C::Error> {
        if let Some(header) = header.strip_suffix('{') {
            return Ok(header.trim().to_string());
        }
        match self.peek() {
            Some("{") => {
                self.advance();
                Ok(header.trim().to_string())
            }
            _ => self.error(format!("Expected '{{' after {what} {header}")),
        }
    }

    // Directives

    fn read_version(&mut self) -> Parsed<(), C::Error> {
        let Some(line) = self.peek() else {
            return Ok(());
        };
        let Some(rest) = directive(line, VERSION_DIRECTIVE) else {
            return Ok(());
        };
        match rest.parse::<u32>() {
            Ok(version) if (MIN_VERSION..=CURRENT_VERSION).contains(&version) => {
                self.version = version;
                self.advance();
                Ok(())
            }
            _ => self.error(format!("Unsupported config version '{rest}'")),
        }
    }

    fn header_allowed(&self, keyword: &str) -> Parsed<(), C::Error> {
        if self.body_started {
            return self.error(format!("{keyword} must precede all namespaces and templates"));
        }
        Ok(())
    }

    fn read_condition(&mut self, line: &str, in_template: bool) -> Parsed<(), C::Error> {
        if in_template {
            return self.error("Fact conditions are not allowed in subconfig templates");
        }
        self.advance();

        if let Some(rest) = directive(line, IF) {
            let condition = self.parse_condition(rest)?;
            if self.location.facts.iter().any(|c| c.fact == condition.fact) {
                return self.error(format!(
                    "Fact '{}' is already constrained by an enclosing #if",
                    condition.fact
                ));
            }
            self.location.push_condition(condition);
            return Ok(());
        }

        match self.location.facts.last() {
            None => self.error("#endif without matching #if"),
            Some(open) if open.level != self.depth => {
                self.error(format!("#endif closes '{open}', which was opened in another namespace"))
            }
            Some(_) => {
                self.location.pop_condition();
                Ok(())
            }
        }
    }

    fn parse_condition(&self, text: &str) -> Parsed<FactCondition, C::Error> {
        let mut condition: Option<FactCondition> = None;
        for part in text.split("||") {
            let Some((fact, value)) = part.split_once("==") else {
                return self.error(format!("Malformed fact condition '{}', expected 'fact == value'", part.trim()));
            };
            let fact = fact.trim();
            let value = value.trim();
            let value = unquote(value).unwrap_or_else(|| value.to_string());
            if fact.is_empty() || value.is_empty() {
                return self.error(format!("Empty fact or value in '{}'", part.trim()));
            }
            if let Some(c) = condition.as_mut() {
                if c.fact != fact {
                    return self.error(format!("#if may test only one fact, found '{}' and '{fact}'", c.fact));
                }
                c.add_value(value);
            } else {
                condition = Some(FactCondition::with_values(self.depth, fact, [value]));
            }
        }
        match condition {
            Some(condition) => Ok(condition),
            None => self.error("#if without condition"),
        }
    }

    fn read_define(&mut self, rest: &str) -> Parsed<(), C::Error> {
        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default().trim();
        let value = parts.next().unwrap_or_default().trim();
        if name.is_empty() || value.is_empty() {
            return self.error("#define needs a fact name and a value");
        }
        let value = unquote(value).unwrap_or_else(|| value.to_string());
        let location = self.element_location();
        self.emit(LoadedElement::Define(LoadedDefine {
            name: name.to_string(),
            value,
            location,
        }))
    }

    fn read_mapping_block(&mut self, rest: &str) -> Parsed<(), C::Error> {
        let start = self.line_no;
        let mapped_dir = if rest.is_empty() {
            String::new()
        } else {
            self.quoted(rest, MAP)?
        };

        loop {
            let Some(line) = self.peek() else {
                return self.error_at(start, "#map without #endmap");
            };
            self.advance();
            if directive(line, ENDMAP).is_some() {
                return Ok(());
            }
            let (from, to) = match line.split_once(':') {
                Some((from, to)) => (from.trim(), to.trim()),
                None => (line, line),
            };
            let malformed = |s: &str| s.is_empty() || s.contains(char::is_whitespace);
            if malformed(from) || malformed(to) {
                return self.error(format!("Malformed mapping '{line}', expected 'from : to'"));
            }
            let location = self.element_location();
            self.emit(LoadedElement::Mapping(LoadedMapping {
                from: from.to_string(),
                mapped_dir: mapped_dir.clone(),
                mapped_name: to.to_string(),
                location,
            }))?;
        }
    }

    fn read_override(&mut self) -> Parsed<(), C::Error> {
        let statement = self.read_statement()?;
        if let Some(caps) = OVERRIDE.captures(&statement) {
            let mut location = self.element_location();
            location.source = ParameterSource::FileDevOverride;
            return self.emit(LoadedElement::Override(LoadedOverride {
                name: caps["name"].to_string(),
                value: caps["value"].trim().to_string(),
                location,
            }));
        }
        if PARAMETER.is_match(&statement) {
            return self.error("Parameters must be declared inside a namespace");
        }
        self.error(format!("Malformed developer override '{statement}'"))
    }

    // Blocks

    fn read_template(&mut self, rest: &str) -> Parsed<(), C::Error> {
        let name = self.open_block(rest, TEMPLATE)?;
        if name.is_empty() || name.ends_with('*') || name.ends_with('.') || name.contains(char::is_whitespace) {
            return self.error(format!("Invalid subconfig template name '{name}'"));
        }
        if !self.location.facts.is_empty() {
            return self.error(format!("Subconfig template '{name}' must not be inside #if"));
        }
        if !self.templates.insert(name.clone()) {
            return self.error(format!("Subconfig template '{name}' is defined twice"));
        }
        self.read_block_body(&format!("{name}.*"), true)
    }

    fn read_namespace(&mut self, rest: &str, prefix: &str, in_template: bool) -> Parsed<(), C::Error> {
        let keyword = namespace_keyword(self.version);
        let header = self.open_block(rest, keyword)?;
        let (name, parent) = match header.split_once(':') {
            Some((name, parent)) => (name.trim(), Some(parent.trim())),
            None => (header.as_str(), None),
        };
        if name.contains('.') {
            return self.error(format!("{keyword} name '{name}' must not contain '.'"));
        }
        if !IDENTIFIER.is_match(name) {
            return self.error(format!("Invalid {keyword} name '{name}'"));
        }
        let section = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };

        if let Some(parent) = parent {
            if in_template {
                return self.error("Inheritance is not supported in subconfig templates");
            }
            if parent.is_empty() || parent.contains(char::is_whitespace) {
                return self.error(format!("Invalid parent '{parent}' for '{section}'"));
            }
            let location = self.element_location();
            self.emit(LoadedElement::Inheritance(LoadedInheritance {
                parent: parent.to_string(),
                section: section.clone(),
                location,
            }))?;
        }

        self.depth += 1;
        self.read_block_body(&section, in_template)?;
        self.depth -= 1;
        Ok(())
    }

    fn read_block_body(&mut self, section: &str, in_template: bool) -> Parsed<(), C::Error> {
        let opened_at = self.line_no;
        loop {
            let Some(line) = self.peek() else {
                return self.error_at(opened_at, format!("'{section}' is not closed"));
            };

            if let Some(trailing) = line.strip_prefix('}') {
                let trailing = trailing.trim();
                if !trailing.is_empty() && !trailing.starts_with("//") {
                    return self.error(format!("Unexpected text after '}}': '{trailing}'"));
                }
                if let Some(open) = self.location.facts.last().filter(|c| c.level >= self.depth) {
                    return self.error(format!("Unterminated #if {open} in '{section}'"));
                }
                self.advance();
                return Ok(());
            }

            if directive(line, IF).is_some() || directive(line, ENDIF).is_some() {
                self.read_condition(line, in_template)?;
            } else if let Some(rest) = directive(line, namespace_keyword(self.version)) {
                self.advance();
                self.read_namespace(rest, section, in_template)?;
            } else if line.starts_with('#') || directive(line, TEMPLATE).is_some() {
                return self.error(format!("'{line}' is only allowed before the first namespace"));
            } else {
                self.read_parameter(section, in_template)?;
            }
        }
    }

    fn read_parameter(&mut self, section: &str, in_template: bool) -> Parsed<(), C::Error> {
        let mut help: Vec<&str> = Vec::new();
        let mut tags: Vec<(usize, &str)> = Vec::new();
        let mut in_help = true;
        while let Some(line) = self.peek() {
            let Some(text) = line.strip_prefix(METADATA_PREFIX) else {
                break;
            };
            self.advance();
            let text = text.trim();
            if text.starts_with('\\') {
                in_help = false;
                tags.push((self.line_no, text));
            } else if text.is_empty() {
                in_help = false;
            } else if in_help {
                help.push(text);
            } else {
                return self.error("Help text must precede the metadata lines");
            }
        }

        let statement = self.read_statement()?;
        let Some(caps) = PARAMETER.captures(&statement) else {
            return self.error(format!("Malformed parameter declaration '{statement}'"));
        };

        let name = format!("{section}.{}", &caps["name"]);
        let mut metadata = Metadata::typed(name.as_str(), &caps["type"]);
        metadata.set_help(&help.join(" "));
        for (line, text) in tags {
            self.apply_tag(&mut metadata, line, text)?;
        }

        let value = caps["value"].trim().to_string();
        if value.is_empty() {
            return self.error(format!("Missing value for '{name}'"));
        }
        let is_reference = caps.name("reference").is_some();
        let location = self.element_location();

        let element = match (is_reference, in_template) {
            (true, true) => return self.error("References are not supported in subconfig templates"),
            (true, false) => LoadedElement::Reference(LoadedReference {
                target: value,
                metadata,
                location,
            }),
            (false, true) => LoadedElement::TemplateParameter(LoadedTemplateParameter {
                value,
                metadata,
                location,
            }),
            (false, false) => LoadedElement::Parameter(LoadedParameter {
                value,
                metadata,
                location,
            }),
        };
        self.emit(element)
    }

    fn apply_tag(&self, metadata: &mut Metadata, line: usize, text: &str) -> Parsed<(), C::Error> {
        let (tag, value) = match text.split_once(char::is_whitespace) {
            Some((tag, value)) => (tag, value.trim()),
            None => (text, ""),
        };
        if value.is_empty() {
            return self.error_at(line, format!("Metadata {tag} needs a value"));
        }
        match tag {
            CMDLINE => metadata.cmdline_switch = Some(value.to_string()),
            SUGGESTED => metadata.default_value = Some(value.to_string()),
            SUGGESTED_REF => metadata.suggested_reference = Some(value.to_string()),
            OPTIONAL => metadata.optional = matches!(value, "1" | "true"),
            RESTRICTION => match Restriction::parse(value) {
                Ok(restriction) => metadata.restriction = Some(restriction),
                Err(e) => return self.error_at(line, e.to_string()),
            },
            COMMENT => metadata.user_comment = Some(value.to_string()),
            other => return self.error_at(line, format!("Unknown metadata '{other}'")),
        }
        Ok(())
    }

    // Helpers

    fn quoted(&self, text: &str, keyword: &str) -> Parsed<String, C::Error> {
        match unquote(text) {
            Some(path) if !path.is_empty() => Ok(path),
            _ => self.error(format!("{keyword} expects a quoted, non-empty path")),
        }
    }

    fn element_location(&mut self) -> StorageLocation {
        let mut location = self.location.clone();
        location.comments = std::mem::take(&mut self.comments);
        location
    }

    fn emit(&mut self, element: LoadedElement) -> Parsed<(), C::Error> {
        self.client.add_element(element).map_err(ImportError::Client)
    }

    fn error<T>(&self, message: impl Into<String>) -> Parsed<T, C::Error> {
        self.error_at(self.line_no, message)
    }

    fn error_at<T>(&self, line: usize, message: impl Into<String>) -> Parsed<T, C::Error> {
        Err(ImportError::Format(Error::parse(&self.source_name, line, message)))
    }
}

/// Separator rules and the end marker written by the exporter.
fn is_decoration(comment: &str) -> bool {
    comment == EOF_MARKER || (!comment.is_empty() && comment.chars().all(|c| c == '-'))
}

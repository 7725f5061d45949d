//! Parameter metadata

use serde::{Deserialize, Serialize};

use crate::restriction::Restriction;
use crate::text::simplify;

/// Everything a parameter declares besides its value.
///
/// Metadata created from an override or a command line switch only knows
/// the name; such metadata is *incomplete* until the parameter itself is
/// loaded or registered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Full dotted name, e.g. `ports.cmd`.
    pub name: String,
    /// Declared type tag, e.g. `int`; `None` while incomplete.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
    /// Suggested value, or the default of an optional parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmdline_switch: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restriction: Option<Restriction>,
    /// User comment kept with the parameter; never compared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_comment: Option<String>,
}

impl Metadata {
    /// Incomplete metadata carrying only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn typed(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: Some(type_name.into()),
            ..Self::default()
        }
    }

    pub fn with_help(mut self, help: &str) -> Self {
        self.set_help(help);
        self
    }

    /// Set help text with whitespace runs collapsed.
    pub fn set_help(&mut self, help: &str) {
        self.help = simplify(help);
    }

    pub fn is_incomplete(&self) -> bool {
        self.type_name.is_none()
    }

    /// Last dotted segment of the name.
    pub fn leaf_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Everything before the last dot; empty for undotted names.
    pub fn section(&self) -> &str {
        self.name.rsplit_once('.').map(|(s, _)| s).unwrap_or("")
    }

    /// Compare declarations.
    ///
    /// Type and restriction are always compared. In strict mode help,
    /// command line switch, optional flag, suggested reference and default
    /// are compared too. Names and user comments are never compared.
    pub fn is_equivalent(&self, other: &Metadata, strict: bool) -> bool {
        if self.type_name != other.type_name {
            return false;
        }
        let restriction_text = |m: &Metadata| m.restriction.as_ref().map(|r| r.to_string());
        if restriction_text(self) != restriction_text(other) {
            return false;
        }
        if !strict {
            return true;
        }

        self.help == other.help
            && self.cmdline_switch == other.cmdline_switch
            && self.optional == other.optional
            && self.suggested_reference == other.suggested_reference
            && self.comparable_default() == other.comparable_default()
    }

    /// Bools may be written as `0`/`1` or `false`/`true`.
    fn comparable_default(&self) -> Option<String> {
        let value = self.default_value.clone()?;
        if self.type_name.as_deref() == Some("bool") {
            return Some(value.replace('0', "false").replace('1', "true"));
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_metadata() {
        assert!(Metadata::new("ports.cmd").is_incomplete());
        assert!(!Metadata::typed("ports.cmd", "int").is_incomplete());
    }

    #[test]
    fn test_help_is_simplified() {
        let m = Metadata::typed("a.b", "int").with_help("  some\n   help  text ");
        assert_eq!(m.help, "some help text");
    }

    #[test]
    fn test_name_parts() {
        let m = Metadata::new("daq.fdp.cmd");
        assert_eq!(m.leaf_name(), "cmd");
        assert_eq!(m.section(), "daq.fdp");
    }

    #[test]
    fn test_equivalence_loose_and_strict() {
        let a = Metadata::typed("x.a", "int").with_help("first");
        let mut b = Metadata::typed("x.b", "int").with_help("second");
        assert!(a.is_equivalent(&b, false));
        assert!(!a.is_equivalent(&b, true));

        b.restriction = Some(Restriction::range(Some(0), None::<i32>));
        assert!(!a.is_equivalent(&b, false));
    }

    #[test]
    fn test_bool_defaults_compare_across_spellings() {
        let mut a = Metadata::typed("x.flag", "bool");
        a.default_value = Some("1".into());
        let mut b = a.clone();
        b.default_value = Some("true".into());
        assert!(a.is_equivalent(&b, true));
    }

    #[test]
    fn test_user_comment_never_compared() {
        let a = Metadata::typed("x.a", "int");
        let mut b = a.clone();
        b.user_comment = Some("tuned by ops".into());
        assert!(a.is_equivalent(&b, true));
    }
}

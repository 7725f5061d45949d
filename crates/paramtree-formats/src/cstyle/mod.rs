//! The line-oriented cstyle format (`.pt`).
//!
//! The format is versioned through a leading `#config_version N` line:
//!
//! - version 1 opens sections with `section`
//! - version 2 renames the keyword to `namespace`
//! - version 3 adds `subconfig_template` blocks

mod exporter;
mod importer;

pub use exporter::CstyleExporter;
pub use importer::CstyleImporter;

/// Newest structural version; written unless pinned lower.
pub const CURRENT_VERSION: u32 = 3;
pub const MIN_VERSION: u32 = 1;

/// First version with subconfig template blocks.
pub const TEMPLATE_VERSION: u32 = 3;

pub(crate) const VERSION_DIRECTIVE: &str = "#config_version";
pub(crate) const IF: &str = "#if";
pub(crate) const ENDIF: &str = "#endif";
pub(crate) const DEFINE: &str = "#define";
pub(crate) const MAP: &str = "#map";
pub(crate) const ENDMAP: &str = "#endmap";
pub(crate) const SEARCH: &str = "#search";
pub(crate) const INCLUDE: &str = "#include";
pub(crate) const TEMPLATE: &str = "subconfig_template";
pub(crate) const METADATA_PREFIX: &str = "//!";
pub(crate) const EOF_MARKER: &str = "EOF";

pub(crate) const CMDLINE: &str = "\\cmdline";
pub(crate) const SUGGESTED: &str = "\\suggested";
pub(crate) const SUGGESTED_REF: &str = "\\suggested_ref";
pub(crate) const OPTIONAL: &str = "\\optional";
pub(crate) const RESTRICTION: &str = "\\restriction";
pub(crate) const COMMENT: &str = "\\comment";

/// Keyword opening a namespace in `version`.
pub(crate) fn namespace_keyword(version: u32) -> &'static str {
    if version < 2 { "section" } else { "namespace" }
}

/// The rest of `line` when it starts with the word `keyword`.
pub(crate) fn directive<'l>(line: &'l str, keyword: &str) -> Option<&'l str> {
    let rest = line.strip_prefix(keyword)?;
    if rest.is_empty() {
        return Some(rest);
    }
    rest.starts_with(char::is_whitespace).then(|| rest.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("#if site == a", "#if", Some("site == a"))]
    #[case("#endif", "#endif", Some(""))]
    #[case("#ifdef x", "#if", None)]
    #[case("#include \"x\"", "#include", Some("\"x\""))]
    #[case("namespaces", "namespace", None)]
    fn test_directive(#[case] line: &str, #[case] keyword: &str, #[case] expected: Option<&str>) {
        assert_eq!(directive(line, keyword), expected);
    }

    #[test]
    fn test_keyword_by_version() {
        assert_eq!(namespace_keyword(1), "section");
        assert_eq!(namespace_keyword(2), "namespace");
        assert_eq!(namespace_keyword(3), "namespace");
    }
}

//! Registration backend abstraction
//!
//! A section registers its parameters through one of two backends. The
//! namespaced backend is the regular one. The legacy backend serves
//! sections whose parameters used to live under a flat old-style prefix:
//! values stored under the old names are still picked up, and metadata is
//! only checked for type and restriction.

mod legacy;
mod namespaced;

pub use legacy::LegacyBackend;
pub use namespaced::NamespacedBackend;

use std::fmt;

/// Strategy deciding how registrations are named and checked.
pub trait RegistrationBackend: Send + Sync + fmt::Debug {
    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Additional names the parameter `prefix.leaf` may have been stored
    /// under.
    fn deprecated_names(&self, prefix: &str, leaf: &str) -> Vec<String>;

    /// Whether registered and loaded metadata must agree on help, switch,
    /// optional flag, suggested reference and default, not just on type
    /// and restriction.
    fn strict_metadata(&self) -> bool;
}

/// `prefix.leaf`, or `leaf` for an empty prefix.
pub(crate) fn join_name(prefix: &str, leaf: &str) -> String {
    if prefix.is_empty() {
        leaf.to_string()
    } else {
        format!("{prefix}.{leaf}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backends_differ_in_checks_and_names() {
        let namespaced = NamespacedBackend;
        let legacy = LegacyBackend::new("old_ports");

        assert!(namespaced.strict_metadata());
        assert!(!legacy.strict_metadata());
        assert!(namespaced.deprecated_names("ports", "cmd").is_empty());
        assert_eq!(legacy.deprecated_names("ports", "cmd"), vec!["old_ports.cmd"]);
    }

    #[test]
    fn test_join_name() {
        assert_eq!(join_name("", "a"), "a");
        assert_eq!(join_name("x.y", "a"), "x.y.a");
    }
}

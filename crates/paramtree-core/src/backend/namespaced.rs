//! Regular dotted-namespace registration

use super::RegistrationBackend;

/// Backend for sections that live in a dotted namespace.
///
/// In this mode:
/// - Parameters are known only by their dotted name
/// - Loaded metadata must match the registration exactly
#[derive(Debug, Clone, Copy, Default)]
pub struct NamespacedBackend;

impl RegistrationBackend for NamespacedBackend {
    fn name(&self) -> &'static str {
        "namespaced"
    }

    fn deprecated_names(&self, _prefix: &str, _leaf: &str) -> Vec<String> {
        Vec::new()
    }

    fn strict_metadata(&self) -> bool {
        true
    }
}

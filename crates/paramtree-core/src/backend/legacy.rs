//! Registration for sections migrated from flat old-style names

use super::{join_name, RegistrationBackend};

/// Backend for sections whose parameters used to live under another
/// prefix.
///
/// In this mode:
/// - Every parameter is also looked up as `legacy_prefix.leaf`
/// - Loaded metadata only has to agree on type and restriction, since old
///   files rarely carry help texts or switches
#[derive(Debug, Clone)]
pub struct LegacyBackend {
    legacy_prefix: String,
}

impl LegacyBackend {
    pub fn new(legacy_prefix: impl Into<String>) -> Self {
        Self {
            legacy_prefix: legacy_prefix.into(),
        }
    }

    pub fn legacy_prefix(&self) -> &str {
        &self.legacy_prefix
    }
}

impl RegistrationBackend for LegacyBackend {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn deprecated_names(&self, prefix: &str, leaf: &str) -> Vec<String> {
        if self.legacy_prefix.is_empty() || self.legacy_prefix == prefix {
            return Vec::new();
        }
        vec![join_name(&self.legacy_prefix, leaf)]
    }

    fn strict_metadata(&self) -> bool {
        false
    }
}

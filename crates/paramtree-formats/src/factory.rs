//! Exporter selection and the cstyle version pin.

use paramtree_meta::ConfigFormat;

use crate::cstyle::{CstyleExporter, CURRENT_VERSION, MIN_VERSION};
use crate::json::JsonExporter;
use crate::Exporter;

/// Pins the newest cstyle version the exporters may write, e.g. so that
/// files stay readable by older deployments.
pub const PIN_VERSION_ENV: &str = "PARAMTREE_PIN_CSTYLE_VERSION";

/// Hands out exporters configured with the pinned cstyle version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExporterFactory {
    cstyle_version: u32,
}

impl Default for ExporterFactory {
    fn default() -> Self {
        Self {
            cstyle_version: CURRENT_VERSION,
        }
    }
}

impl ExporterFactory {
    /// Read the pin from [`PIN_VERSION_ENV`].
    pub fn from_env() -> Self {
        let raw = std::env::var(PIN_VERSION_ENV).ok();
        Self {
            cstyle_version: parse_pinned_version(raw.as_deref()),
        }
    }

    pub fn with_cstyle_version(version: u32) -> Self {
        Self {
            cstyle_version: version.clamp(MIN_VERSION, CURRENT_VERSION),
        }
    }

    pub fn cstyle_version(&self) -> u32 {
        self.cstyle_version
    }

    pub fn exporter(&self, format: ConfigFormat) -> Box<dyn Exporter> {
        match format {
            ConfigFormat::Cstyle => Box::new(CstyleExporter::with_version(self.cstyle_version)),
            ConfigFormat::Json => Box::new(JsonExporter::new()),
        }
    }
}

/// Interpret a pin value. Unset means current; anything outside the
/// supported range is ignored with a warning.
pub fn parse_pinned_version(raw: Option<&str>) -> u32 {
    let Some(raw) = raw else {
        return CURRENT_VERSION;
    };
    match raw.trim().parse::<u32>() {
        Ok(version) if (MIN_VERSION..=CURRENT_VERSION).contains(&version) => {
            tracing::debug!(version, "cstyle version pinned");
            version
        }
        _ => {
            tracing::warn!(
                value = raw,
                fallback = CURRENT_VERSION,
                "ignoring invalid {PIN_VERSION_ENV}"
            );
            CURRENT_VERSION
        }
    }
}

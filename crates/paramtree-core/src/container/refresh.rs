//! Writing resolved values into registered parameters

use std::collections::BTreeMap;
use std::fmt;

use paramtree_meta::{ElementKind, LoadedElement, Metadata, ParameterSource};
use serde::Serialize;

use super::resolve::{ResolvedValue, Resolver};
use super::{CheckingMode, Container};
use crate::error::{Error, Result};

const FRAME_WIDTH: usize = 80;

/// Everything one refresh found, collected instead of failing on the first
/// problem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshResult {
    /// Registered mandatory parameters without a value
    pub missing_parameters: Vec<String>,
    /// Registered and loaded metadata that disagree
    pub metadata_mismatch: Vec<String>,
    /// Names loaded from more than one file
    pub loaded_duplicates: Vec<String>,
    /// Included configs that were not found
    pub missing_configs: Vec<String>,
    /// `name -> target` for references that lead nowhere
    pub unresolved_references: Vec<String>,
    /// `old -> new` for values loaded under a deprecated name
    pub loaded_deprecated_names: Vec<String>,
    pub cmdline_errors: Vec<String>,
    /// Conversion failures, restriction violations and malformed
    /// subconfig entries
    pub errors: Vec<String>,
}

impl RefreshResult {
    /// Whether anything besides duplicates and deprecated names was found.
    pub fn has_errors(&self) -> bool {
        !(self.missing_parameters.is_empty()
            && self.metadata_mismatch.is_empty()
            && self.missing_configs.is_empty()
            && self.unresolved_references.is_empty()
            && self.cmdline_errors.is_empty()
            && self.errors.is_empty())
    }

    pub fn is_clean(&self) -> bool {
        !self.has_errors() && self.loaded_duplicates.is_empty() && self.loaded_deprecated_names.is_empty()
    }

    fn sections(&self) -> [(&'static str, &[String]); 8] {
        [
            ("Missing parameters", self.missing_parameters.as_slice()),
            ("Metadata mismatch", self.metadata_mismatch.as_slice()),
            ("Loaded duplicates", self.loaded_duplicates.as_slice()),
            ("Missing configs", self.missing_configs.as_slice()),
            ("Unresolved references", self.unresolved_references.as_slice()),
            ("Loaded deprecated names", self.loaded_deprecated_names.as_slice()),
            ("Command line errors", self.cmdline_errors.as_slice()),
            ("Errors", self.errors.as_slice()),
        ]
    }

    /// Multi-line report with one framed block per non-empty list.
    pub fn error_message(&self) -> String {
        let top = "v".repeat(FRAME_WIDTH);
        let bottom = "^".repeat(FRAME_WIDTH);
        let mut out = String::new();
        for (title, entries) in self.sections() {
            if entries.is_empty() {
                continue;
            }
            out.push_str(&top);
            out.push('\n');
            out.push_str(title);
            out.push_str(":\n");
            for entry in entries {
                for (idx, line) in entry.lines().enumerate() {
                    out.push_str(if idx == 0 { "  " } else { "    " });
                    out.push_str(line);
                    out.push('\n');
                }
            }
            out.push_str(&bottom);
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for RefreshResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.error_message())
    }
}

fn push_unique(list: &mut Vec<String>, entry: String) {
    if !list.contains(&entry) {
        list.push(entry);
    }
}

impl Container {
    /// Resolve every registered parameter and write it into its slot.
    ///
    /// Instances of subconfig maps found in the loaded data are created and
    /// registered first. Cycles abort immediately; everything else is
    /// collected into the returned [`RefreshResult`]. In strict checking
    /// mode a result with errors is returned as [`Error::RefreshFailed`].
    pub fn refresh(&mut self) -> Result<RefreshResult> {
        self.prune();
        let mut report = RefreshResult::default();
        for error in self.populate_subconfigs()? {
            push_unique(&mut report.errors, error);
        }
        report.missing_configs = self.missing_configs.clone();
        report.loaded_duplicates = self.data.duplicates().to_vec();

        let mode = self.checking_mode();
        let mut outdated_metadata = false;
        let mut outcomes: Vec<Option<ResolvedValue>> = Vec::with_capacity(self.registrations.len());
        {
            let mut resolver = Resolver::new(self);
            for registration in &self.registrations {
                let name = registration.name();
                if let Some(loaded) = self.loaded_metadata(name) {
                    if loaded.type_name != registration.metadata.type_name {
                        push_unique(
                            &mut report.metadata_mismatch,
                            format!(
                                "{name}: loaded as {}, registered as {}",
                                loaded.type_name.as_deref().unwrap_or("?"),
                                registration.metadata.type_name.as_deref().unwrap_or("?")
                            ),
                        );
                    } else if !loaded.is_equivalent(&registration.metadata, true) {
                        outdated_metadata = true;
                    }
                }

                let resolved = resolver.resolve(name)?;
                if resolved.is_none() {
                    let lead = format!("{name} -> ");
                    if !resolver.unresolved.iter().any(|u| u.starts_with(&lead)) {
                        push_unique(&mut report.missing_parameters, name.to_string());
                    }
                }
                outcomes.push(resolved);
            }
            report.unresolved_references = resolver.unresolved;
            report.loaded_deprecated_names = resolver.deprecated;
            report.metadata_mismatch.extend(resolver.mismatches);
        }

        if outdated_metadata && mode == CheckingMode::Autosave {
            tracing::debug!("loaded metadata is outdated, save required");
            self.save_required = true;
        }

        for (registration, resolved) in self.registrations.iter_mut().zip(outcomes) {
            let name = registration.metadata.name.clone();
            registration.rejected = false;
            let Some(resolved) = resolved else {
                registration.source = ParameterSource::Unknown;
                continue;
            };

            if resolved.suggested {
                match mode {
                    CheckingMode::Autosave => {
                        tracing::debug!(name = %name, value = %resolved.value, "using suggested value");
                        self.save_required = true;
                    }
                    CheckingMode::Lenient => {
                        tracing::warn!(name = %name, value = %resolved.value, "using suggested value");
                    }
                    CheckingMode::Strict => {}
                }
            }

            if let Some(violation) = registration
                .metadata
                .restriction
                .as_ref()
                .and_then(|r| r.check(&name, &resolved.value))
            {
                push_unique(&mut report.errors, violation);
                registration.rejected = true;
                registration.refreshed = registration.binding.current();
                continue;
            }

            match registration.binding.assign(&resolved.value) {
                Ok(()) => {
                    registration.source = resolved.source;
                    registration.refreshed = registration.binding.current();
                }
                Err(e) => {
                    registration.rejected = true;
                    registration.refreshed = registration.binding.current();
                    push_unique(
                        &mut report.errors,
                        format!(
                            "Failed to convert value '{}' of {name} ({}): {e}",
                            resolved.value, resolved.source
                        ),
                    );
                }
            }
        }

        report.cmdline_errors = self.cmdline_errors();

        if report.has_errors() {
            tracing::debug!(report = %report, "refresh found problems");
            if mode == CheckingMode::Strict {
                return Err(Error::RefreshFailed {
                    report: Box::new(report),
                });
            }
        }
        tracing::info!(
            parameters = self.registrations.len(),
            deprecated = report.loaded_deprecated_names.len(),
            "refreshed"
        );
        Ok(report)
    }

    fn loaded_metadata(&self, name: &str) -> Option<&Metadata> {
        [ElementKind::Parameter, ElementKind::Reference]
            .into_iter()
            .filter_map(|kind| self.data.get(kind, name))
            .filter_map(LoadedElement::metadata)
            .find(|m| !m.is_incomplete())
    }

    fn cmdline_errors(&self) -> Vec<String> {
        let mut owners: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for registration in self.registrations() {
            if let Some(switch) = registration.metadata.cmdline_switch.as_deref() {
                let names = owners.entry(switch).or_default();
                if !names.contains(&registration.name()) {
                    names.push(registration.name());
                }
            }
        }

        let mut errors = Vec::new();
        for (switch, names) in &owners {
            if names.len() > 1 {
                errors.push(format!("-{switch} is declared by {}", names.join(", ")));
            }
        }
        for (switch, _) in self.cmdline.switches() {
            if !owners.contains_key(switch) {
                errors.push(format!("unknown switch -{switch}"));
            }
        }
        for (name, _) in self.cmdline.overrides() {
            let known = self
                .registrations()
                .any(|r| r.name() == name || r.deprecated_names.iter().any(|d| d == name));
            if !known {
                errors.push(format!("--{name} does not name a registered parameter"));
            }
        }
        errors
    }
}

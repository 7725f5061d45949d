//! Command line arguments addressed to parameters

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Parsed command line.
///
/// `-switch value` sets the parameter declaring that switch,
/// `--dotted.name value` sets a parameter by name. The value of a switch is
/// omitted when the next token starts with `-`. A bare `--`, or any
/// non-dash token when extras are allowed, starts the extra command line,
/// which is handed back to the application untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cmdline {
    switches: BTreeMap<String, String>,
    overrides: BTreeMap<String, String>,
    extra: Vec<String>,
}

impl Cmdline {
    /// Parse arguments, excluding the program name.
    pub fn parse<I, S>(args: I, allow_extra: bool) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        let mut cmdline = Self::default();
        let mut idx = 0;

        while idx < args.len() {
            let token = &args[idx];
            idx += 1;

            if token == "--" {
                cmdline.extra.extend(args[idx..].iter().cloned());
                break;
            }

            if let Some(name) = token.strip_prefix("--") {
                let Some(value) = args.get(idx) else {
                    return Err(Error::cmdline(format!("--{name} requires a value")));
                };
                idx += 1;
                insert_unique(&mut cmdline.overrides, "--", name, value)?;
                continue;
            }

            if let Some(switch) = token.strip_prefix('-').filter(|s| !s.is_empty()) {
                let value = match args.get(idx) {
                    Some(next) if !next.starts_with('-') => {
                        idx += 1;
                        next.clone()
                    }
                    _ => String::new(),
                };
                insert_unique(&mut cmdline.switches, "-", switch, &value)?;
                continue;
            }

            if allow_extra {
                cmdline.extra.extend(args[idx - 1..].iter().cloned());
                break;
            }
            return Err(Error::cmdline(format!("unexpected argument '{token}'")));
        }

        tracing::debug!(
            switches = cmdline.switches.len(),
            overrides = cmdline.overrides.len(),
            extra = cmdline.extra.len(),
            "parsed command line"
        );
        Ok(cmdline)
    }

    pub fn switch(&self, name: &str) -> Option<&str> {
        self.switches.get(name).map(String::as_str)
    }

    pub fn override_value(&self, name: &str) -> Option<&str> {
        self.overrides.get(name).map(String::as_str)
    }

    pub fn switches(&self) -> impl Iterator<Item = (&str, &str)> {
        self.switches.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.overrides.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn extra(&self) -> &[String] {
        &self.extra
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty() && self.overrides.is_empty() && self.extra.is_empty()
    }
}

fn insert_unique(map: &mut BTreeMap<String, String>, dashes: &str, name: &str, value: &str) -> Result<()> {
    match map.get(name) {
        Some(existing) if existing != value => Err(Error::cmdline(format!(
            "{dashes}{name} given twice with different values ('{existing}' and '{value}')"
        ))),
        Some(_) => Ok(()),
        None => {
            map.insert(name.to_string(), value.to_string());
            Ok(())
        }
    }
}

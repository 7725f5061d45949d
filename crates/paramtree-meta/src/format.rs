//! Storage formats and parameter provenance

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A textual storage format a config can be read from and written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    /// Line-oriented, C-like format with namespaces, fact blocks and
    /// subconfig templates.
    #[default]
    Cstyle,
    /// Structured JSON rendition of the same section tree.
    Json,
}

impl ConfigFormat {
    /// All formats in lookup order.
    pub const ALL: [ConfigFormat; 2] = [ConfigFormat::Cstyle, ConfigFormat::Json];

    /// File extension including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Cstyle => ".pt",
            ConfigFormat::Json => ".json",
        }
    }

    /// Detect the format from a file name with extension.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| file_name.ends_with(format.extension()))
    }
}

impl FromStr for ConfigFormat {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cstyle" | "pt" => Ok(ConfigFormat::Cstyle),
            "json" => Ok(ConfigFormat::Json),
            _ => Err(Error::UnknownFormat {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFormat::Cstyle => write!(f, "cstyle"),
            ConfigFormat::Json => write!(f, "json"),
        }
    }
}

/// Where a parameter value ultimately came from.
///
/// Variants are declared in priority order: a lower variant never
/// overrides a higher one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterSource {
    /// `-switch value` on the command line.
    CmdlineParam,
    /// `--dotted.name value` on the command line.
    CmdlineOverride,
    /// `name = value;` in the override section of a config file.
    FileDevOverride,
    /// An ordinary parameter line in a config file.
    FileOrdinary,
    /// Value obtained by following a reference.
    ResolvedReference,
    /// Value copied from a parent section.
    InheritedParameter,
    /// Default of a parameter that may only be given on the command line.
    DefaultPure,
    /// Default of an optional parameter.
    DefaultOptional,
    #[default]
    Unknown,
}

impl ParameterSource {
    /// Whether the value was given on the command line in either syntax.
    pub fn is_cmdline(&self) -> bool {
        matches!(self, Self::CmdlineParam | Self::CmdlineOverride)
    }

    /// Whether the value overrides whatever a config file says.
    pub fn is_override(&self) -> bool {
        matches!(
            self,
            Self::CmdlineParam | Self::CmdlineOverride | Self::FileDevOverride
        )
    }
}

impl fmt::Display for ParameterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CmdlineParam => "command line",
            Self::CmdlineOverride => "command line override",
            Self::FileDevOverride => "developer override",
            Self::FileOrdinary => "file",
            Self::ResolvedReference => "reference",
            Self::InheritedParameter => "inherited",
            Self::DefaultPure => "command line default",
            Self::DefaultOptional => "optional default",
            Self::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

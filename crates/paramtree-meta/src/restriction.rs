//! Value restrictions declared for parameters

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::text::split_nested;

const VALUE_LIST_PREFIX: &str = "Valid values";
const CONTAINER_VALUES_PREFIX: &str = "Valid container values";
const RANGE_PREFIX: &str = "Range";
const REGEX_PREFIX: &str = "Matches Regex";

/// A constraint on the legal values of a parameter.
///
/// Values are kept as strings: a restriction loaded from a file is not
/// tied to a concrete value type. The textual form is the one written to
/// config files, see [`Restriction::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Restriction {
    /// The value must be one of the listed values.
    ValueList(Vec<String>),
    /// Every element of a container value must be one of the listed values.
    ContainerValues(Vec<String>),
    /// Numeric range, either bound may be open.
    Range {
        min: Option<String>,
        max: Option<String>,
    },
    /// The whole value must match the pattern.
    Regex(String),
}

impl Restriction {
    pub fn values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Restriction::ValueList(values.into_iter().map(Into::into).collect())
    }

    pub fn range(min: Option<impl ToString>, max: Option<impl ToString>) -> Self {
        Restriction::Range {
            min: min.map(|v| v.to_string()),
            max: max.map(|v| v.to_string()),
        }
    }

    /// Parse the textual form, e.g. `Range: from 1 to 10`.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |message: &str| Error::InvalidRestriction {
            text: text.to_string(),
            message: message.to_string(),
        };

        let (prefix, body) = text
            .split_once(':')
            .ok_or_else(|| invalid("missing ':' after restriction kind"))?;
        let body = body.trim();

        match prefix.trim() {
            VALUE_LIST_PREFIX => split_nested(body, ',')
                .map(Restriction::ValueList)
                .ok_or_else(|| invalid("unbalanced value list")),
            CONTAINER_VALUES_PREFIX => split_nested(body, ',')
                .map(Restriction::ContainerValues)
                .ok_or_else(|| invalid("unbalanced value list")),
            RANGE_PREFIX => {
                let tokens: Vec<&str> = body.split_whitespace().collect();
                match tokens.as_slice() {
                    ["from", min, "to", max] => Ok(Restriction::Range {
                        min: Some(min.to_string()),
                        max: Some(max.to_string()),
                    }),
                    ["from", min] => Ok(Restriction::Range {
                        min: Some(min.to_string()),
                        max: None,
                    }),
                    ["to", max] => Ok(Restriction::Range {
                        min: None,
                        max: Some(max.to_string()),
                    }),
                    _ => Err(invalid("expected 'from X to Y', 'from X' or 'to Y'")),
                }
            }
            REGEX_PREFIX => {
                Regex::new(body).map_err(|e| invalid(&e.to_string()))?;
                Ok(Restriction::Regex(body.to_string()))
            }
            _ => Err(invalid("unknown restriction kind")),
        }
    }

    /// Check `value` for parameter `name`.
    ///
    /// Returns the human readable violation, or `None` if the value is
    /// acceptable.
    pub fn check(&self, name: &str, value: &str) -> Option<String> {
        match self {
            Restriction::ValueList(valid) => {
                let candidate = crate::text::unquote(value).unwrap_or_else(|| value.to_string());
                if valid.iter().any(|v| v == value || *v == candidate) {
                    None
                } else {
                    Some(format!(
                        "Invalid value specified for \"{name}\" : {value}.\nValid values are: {}.",
                        valid.join(", ")
                    ))
                }
            }
            Restriction::ContainerValues(valid) => {
                let inner = value
                    .trim()
                    .strip_prefix('[')
                    .and_then(|v| v.strip_suffix(']'))
                    .unwrap_or(value);
                let Some(elements) = split_nested(inner, ',') else {
                    return Some(format!("Malformed container value for \"{name}\" : {value}."));
                };
                let invalid: Vec<&String> = elements
                    .iter()
                    .filter(|e| !valid.iter().any(|v| v == *e))
                    .collect();
                if invalid.is_empty() {
                    None
                } else {
                    Some(format!(
                        "Invalid value specified for \"{name}\" : {value}.\nValid values are: {}.",
                        valid.join(", ")
                    ))
                }
            }
            Restriction::Range { min, max } => {
                let Ok(number) = value.trim().parse::<f64>() else {
                    return Some(format!(
                        "Value \"{value}\" for parameter \"{name}\" is not a number."
                    ));
                };
                if let Some(min) = min {
                    if min.parse::<f64>().is_ok_and(|m| number < m) {
                        return Some(format!(
                            "Value \"{value}\" is smaller than minimum allowed value \"{min}\" for parameter \"{name}\"."
                        ));
                    }
                }
                if let Some(max) = max {
                    if max.parse::<f64>().is_ok_and(|m| number > m) {
                        return Some(format!(
                            "Value \"{value}\" is larger than maximum allowed value \"{max}\" for parameter \"{name}\"."
                        ));
                    }
                }
                None
            }
            Restriction::Regex(pattern) => {
                let anchored = format!("^(?:{pattern})$");
                match Regex::new(&anchored) {
                    Ok(re) if re.is_match(value) => None,
                    Ok(_) => Some(format!(
                        "Value '{value}' for parameter '{name}' does not match specified regular expression '{pattern}'!"
                    )),
                    Err(e) => Some(format!("Invalid regular expression '{pattern}': {e}")),
                }
            }
        }
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Restriction::ValueList(values) => {
                write!(f, "{VALUE_LIST_PREFIX}: {}", values.join(", "))
            }
            Restriction::ContainerValues(values) => {
                write!(f, "{CONTAINER_VALUES_PREFIX}: {}", values.join(", "))
            }
            Restriction::Range { min, max } => {
                write!(f, "{RANGE_PREFIX}:")?;
                if let Some(min) = min {
                    write!(f, " from {min}")?;
                }
                if let Some(max) = max {
                    write!(f, " to {max}")?;
                }
                Ok(())
            }
            Restriction::Regex(pattern) => write!(f, "{REGEX_PREFIX}: {pattern}"),
        }
    }
}

//! Config document parsing with format fallback.
//!
//! Metadata is usually serialized as JSON by tooling, but operators also
//! paste hand-written YAML into guestinfo. JSON is tried first; YAML is
//! the fallback and its error is the one reported.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};

/// A structured format a payload may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

/// Order in which formats are attempted.
pub const PARSE_ORDER: [ConfigFormat; 2] = [ConfigFormat::Json, ConfigFormat::Yaml];

impl ConfigFormat {
    /// Parse `text` in this format only.
    pub fn parse(self, text: &str) -> std::result::Result<Value, String> {
        match self {
            ConfigFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            ConfigFormat::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
        }
    }
}

impl std::fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigFormat::Json => write!(f, "json"),
            ConfigFormat::Yaml => write!(f, "yaml"),
        }
    }
}

/// Parse a config payload.
///
/// Absent or blank input is an empty mapping, as is a YAML document that
/// holds nothing but comments.
pub fn parse(text: Option<&str>) -> Result<Value> {
    let text = match text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Ok(Value::Object(Map::new())),
    };

    let mut last_err = String::new();
    for format in PARSE_ORDER {
        match format.parse(text) {
            Ok(Value::Null) => return Ok(Value::Object(Map::new())),
            Ok(value) => {
                debug!(%format, "parsed config payload");
                return Ok(value);
            }
            Err(e) => {
                debug!(%format, error = %e, "config payload is not {}", format);
                last_err = e;
            }
        }
    }

    Err(Error::ConfigParse { reason: last_err })
}

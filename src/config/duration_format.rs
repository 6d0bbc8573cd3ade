//! Duration parsing for configuration values.
//!
//! Uses `humantime` syntax: `90d`, `36h`, `1week 2days`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

use crate::error::ConfigError;

/// Parse a humantime duration string.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(s.trim()).map_err(|e| ConfigError::InvalidDuration {
        input: s.to_string(),
        reason: e.to_string(),
    })
}

/// Deserialize a duration from a string.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

/// Serialize a duration to a humantime string.
pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    humantime::format_duration(*duration)
        .to_string()
        .serialize(serializer)
}

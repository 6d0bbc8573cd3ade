//! Human-readable byte sizes for configuration values.
//!
//! Accepts either a plain integer (`512`) or a string with an optional unit
//! (`"1KB"`, `"1.5 MiB"`). Decimal units are powers of 1000 and binary units
//! powers of 1024, matching the usual `go-humanize` conventions:
//!
//! | unit            | multiplier |
//! |-----------------|------------|
//! | `B`, none       | 1          |
//! | `K`, `KB`       | 1000       |
//! | `Ki`, `KiB`     | 1024       |
//! | `M`, `MB`       | 1000²      |
//! | `Mi`, `MiB`     | 1024²      |
//! | ... up to `T`   |            |

use serde::{Deserialize, Deserializer, Serializer};

use crate::error::ConfigError;

/// Parse a byte size such as `"512"`, `"1KB"` or `"2.5 MiB"`.
pub fn parse_byte_size(input: &str) -> Result<u64, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidByteSize {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    if number.is_empty() {
        return Err(invalid("missing number"));
    }
    let number: f64 = number
        .replace(',', "")
        .parse()
        .map_err(|_| invalid("malformed number"))?;
    let multiplier = unit_multiplier(unit.trim()).ok_or_else(|| invalid("unknown unit"))?;

    let bytes = number * multiplier as f64;
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(invalid("value out of range"));
    }
    Ok(bytes as u64)
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    const KB: u64 = 1000;
    const KIB: u64 = 1024;
    let multiplier = match unit.to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => KB,
        "ki" | "kib" => KIB,
        "m" | "mb" => KB.pow(2),
        "mi" | "mib" => KIB.pow(2),
        "g" | "gb" => KB.pow(3),
        "gi" | "gib" => KIB.pow(3),
        "t" | "tb" => KB.pow(4),
        "ti" | "tib" => KIB.pow(4),
        _ => return None,
    };
    Some(multiplier)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawByteSize {
    Bytes(u64),
    Text(String),
}

/// Deserialize a byte size from an integer or a human-readable string.
pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawByteSize::deserialize(deserializer)? {
        RawByteSize::Bytes(n) => Ok(n),
        RawByteSize::Text(s) => parse_byte_size(&s).map_err(serde::de::Error::custom),
    }
}

/// Serialize a byte size as a plain integer.
pub fn serialize<S>(bytes: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(*bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_numbers() {
        assert_eq!(parse_byte_size("0").unwrap(), 0);
        assert_eq!(parse_byte_size("512").unwrap(), 512);
        assert_eq!(parse_byte_size(" 1,024 ").unwrap(), 1024);
    }

    #[test]
    fn test_decimal_and_binary_units() {
        assert_eq!(parse_byte_size("1KB").unwrap(), 1000);
        assert_eq!(parse_byte_size("1kib").unwrap(), 1024);
        assert_eq!(parse_byte_size("512 KiB").unwrap(), 512 * 1024);
        assert_eq!(parse_byte_size("1.5 MB").unwrap(), 1_500_000);
        assert_eq!(parse_byte_size("100MiB").unwrap(), 100 * 1024 * 1024);
        assert_eq!(parse_byte_size("2g").unwrap(), 2_000_000_000);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_byte_size("").is_err());
        assert!(parse_byte_size("KB").is_err());
        assert!(parse_byte_size("-1").is_err());
        assert!(parse_byte_size("12 parsecs").is_err());
        assert!(parse_byte_size("1.2.3").is_err());
    }
}

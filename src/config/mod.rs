//! Middleware configuration.
//!
//! [`ZlogConfig`] is consumed as an already-parsed value; any serde format works.
//! Every key is optional and falls back to the defaults below.
//!
//! ```rust
//! use zlog::ZlogConfig;
//!
//! let config: ZlogConfig = serde_json::from_str(r#"{
//!     "file_name": "/var/log/zlog/access.log",
//!     "truncate": "1KiB",
//!     "roll_size": "50MB",
//!     "roll_keep_for": "30d"
//! }"#).unwrap();
//! assert_eq!(config.truncate, 1024);
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::capture::{AsciiPolicy, CaptureLimits};
use crate::error::ConfigError;

pub mod byte_size;
pub mod duration_format;

/// Default maximum length of a rendered body, in bytes.
pub const DEFAULT_TRUNCATE: u64 = 512;
/// Default large-payload threshold, which is also the capture ceiling.
pub const DEFAULT_MAX_BODY_SIZE: u64 = 512 * 1024;
/// Default size at which the log file is rotated.
pub const DEFAULT_ROLL_SIZE: u64 = 100 * 1024 * 1024;
/// Default number of rotated files to keep.
pub const DEFAULT_ROLL_KEEP: usize = 10;
/// Default age after which rotated files are deleted.
pub const DEFAULT_ROLL_KEEP_FOR: Duration = Duration::from_secs(90 * 24 * 60 * 60);

/// Top-level configuration for the exchange logger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZlogConfig {
    /// Path of the log file. No file sink is opened when unset.
    pub file_name: Option<PathBuf>,
    /// Maximum length of each rendered body.
    #[serde(with = "byte_size")]
    pub truncate: u64,
    /// Large-payload threshold and capture ceiling for each body.
    #[serde(with = "byte_size")]
    pub max_body_size: u64,
    /// Drop captured bytes and render a placeholder once a body exceeds `max_body_size`.
    pub reject_large: bool,
    /// What to do with bodies containing non-ASCII bytes.
    pub ascii_policy: AsciiPolicy,
    /// Prefix each rendered body with its human-readable size.
    pub body_sizes: bool,
    /// Also write lines to stdout.
    pub console: bool,
    pub capture_request_body: bool,
    pub capture_response_body: bool,
    #[serde(flatten)]
    pub roll: RollConfig,
}

impl Default for ZlogConfig {
    fn default() -> Self {
        Self {
            file_name: None,
            truncate: DEFAULT_TRUNCATE,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            reject_large: true,
            ascii_policy: AsciiPolicy::default(),
            body_sizes: false,
            console: true,
            capture_request_body: true,
            capture_response_body: true,
            roll: RollConfig::default(),
        }
    }
}

impl ZlogConfig {
    /// Check values that parse fine but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.truncate == 0 {
            return Err(ConfigError::InvalidValue {
                field: "truncate",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_body_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_body_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.roll.validate()
    }

    /// Limits applied to every capture buffer.
    pub fn capture_limits(&self) -> CaptureLimits {
        CaptureLimits {
            capacity: usize::try_from(self.max_body_size).unwrap_or(usize::MAX),
            large_threshold: self.max_body_size,
            reject_large: self.reject_large,
            ascii_policy: self.ascii_policy,
        }
    }

    /// Maximum rendered body length as a `usize`.
    pub fn truncate_len(&self) -> usize {
        usize::try_from(self.truncate).unwrap_or(usize::MAX)
    }
}

/// Rotation settings for the file sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollConfig {
    /// Rotate once the active file would grow past this size.
    #[serde(with = "byte_size")]
    pub roll_size: u64,
    /// Number of rotated files to keep; zero keeps all of them.
    pub roll_keep: usize,
    /// Delete rotated files older than this; zero disables age-based deletion.
    #[serde(with = "duration_format")]
    pub roll_keep_for: Duration,
    /// Name rotated files using local time instead of UTC.
    pub roll_local_time: bool,
    /// Leave rotated files uncompressed.
    pub roll_uncompressed: bool,
    /// Never rotate.
    pub roll_disabled: bool,
}

impl Default for RollConfig {
    fn default() -> Self {
        Self {
            roll_size: DEFAULT_ROLL_SIZE,
            roll_keep: DEFAULT_ROLL_KEEP,
            roll_keep_for: DEFAULT_ROLL_KEEP_FOR,
            roll_local_time: false,
            roll_uncompressed: false,
            roll_disabled: false,
        }
    }
}

impl RollConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.roll_disabled && self.roll_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "roll_size",
                reason: "must be greater than zero unless roll_disabled is set".to_string(),
            });
        }
        Ok(())
    }
}

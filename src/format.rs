//! Log line layout.
//!
//! A line has space-separated fields:
//!
//! ```text
//! <timestamp> <elapsed> <status> <method> <path> <req-content-type> [<req-size>] <req-body> <resp-content-type> [<resp-size>] <resp-body>
//! ```
//!
//! Sizes appear only when [`LineFormat::body_sizes`] is set. Empty fields print as `-`.

use std::fmt::Write;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use crate::capture::CapturedBody;
use crate::config::ZlogConfig;
use crate::render::{render_body, BodyKind};
use crate::types::Exchange;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const EMPTY_FIELD: &str = "-";
const UNRENDERABLE: &str = "[Unrenderable]";

/// How exchanges are turned into lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineFormat {
    /// Maximum length of each rendered body.
    pub truncate: usize,
    /// Put the human-readable body size in front of each body.
    pub body_sizes: bool,
}

impl Default for LineFormat {
    fn default() -> Self {
        Self::from(&ZlogConfig::default())
    }
}

impl From<&ZlogConfig> for LineFormat {
    fn from(config: &ZlogConfig) -> Self {
        Self {
            truncate: config.truncate_len(),
            body_sizes: config.body_sizes,
        }
    }
}

impl LineFormat {
    /// Format `exchange` as one newline-terminated line.
    pub fn format(&self, exchange: &Exchange) -> String {
        let mut line = String::with_capacity(128 + 2 * self.truncate);

        let _ = write!(
            line,
            "{} {} {} {} {} {}",
            exchange.finished_at.format(TIMESTAMP_FORMAT),
            format_duration(exchange.elapsed),
            exchange.status().as_u16(),
            exchange.method,
            field(&exchange.path),
            field(exchange.request_content_type.as_deref().unwrap_or_default()),
        );
        self.push_body(&mut line, &exchange.request_body, BodyKind::Request);

        let _ = write!(
            line,
            " {}",
            field(exchange.response_content_type.as_deref().unwrap_or_default())
        );
        self.push_body(&mut line, &exchange.response_body, BodyKind::Response);

        line.push('\n');
        line
    }

    fn push_body(&self, line: &mut String, body: &CapturedBody, kind: BodyKind) {
        if self.body_sizes {
            let _ = write!(line, " {}", format_bytes(body.observed));
        }
        let rendered = panic::catch_unwind(AssertUnwindSafe(|| {
            render_body(body, kind, self.truncate)
        }))
        .unwrap_or_else(|_| UNRENDERABLE.to_string());
        let _ = write!(line, " {}", field(&rendered));
    }
}

fn field(value: &str) -> &str {
    if value.is_empty() {
        EMPTY_FIELD
    } else {
        value
    }
}

/// Short unit-suffixed duration: `850ns`, `12.4µs`, `12.4ms`, `3.2s`, `2m5.0s`.
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos < 1_000 {
        format!("{nanos}ns")
    } else if nanos < 1_000_000 {
        format!("{:.1}µs", nanos as f64 / 1e3)
    } else if nanos < 1_000_000_000 {
        format!("{:.1}ms", nanos as f64 / 1e6)
    } else if duration.as_secs() < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        let minutes = duration.as_secs() / 60;
        let seconds = duration.as_secs_f64() - (minutes * 60) as f64;
        format!("{minutes}m{seconds:.1}s")
    }
}

/// SI byte count: `512 B`, `1.2 KB`, `2.1 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];
    if bytes < 1000 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1000.0;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

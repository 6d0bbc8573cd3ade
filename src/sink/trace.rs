//! Sink that forwards lines to `tracing`.

use tracing::info;

use super::LogSink;
use crate::error::SinkError;

/// Emits every line as an info event with target `zlog`.
///
/// Handy when the host already ships its `tracing` output somewhere, or in tests
/// where a subscriber captures events.
///
/// # Examples
///
/// ```rust
/// use zlog::{ExchangeLogger, LineFormat, MultiSink, TracingSink};
///
/// let logger = ExchangeLogger::new(MultiSink::new().with(TracingSink), LineFormat::default());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn write_line(&self, line: &str) -> Result<(), SinkError> {
        info!(target: "zlog", "{}", line.trim_end_matches('\n'));
        Ok(())
    }
}

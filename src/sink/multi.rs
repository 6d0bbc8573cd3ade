//! Fan-out over several sinks.
//!
//! [`MultiSink`] hands each line to every inner sink in order. A failing sink is
//! reported through `tracing` and skipped; it never prevents the others from receiving
//! the line.
//!
//! # Example
//!
//! ```rust
//! use zlog::{ConsoleSink, MultiSink, TracingSink};
//!
//! let sinks = MultiSink::new()
//!     .with(ConsoleSink)
//!     .with(TracingSink);
//! assert_eq!(sinks.len(), 2);
//! ```

use std::sync::Arc;
use tracing::warn;

use super::LogSink;
use crate::error::SinkError;

/// A sink that delegates to multiple inner sinks.
#[derive(Clone, Default)]
pub struct MultiSink {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a sink. Returns self for builder pattern.
    pub fn with<S: LogSink>(mut self, sink: S) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Write `line` to every sink; returns how many accepted it.
    pub fn dispatch(&self, line: &str) -> usize {
        self.sinks
            .iter()
            .filter(|sink| match sink.write_line(line) {
                Ok(()) => true,
                Err(e) => {
                    warn!(sink = sink.name(), error = %e, "Failed to write exchange line");
                    false
                }
            })
            .count()
    }
}

impl std::fmt::Debug for MultiSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.sinks.iter().map(|sink| sink.name()))
            .finish()
    }
}

impl LogSink for MultiSink {
    fn name(&self) -> &str {
        "multi"
    }

    fn write_line(&self, line: &str) -> Result<(), SinkError> {
        self.dispatch(line);
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        for sink in &self.sinks {
            if let Err(e) = sink.flush() {
                warn!(sink = sink.name(), error = %e, "Failed to flush sink");
            }
        }
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        for sink in &self.sinks {
            if let Err(e) = sink.close() {
                warn!(sink = sink.name(), error = %e, "Failed to close sink");
            }
        }
        Ok(())
    }
}

//! Destinations for formatted exchange lines.
//!
//! Every sink receives complete, newline-terminated lines and must write each one with
//! a single call to its underlying writer, so lines never interleave.

use std::io::Write;
use std::sync::Arc;

use crate::error::SinkError;

mod file;
mod multi;
mod trace;

pub use file::FileSink;
pub use multi::MultiSink;
pub use trace::TracingSink;

/// A destination for log lines.
pub trait LogSink: Send + Sync + 'static {
    /// Short name used when reporting failures.
    fn name(&self) -> &str;

    /// Write one complete line, including its trailing newline.
    fn write_line(&self, line: &str) -> Result<(), SinkError>;

    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Release the sink. Writes after closing may fail with [`SinkError::Closed`].
    fn close(&self) -> Result<(), SinkError> {
        self.flush()
    }
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn write_line(&self, line: &str) -> Result<(), SinkError> {
        (**self).write_line(line)
    }

    fn flush(&self) -> Result<(), SinkError> {
        (**self).flush()
    }

    fn close(&self) -> Result<(), SinkError> {
        (**self).close()
    }
}

/// Writes lines to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn write_line(&self, line: &str) -> Result<(), SinkError> {
        std::io::stdout().lock().write_all(line.as_bytes())?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        std::io::stdout().lock().flush()?;
        Ok(())
    }
}

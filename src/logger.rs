//! The exchange logger: formats finished exchanges and hands lines to sinks.

use tracing::{info, warn};

use crate::config::ZlogConfig;
use crate::format::LineFormat;
use crate::sink::{ConsoleSink, FileSink, LogSink, MultiSink};
use crate::types::Exchange;

/// Formats each [`Exchange`] as one line and writes it to every configured sink.
///
/// # Examples
///
/// ```rust
/// use zlog::{ExchangeLogger, LineFormat, MultiSink, TracingSink};
/// use zlog::types::Exchange;
/// use axum::http::Method;
///
/// let logger = ExchangeLogger::new(MultiSink::new().with(TracingSink), LineFormat::default());
/// let line = logger.log(&Exchange::new(Method::GET, "/health"));
/// assert!(line.contains(" 200 GET /health "));
/// ```
#[derive(Debug)]
pub struct ExchangeLogger {
    sinks: MultiSink,
    format: LineFormat,
}

impl ExchangeLogger {
    pub fn new(sinks: MultiSink, format: LineFormat) -> Self {
        Self { sinks, format }
    }

    /// Build the logger described by `config`.
    ///
    /// A file that cannot be opened is reported and skipped; the logger keeps
    /// writing to the remaining sinks.
    pub fn provision(config: &ZlogConfig) -> Self {
        info!(config = ?config, "Provisioning exchange logger");

        let mut sinks = MultiSink::new();
        if let Some(path) = &config.file_name {
            match FileSink::open(path, config.roll.clone()) {
                Ok(file) => sinks = sinks.with(file),
                Err(e) => {
                    warn!(error = %e, "Log file unavailable; exchanges will not be written to file")
                }
            }
        }
        if config.console {
            sinks = sinks.with(ConsoleSink);
        }

        Self::new(sinks, LineFormat::from(config))
    }

    pub fn format(&self) -> &LineFormat {
        &self.format
    }

    pub fn sinks(&self) -> &MultiSink {
        &self.sinks
    }

    /// Format `exchange`, write it to every sink and return the line.
    pub fn log(&self, exchange: &Exchange) -> String {
        let line = self.format.format(exchange);
        self.sinks.dispatch(&line);
        line
    }

    /// Flush and close every sink.
    pub fn cleanup(&self) {
        // MultiSink reports individual failures itself.
        let _ = self.sinks.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RollConfig;
    use axum::http::Method;

    #[test]
    fn test_provision_without_sinks() {
        let config = ZlogConfig {
            console: false,
            ..Default::default()
        };
        let logger = ExchangeLogger::provision(&config);
        assert!(logger.sinks().is_empty());
        assert_eq!(logger.format().truncate, 512);
    }

    #[test]
    fn test_provision_writes_to_file_until_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zlog.log");
        let config = ZlogConfig {
            file_name: Some(path.clone()),
            console: false,
            ..Default::default()
        };

        let logger = ExchangeLogger::provision(&config);
        assert_eq!(logger.sinks().len(), 1);

        let line = logger.log(&Exchange::new(Method::GET, "/health"));
        logger.cleanup();
        logger.log(&Exchange::new(Method::GET, "/after-cleanup"));

        assert_eq!(std::fs::read_to_string(&path).unwrap(), line);
    }

    #[test]
    fn test_unopenable_file_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let config = ZlogConfig {
            file_name: Some(blocker.join("zlog.log")),
            console: true,
            roll: RollConfig::default(),
            ..Default::default()
        };
        let logger = ExchangeLogger::provision(&config);

        // Only the console sink remains.
        assert_eq!(logger.sinks().len(), 1);
        let line = logger.log(&Exchange::new(Method::DELETE, "/x"));
        assert!(line.ends_with('\n'));
    }
}

//! # zlog
//!
//! An Axum middleware that writes one text line per request/response exchange: timestamp,
//! elapsed time, status, method, path, content types and the (bounded, JSON-normalized)
//! request and response bodies.
//!
//! ## Features
//!
//! - **Transparent**: bodies are observed frame by frame as they stream; the bytes the
//!   client and the handler see are never changed
//! - **Bounded**: each body keeps at most a configured number of bytes, and bodies above
//!   the large-payload threshold are logged as `[Large Request]` / `[Large Response]`
//! - **Readable**: JSON bodies are re-serialized compactly with their key order kept;
//!   other text has its newlines escaped
//! - **Best-effort**: formatting and sink I/O run on a background task, and a failing sink
//!   never affects the exchange or the other sinks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{routing::post, Router};
//! use zlog::{ExchangeLoggerLayer, ZlogConfig};
//!
//! async fn echo(body: String) -> String {
//!     body
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ZlogConfig {
//!         file_name: Some("logs/access.log".into()),
//!         ..Default::default()
//!     };
//!     let layer = ExchangeLoggerLayer::from_config(&config);
//!     let logger = layer.logger().clone();
//!
//!     let app = Router::new().route("/echo", post(echo)).layer(layer);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//!
//!     logger.cleanup();
//! }
//! ```
//!
//! A request such as `POST /echo` with body `{"a": 1,  "b": 2}` produces:
//!
//! ```text
//! 2024-03-09 14:05:07 1.3ms 200 POST /echo application/json {"a":1,"b":2} text/plain;charset=utf-8 {"a":1,"b":2}
//! ```
//!
//! ## Custom Sinks
//!
//! Implement [`LogSink`] to send lines somewhere else:
//!
//! ```rust
//! use zlog::{LogSink, error::SinkError};
//!
//! struct StderrSink;
//!
//! impl LogSink for StderrSink {
//!     fn name(&self) -> &str {
//!         "stderr"
//!     }
//!
//!     fn write_line(&self, line: &str) -> Result<(), SinkError> {
//!         eprint!("{line}");
//!         Ok(())
//!     }
//! }
//! ```

use axum::{
    body::Body,
    extract::Request,
    http::HeaderMap,
    response::Response,
};
use futures::future::BoxFuture;
use http_body::Body as _;
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tower::{Layer, Service};
use tracing::{debug, error, instrument, warn};

pub mod body_wrapper;
pub mod capture;
pub mod config;
pub mod error;
mod exchange;
pub mod format;
pub mod logger;
pub mod render;
pub mod sink;
pub mod types;

use body_wrapper::CapturingBody;
use capture::{CaptureBuffer, CaptureLimits};
use error::ConfigError;
use exchange::{content_length, PendingExchange};
use types::Exchange;

pub use config::{RollConfig, ZlogConfig};
pub use format::LineFormat;
pub use logger::ExchangeLogger;
pub use sink::{ConsoleSink, FileSink, LogSink, MultiSink, TracingSink};

/// What the middleware captures for each exchange.
///
/// # Examples
///
/// ```rust
/// use zlog::CaptureConfig;
///
/// // Capture both bodies with the default limits
/// let config = CaptureConfig::default();
///
/// // Only log metadata
/// let config = CaptureConfig {
///     capture_request_body: false,
///     capture_response_body: false,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Whether to capture request bodies
    pub capture_request_body: bool,
    /// Whether to capture response bodies
    pub capture_response_body: bool,
    /// Size and content limits applied to each captured body
    pub limits: CaptureLimits,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::from(&ZlogConfig::default())
    }
}

impl From<&ZlogConfig> for CaptureConfig {
    fn from(config: &ZlogConfig) -> Self {
        Self {
            capture_request_body: config.capture_request_body,
            capture_response_body: config.capture_response_body,
            limits: config.capture_limits(),
        }
    }
}

/// Tower layer for the exchange logging middleware.
///
/// Creating the layer starts a dedicated writer thread that formats finished exchanges
/// and writes them through the [`ExchangeLogger`]. Sink I/O such as file writes,
/// rotation and compression never runs on the async runtime. One thread serves every
/// exchange, so lines never interleave.
///
/// # Examples
///
/// ```rust,no_run
/// use zlog::{CaptureConfig, ConsoleSink, ExchangeLogger, ExchangeLoggerLayer, LineFormat, MultiSink};
/// use axum::{routing::get, Router};
///
/// # async fn hello() -> &'static str { "Hello" }
/// # #[tokio::main]
/// # async fn main() {
/// let logger = ExchangeLogger::new(MultiSink::new().with(ConsoleSink), LineFormat::default());
/// let layer = ExchangeLoggerLayer::new(CaptureConfig::default(), logger);
///
/// let app: Router = Router::new()
///     .route("/hello", get(hello))
///     .layer(layer);
/// # }
/// ```
#[derive(Clone)]
pub struct ExchangeLoggerLayer {
    config: CaptureConfig,
    logger: Arc<ExchangeLogger>,
    tx: mpsc::UnboundedSender<Exchange>,
}

impl ExchangeLoggerLayer {
    /// Create a layer that captures according to `config` and logs through `logger`.
    pub fn new(config: CaptureConfig, logger: ExchangeLogger) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Exchange>();
        let logger = Arc::new(logger);
        let logger_clone = logger.clone();

        let spawned = std::thread::Builder::new()
            .name("zlog-writer".to_string())
            .spawn(move || {
                while let Some(exchange) = rx.blocking_recv() {
                    logger_clone.log(&exchange);
                }
                debug!("Exchange channel closed; writer thread exiting");
            });
        if let Err(e) = spawned {
            error!(error = %e, "Failed to start exchange writer thread; exchanges will not be logged");
        }

        Self { config, logger, tx }
    }

    /// Provision the logger and capture settings from one configuration value.
    ///
    /// An invalid configuration is reported with a warning and used as given; call
    /// [`ExchangeLoggerLayer::try_from_config`] to refuse it instead.
    pub fn from_config(config: &ZlogConfig) -> Self {
        if let Err(e) = config.validate() {
            warn!(error = %e, "Invalid zlog configuration");
        }
        Self::new(CaptureConfig::from(config), ExchangeLogger::provision(config))
    }

    /// Like [`ExchangeLoggerLayer::from_config`], but fails on an invalid configuration.
    pub fn try_from_config(config: &ZlogConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(
            CaptureConfig::from(config),
            ExchangeLogger::provision(config),
        ))
    }

    /// The logger behind this layer; call [`ExchangeLogger::cleanup`] on shutdown.
    pub fn logger(&self) -> &Arc<ExchangeLogger> {
        &self.logger
    }
}

impl<S> Layer<S> for ExchangeLoggerLayer {
    type Service = ExchangeLoggerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ExchangeLoggerService {
            inner,
            config: self.config.clone(),
            tx: self.tx.clone(),
        }
    }
}

/// Tower service implementation for the exchange logging middleware.
///
/// Wraps the request body before calling the inner service and the response body after
/// it returns. The exchange is emitted once, when the response body finishes or is
/// dropped, or when this service's future is dropped before the inner service returns.
///
/// Users typically don't interact with this type directly - it's created by
/// [`ExchangeLoggerLayer`].
#[derive(Clone)]
pub struct ExchangeLoggerService<S> {
    inner: S,
    config: CaptureConfig,
    tx: mpsc::UnboundedSender<Exchange>,
}

impl<S> Service<Request> for ExchangeLoggerService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    #[instrument(skip_all)]
    fn call(&mut self, mut request: Request) -> Self::Future {
        debug!(method = %request.method(), uri = %request.uri(), "Starting exchange capture");

        let limits = self.config.limits;
        let mut pending = PendingExchange::new(&request, self.tx.clone());

        if self.config.capture_request_body {
            let capture = CaptureBuffer::shared(limits);
            if let Some(len) = declared_len(request.body(), request.headers()) {
                capture.lock().declare_len(len);
            }
            let body = std::mem::replace(request.body_mut(), Body::empty());
            *request.body_mut() = Body::new(CapturingBody::new(body, capture.clone()));
            pending.capture_request(capture);
        }

        let capture_response = self.config.capture_response_body;
        let future = self.inner.call(request);

        Box::pin(async move {
            let result = future.await;
            pending.handler_returned();

            let mut response = match result {
                Ok(response) => response,
                Err(e) => {
                    debug!("Inner service failed; logging what was captured");
                    pending.record_failure();
                    return Err(e);
                }
            };
            pending.record_response(&response);

            if !capture_response {
                return Ok(response);
            }

            let capture = CaptureBuffer::shared(limits.for_response());
            if let Some(len) = declared_len(response.body(), response.headers()) {
                capture.lock().declare_len(len);
            }
            pending.capture_response(capture.clone());

            let body = std::mem::replace(response.body_mut(), Body::empty());
            *response.body_mut() =
                Body::new(CapturingBody::new(body, capture).finishing(pending));
            Ok(response)
        })
    }
}

/// Length announced ahead of the body, from its size hint or `Content-Length`.
fn declared_len(body: &Body, headers: &HeaderMap) -> Option<u64> {
    body.size_hint()
        .exact()
        .or_else(|| content_length(headers))
}

//! Data types for a finished exchange.
//!
//! An [`Exchange`] is assembled once, after the downstream service has returned and the
//! response body has finished (or was dropped). It is what the
//! [`ExchangeLogger`](crate::ExchangeLogger) formats.

use axum::http::{Method, StatusCode};
use chrono::{DateTime, Local};
use std::time::Duration;

use crate::capture::CapturedBody;

/// One request/response cycle as observed by the middleware.
///
/// # Examples
///
/// ```rust
/// use zlog::types::Exchange;
/// use axum::http::{Method, StatusCode};
///
/// let exchange = Exchange::new(Method::GET, "/health");
/// assert_eq!(exchange.status(), StatusCode::OK);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    /// When the middleware intercepted the request
    pub started_at: DateTime<Local>,
    /// When the exchange was finalized; this is the timestamp that gets logged
    pub finished_at: DateTime<Local>,
    /// Time from interception until the downstream service returned
    pub elapsed: Duration,
    pub method: Method,
    /// Request path without the query string
    pub path: String,
    pub request_content_type: Option<String>,
    pub response_content_type: Option<String>,
    /// Status of the response, if the downstream service produced one
    pub status: Option<StatusCode>,
    pub request_body: CapturedBody,
    pub response_body: CapturedBody,
}

impl Exchange {
    /// An exchange with no bodies, no status and zero elapsed time, stamped now.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let now = Local::now();
        Self {
            started_at: now,
            finished_at: now,
            elapsed: Duration::ZERO,
            method,
            path: path.into(),
            request_content_type: None,
            response_content_type: None,
            status: None,
            request_body: CapturedBody::default(),
            response_body: CapturedBody::default(),
        }
    }

    /// The logged status: the recorded one, or 200 when none was ever set.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }
}

//! In-flight exchange state.
//!
//! [`PendingExchange`] collects metadata while a request is being served and emits the
//! finished [`Exchange`] from its `Drop` impl. Dropping is the single emission point, so
//! an exchange is logged exactly once whether the response body completes, is dropped
//! early, or the middleware future itself is cancelled.

use axum::http::{header, HeaderMap, Method, StatusCode};
use chrono::{DateTime, Local};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::capture::{CapturedBody, SharedCapture};
use crate::types::Exchange;

pub(crate) struct PendingExchange {
    started: Instant,
    started_at: DateTime<Local>,
    elapsed: Option<Duration>,
    method: Method,
    path: String,
    request_content_type: Option<String>,
    response_content_type: Option<String>,
    status: Option<StatusCode>,
    request_body: Option<SharedCapture>,
    response_body: Option<SharedCapture>,
    tx: mpsc::UnboundedSender<Exchange>,
}

impl PendingExchange {
    pub(crate) fn new<B>(
        request: &axum::http::Request<B>,
        tx: mpsc::UnboundedSender<Exchange>,
    ) -> Self {
        Self {
            started: Instant::now(),
            started_at: Local::now(),
            elapsed: None,
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            request_content_type: content_type(request.headers()),
            response_content_type: None,
            status: None,
            request_body: None,
            response_body: None,
            tx,
        }
    }

    pub(crate) fn capture_request(&mut self, capture: SharedCapture) {
        self.request_body = Some(capture);
    }

    pub(crate) fn capture_response(&mut self, capture: SharedCapture) {
        self.response_body = Some(capture);
    }

    /// Freeze the elapsed time. Later calls keep the first measurement.
    pub(crate) fn handler_returned(&mut self) {
        let started = self.started;
        self.elapsed.get_or_insert_with(|| started.elapsed());
    }

    pub(crate) fn record_response<B>(&mut self, response: &axum::http::Response<B>) {
        self.status = Some(response.status());
        self.response_content_type = content_type(response.headers());
    }

    /// The downstream service failed without producing a response.
    pub(crate) fn record_failure(&mut self) {
        self.status = Some(StatusCode::INTERNAL_SERVER_ERROR);
    }

    fn finish(&mut self) -> Exchange {
        let snapshot = |capture: &Option<SharedCapture>| {
            capture
                .as_ref()
                .map(|c| c.lock().snapshot())
                .unwrap_or_default()
        };
        let request_body: CapturedBody = snapshot(&self.request_body);
        let response_body: CapturedBody = snapshot(&self.response_body);

        Exchange {
            started_at: self.started_at,
            finished_at: Local::now(),
            elapsed: self.elapsed.unwrap_or_else(|| self.started.elapsed()),
            method: self.method.clone(),
            path: std::mem::take(&mut self.path),
            request_content_type: self.request_content_type.take(),
            response_content_type: self.response_content_type.take(),
            status: self.status,
            request_body,
            response_body,
        }
    }
}

impl Drop for PendingExchange {
    fn drop(&mut self) {
        if self.elapsed.is_none() {
            debug!(method = %self.method, path = %self.path, "exchange ended before the handler returned");
        }
        let exchange = self.finish();
        if self.tx.send(exchange).is_err() {
            error!("exchange logger task is gone; dropping log line");
        }
    }
}

/// Parse the `Content-Length` header, if present and valid.
pub(crate) fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

//! Bounded capture buffers.
//!
//! A [`CaptureBuffer`] keeps the leading bytes of one body for logging. It tracks two
//! different quantities: the exact number of bytes *observed* flowing through the
//! transport, and the bytes *retained*, which never exceed the configured capacity.

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a request buffer treats bytes outside the 7-bit ASCII range.
///
/// Response buffers always retain; see [`CaptureLimits::for_response`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AsciiPolicy {
    /// The first chunk containing a non-ASCII byte discards everything retained so far
    /// and stops retention for the rest of the exchange.
    #[default]
    Reject,
    /// Keep bytes regardless of content; rendering decodes them lossily.
    Retain,
}

/// Limits shared by the request and response buffers of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureLimits {
    /// Maximum number of retained bytes.
    pub capacity: usize,
    /// Observed or declared size above which a body counts as large.
    pub large_threshold: u64,
    /// Release retained bytes once a body is large, instead of keeping a truncated prefix.
    pub reject_large: bool,
    pub ascii_policy: AsciiPolicy,
}

impl CaptureLimits {
    /// The limits used for a response body. Responses are kept whatever bytes they
    /// carry, so non-ASCII text such as UTF-8 JSON still renders.
    pub fn for_response(self) -> Self {
        Self {
            ascii_policy: AsciiPolicy::Retain,
            ..self
        }
    }
}

/// A buffer shared between a body wrapper and the exchange it belongs to.
pub type SharedCapture = Arc<Mutex<CaptureBuffer>>;

/// Append-only, size-capped byte accumulator.
#[derive(Debug)]
pub struct CaptureBuffer {
    limits: CaptureLimits,
    retained: BytesMut,
    observed: u64,
    declared: Option<u64>,
    binary: bool,
}

impl CaptureBuffer {
    pub fn new(limits: CaptureLimits) -> Self {
        Self {
            limits,
            retained: BytesMut::new(),
            observed: 0,
            declared: None,
            binary: false,
        }
    }

    pub fn shared(limits: CaptureLimits) -> SharedCapture {
        Arc::new(Mutex::new(Self::new(limits)))
    }

    /// Record a length announced ahead of the body, such as `Content-Length`.
    pub fn declare_len(&mut self, len: u64) {
        self.declared = Some(len);
        self.release_if_large();
    }

    /// Count `chunk` and retain as much of it as the policy allows.
    pub fn record(&mut self, chunk: &[u8]) {
        self.observed = self.observed.saturating_add(chunk.len() as u64);

        if self.release_if_large() || self.binary {
            return;
        }
        if self.limits.ascii_policy == AsciiPolicy::Reject && !chunk.is_ascii() {
            self.binary = true;
            self.retained = BytesMut::new();
            return;
        }

        let room = self.limits.capacity.saturating_sub(self.retained.len());
        let take = room.min(chunk.len());
        if take > 0 {
            self.retained.extend_from_slice(&chunk[..take]);
        }
    }

    /// Whether the body counts as large under the current limits.
    pub fn is_large(&self) -> bool {
        self.limits.reject_large
            && (self.observed > self.limits.large_threshold
                || self
                    .declared
                    .is_some_and(|len| len > self.limits.large_threshold))
    }

    pub fn observed(&self) -> u64 {
        self.observed
    }

    pub fn retained(&self) -> &[u8] {
        &self.retained
    }

    /// Copy out the state needed to render this body.
    pub fn snapshot(&self) -> CapturedBody {
        CapturedBody {
            bytes: Bytes::copy_from_slice(&self.retained),
            observed: self.observed,
            large: self.is_large(),
            binary: self.binary,
        }
    }

    fn release_if_large(&mut self) -> bool {
        let large = self.is_large();
        if large && !self.retained.is_empty() {
            self.retained = BytesMut::new();
        }
        large
    }
}

/// Immutable view of a [`CaptureBuffer`] taken when the exchange is finalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedBody {
    /// Retained leading bytes.
    pub bytes: Bytes,
    /// Exact number of bytes that went through the transport.
    pub observed: u64,
    /// The body exceeded the large-payload threshold.
    pub large: bool,
    /// The body contained non-ASCII bytes and was rejected.
    pub binary: bool,
}

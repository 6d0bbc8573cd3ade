//! Body capture decorator.
//!
//! [`CapturingBody`] wraps an HTTP body and mirrors every data frame into a
//! [`CaptureBuffer`](crate::capture::CaptureBuffer) while handing the frame on unchanged.
//! The same type serves both directions: the server's handler pulls request frames
//! through it, and the server's connection pulls response frames through it.

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;

use crate::capture::SharedCapture;
use crate::exchange::PendingExchange;

/// A body that records the bytes flowing through it.
///
/// Frames, errors, end-of-stream and size hints of the inner body are forwarded as-is;
/// capture never changes what the consumer sees. Dropping a `CapturingBody` drops the
/// inner body, releasing whatever it holds.
///
/// # Examples
///
/// ```rust
/// use zlog::body_wrapper::CapturingBody;
/// use zlog::capture::{AsciiPolicy, CaptureBuffer, CaptureLimits};
/// use axum::body::Body;
/// use http_body_util::BodyExt;
///
/// # #[tokio::main]
/// # async fn main() {
/// let capture = CaptureBuffer::shared(CaptureLimits {
///     capacity: 5,
///     large_threshold: 1024,
///     reject_large: true,
///     ascii_policy: AsciiPolicy::Reject,
/// });
/// let body = CapturingBody::new(Body::from("Hello, World!"), capture.clone());
///
/// let delivered = body.collect().await.unwrap().to_bytes();
/// assert_eq!(delivered, "Hello, World!");
/// assert_eq!(capture.lock().retained(), b"Hello");
/// assert_eq!(capture.lock().observed(), 13);
/// # }
/// ```
pub struct CapturingBody<B> {
    inner: B,
    capture: SharedCapture,
    pending: Option<PendingExchange>,
}

impl<B> CapturingBody<B> {
    pub fn new(inner: B, capture: SharedCapture) -> Self {
        Self {
            inner,
            capture,
            pending: None,
        }
    }

    /// Emit `pending` when this body reaches its end or is dropped.
    pub(crate) fn finishing(mut self, pending: PendingExchange) -> Self {
        self.pending = Some(pending);
        self
    }

    fn finish(&mut self) {
        // Dropping the pending exchange emits it.
        self.pending.take();
    }
}

impl<B> Body for CapturingBody<B>
where
    B: Body<Data = Bytes> + Unpin,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.capture.lock().record(data);
                }
            }
            Poll::Ready(Some(Err(_))) => {
                debug!("body stream failed; keeping what was captured so far");
            }
            Poll::Ready(None) => this.finish(),
            Poll::Pending => {}
        }

        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

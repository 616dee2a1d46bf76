//! Transparent read/write taps.
//!
//! [`TapReader`] and [`TapWriter`] forward every call to the wrapped stream
//! unchanged. When a sink is attached they also copy the bytes that actually
//! crossed the stream into it: after a read completes, or after a write was
//! accepted. Bytes that fail or stay pending are never mirrored.
//!
//! The sink lives in a [`SinkSlot`] that can be shared with the owner of the
//! tap. Replacing the sink through the slot takes effect on the next chunk,
//! even while a read or write is parked on the stream.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use super::debug::{SharedSink, with_sink};

/// Shared, replaceable sink of a tap.
#[derive(Clone, Default)]
pub struct SinkSlot(Arc<Mutex<Option<SharedSink>>>);

impl SinkSlot {
    /// Creates a slot holding `sink`.
    #[must_use]
    pub fn new(sink: Option<SharedSink>) -> Self {
        Self(Arc::new(Mutex::new(sink)))
    }

    /// Replaces the sink for every tap reading from this slot.
    pub fn set(&self, sink: Option<SharedSink>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = sink;
    }

    /// Returns the current sink.
    #[must_use]
    pub fn get(&self) -> Option<SharedSink> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl std::fmt::Debug for SinkSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SinkSlot")
            .field(&self.get().is_some())
            .finish()
    }
}

fn mirror(slot: &SinkSlot, data: &[u8]) {
    if data.is_empty() {
        return;
    }
    let Some(sink) = slot.get() else {
        return;
    };
    if let Err(error) = with_sink(&sink, |sink| sink.record(data)) {
        tracing::warn!(%error, "diagnostic sink failed");
    }
}

/// Reader that mirrors received bytes into a sink.
pub struct TapReader<R> {
    inner: R,
    sink: SinkSlot,
}

impl<R> TapReader<R> {
    /// Wraps a reader with a sink of its own.
    pub fn new(inner: R, sink: Option<SharedSink>) -> Self {
        Self::with_slot(inner, SinkSlot::new(sink))
    }

    /// Wraps a reader that mirrors into whatever `slot` holds.
    pub const fn with_slot(inner: R, slot: SinkSlot) -> Self {
        Self { inner, sink: slot }
    }

    /// Replaces the sink.
    pub fn set_sink(&self, sink: Option<SharedSink>) {
        self.sink.set(sink);
    }

    /// Returns the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for TapReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = poll {
            mirror(&this.sink, &buf.filled()[before..]);
        }
        poll
    }
}

/// Writer that mirrors sent bytes into a sink.
pub struct TapWriter<W> {
    inner: W,
    sink: SinkSlot,
}

impl<W> TapWriter<W> {
    /// Wraps a writer with a sink of its own.
    pub fn new(inner: W, sink: Option<SharedSink>) -> Self {
        Self::with_slot(inner, SinkSlot::new(sink))
    }

    /// Wraps a writer that mirrors into whatever `slot` holds.
    pub const fn with_slot(inner: W, slot: SinkSlot) -> Self {
        Self { inner, sink: slot }
    }

    /// Replaces the sink.
    pub fn set_sink(&self, sink: Option<SharedSink>) {
        self.sink.set(sink);
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for TapWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = poll {
            mirror(&this.sink, &buf[..n]);
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

//! Framed I/O for IMAP protocol.
//!
//! IMAP uses CRLF-terminated lines with support for literals. The reader and
//! writer here own their buffers as [`BytesMut`] so that a connection can take
//! them apart and put them back around a different stream without losing or
//! reallocating anything.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::flush::{FlushChain, FlushStage};
use crate::{Error, Result};

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Maximum literal size to prevent memory exhaustion.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024; // 100 MB

/// Buffered reader producing complete responses (line plus literals).
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    chunk: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Creates a reader with a fresh buffer of `capacity` bytes.
    pub fn new(inner: R, capacity: usize) -> Self {
        Self::from_parts(inner, BytesMut::with_capacity(capacity), capacity)
    }

    /// Creates a reader around an existing buffer, reading `capacity` bytes
    /// at a time. Bytes already in `buf` are returned before anything from
    /// `inner`.
    pub fn from_parts(inner: R, buf: BytesMut, capacity: usize) -> Self {
        Self {
            inner,
            buf,
            chunk: capacity.max(1),
        }
    }

    /// Reads a complete IMAP response, handling literals.
    ///
    /// Responses can contain literals in the format `{n}\r\n<n bytes>`; the
    /// returned bytes include every line and literal up to the final CRLF.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();

        loop {
            let line = self.read_line().await?;
            response.extend_from_slice(&line);

            let Some(literal_len) = parse_literal_length(&line) else {
                break;
            };
            if literal_len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {literal_len} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }
            while self.buf.len() < literal_len {
                self.fill(literal_len - self.buf.len()).await?;
            }
            response.extend_from_slice(&self.buf.split_to(literal_len));
        }

        Ok(response)
    }

    /// Returns `true` if bytes were received but not yet returned.
    pub fn has_buffered(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Gets a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Takes the reader apart, keeping any unread bytes in the buffer.
    pub fn into_parts(self) -> (R, BytesMut) {
        (self.inner, self.buf)
    }

    async fn read_line(&mut self) -> Result<BytesMut> {
        let mut scanned = 0;

        loop {
            if let Some(pos) = find_crlf(&self.buf[scanned..]) {
                return Ok(self.buf.split_to(scanned + pos + 2));
            }
            // A CR at the end may pair with an LF from the next read.
            scanned = self.buf.len().saturating_sub(1);

            if self.buf.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
            self.fill(self.chunk).await?;
        }
    }

    async fn fill(&mut self, want: usize) -> Result<()> {
        self.buf.reserve(want.max(1));
        let n = self.inner.read_buf(&mut self.buf).await?;
        if n == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            )));
        }
        Ok(())
    }
}

/// Buffered writer with an explicit, staged flush.
///
/// Writes accumulate in memory and only reach the stream on [`flush`], or
/// when the buffer would grow past its capacity. Spilling never flushes the
/// stream itself.
///
/// [`flush`]: FrameWriter::flush
pub struct FrameWriter<W> {
    inner: W,
    buf: BytesMut,
    capacity: usize,
    chain: FlushChain,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Creates a writer with a fresh buffer of `capacity` bytes.
    pub fn new(inner: W, capacity: usize, chain: FlushChain) -> Self {
        let capacity = capacity.max(1);
        Self::from_parts(inner, BytesMut::with_capacity(capacity), capacity, chain)
    }

    /// Creates a writer around an existing buffer. Bytes already in `buf`
    /// are sent first.
    pub fn from_parts(inner: W, buf: BytesMut, capacity: usize, chain: FlushChain) -> Self {
        Self {
            inner,
            buf,
            capacity: capacity.max(1),
            chain,
        }
    }

    /// Buffers `data`, spilling to the stream if the buffer is full.
    ///
    /// Returns the number of bytes accepted, which is always `data.len()`.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.buf.len() + data.len() > self.capacity {
            self.drain().await?;
        }
        if data.len() >= self.capacity {
            self.inner.write_all(data).await?;
        } else {
            self.buf.extend_from_slice(data);
        }
        Ok(data.len())
    }

    /// Runs the flush stages in order, stopping at the first error.
    pub async fn flush(&mut self) -> Result<()> {
        for stage in self.chain.stages() {
            match stage {
                FlushStage::Buffer => self.drain().await?,
                FlushStage::Stream => self.inner.flush().await?,
            }
        }
        Ok(())
    }

    /// Number of bytes waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Returns the flush stages this writer runs.
    pub const fn chain(&self) -> FlushChain {
        self.chain
    }

    /// Gets a mutable reference to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Takes the writer apart, keeping any unsent bytes in the buffer.
    pub fn into_parts(self) -> (W, BytesMut) {
        (self.inner, self.buf)
    }

    async fn drain(&mut self) -> Result<()> {
        while !self.buf.is_empty() {
            let n = self.inner.write(&self.buf).await?;
            if n == 0 {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write buffered data",
                )));
            }
            self.buf.advance(n);
        }
        self.buf.clear();
        Ok(())
    }
}

/// Finds the position of CRLF in a buffer.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parses a literal length from the end of a line.
///
/// Matches patterns like `{123}\r\n` or `{123+}\r\n` (non-synchronizing).
fn parse_literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?;
    let open = line.iter().rposition(|&b| b == b'{')?;
    let inner = line[open + 1..].strip_suffix(b"}")?;
    let digits = inner.strip_suffix(b"+").unwrap_or(inner);

    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};

    use tokio_test::io::Builder;

    use super::*;

    #[test]
    fn test_find_crlf() {
        assert_eq!(find_crlf(b"hello\r\n"), Some(5));
        assert_eq!(find_crlf(b"\r\n"), Some(0));
        assert_eq!(find_crlf(b"no newline"), None);
        assert_eq!(find_crlf(b"just\n"), None);
        assert_eq!(find_crlf(b"just\r"), None);
    }

    #[test]
    fn test_parse_literal_length() {
        assert_eq!(parse_literal_length(b"BODY {123}\r\n"), Some(123));
        assert_eq!(parse_literal_length(b"BODY {123+}\r\n"), Some(123));
        assert_eq!(parse_literal_length(b"{0}\r\n"), Some(0));
        assert_eq!(parse_literal_length(b"{999999}\r\n"), Some(999_999));
        assert_eq!(parse_literal_length(b"no literal\r\n"), None);
        assert_eq!(parse_literal_length(b"incomplete {123"), None);
        assert_eq!(parse_literal_length(b"wrong {abc}\r\n"), None);
        assert_eq!(parse_literal_length(b"empty {}\r\n"), None);
    }

    #[tokio::test]
    async fn test_read_simple_line() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut reader = FrameReader::new(mock, 64);

        let response = reader.read_response().await.unwrap();
        assert_eq!(response, b"* OK ready\r\n");
        assert!(!reader.has_buffered());
    }

    #[tokio::test]
    async fn test_read_crlf_split_across_reads() {
        let mock = Builder::new().read(b"* OK ready\r").read(b"\n").build();
        let mut reader = FrameReader::new(mock, 64);

        assert_eq!(reader.read_response().await.unwrap(), b"* OK ready\r\n");
    }

    #[tokio::test]
    async fn test_read_with_literal() {
        let mock = Builder::new()
            .read(b"* LIST () \"/\" {5}\r\n")
            .read(b"Dra")
            .read(b"fts\r\n")
            .build();
        let mut reader = FrameReader::new(mock, 8);

        let response = reader.read_response().await.unwrap();
        assert_eq!(response, b"* LIST () \"/\" {5}\r\nDrafts\r\n");
    }

    #[tokio::test]
    async fn test_unread_bytes_stay_buffered() {
        let mock = Builder::new().read(b"* 1 EXISTS\r\n* 0 RECENT\r\n").build();
        let mut reader = FrameReader::new(mock, 64);

        assert_eq!(reader.read_response().await.unwrap(), b"* 1 EXISTS\r\n");
        assert!(reader.has_buffered());

        let (_, buf) = reader.into_parts();
        assert_eq!(&buf[..], b"* 0 RECENT\r\n");
    }

    #[tokio::test]
    async fn test_from_parts_reads_buffer_first() {
        let mock = Builder::new().read(b"* BYE\r\n").build();
        let mut reader = FrameReader::from_parts(mock, BytesMut::from(&b"* OK\r\n"[..]), 64);

        assert_eq!(reader.read_response().await.unwrap(), b"* OK\r\n");
        assert_eq!(reader.read_response().await.unwrap(), b"* BYE\r\n");
    }

    #[tokio::test]
    async fn test_eof_is_error() {
        let mock = Builder::new().read(b"* OK partial").build();
        let mut reader = FrameReader::new(mock, 64);

        match reader.read_response().await.unwrap_err() {
            Error::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_literal_size_validation() {
        let literal_size = MAX_LITERAL_SIZE + 1;
        let header = format!("* 1 FETCH (BODY {{{literal_size}}}\r\n");

        let mock = Builder::new().read(header.as_bytes()).build();
        let mut reader = FrameReader::new(mock, 64);

        let result = reader.read_response().await;
        assert!(result.unwrap_err().to_string().contains("literal too large"));
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut reader = FrameReader::new(mock, 8192);

        let result = reader.read_response().await;
        assert!(result.unwrap_err().to_string().contains("line too long"));
    }

    /// Writer that records what reaches it and counts flushes.
    #[derive(Default)]
    struct Recorder {
        data: Vec<u8>,
        writes: usize,
        flushes: Arc<AtomicUsize>,
        fail_writes: bool,
    }

    impl AsyncWrite for Recorder {
        fn poll_write(
            self: Pin<&mut Self>,
            _: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            if this.fail_writes {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone")));
            }
            this.writes += 1;
            this.data.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_write_does_not_flush() {
        let mut writer = FrameWriter::new(Recorder::default(), 64, FlushChain::for_stream(true));

        assert_eq!(writer.write(b"* OK\r\n").await.unwrap(), 6);
        assert_eq!(writer.buffered(), 6);
        assert_eq!(writer.get_mut().writes, 0);
        assert_eq!(writer.get_mut().flushes.load(Ordering::SeqCst), 0);

        writer.flush().await.unwrap();
        assert_eq!(writer.buffered(), 0);
        assert_eq!(writer.get_mut().data, b"* OK\r\n");
        assert_eq!(writer.get_mut().flushes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_plain_chain_skips_stream_flush() {
        let mut writer = FrameWriter::new(Recorder::default(), 64, FlushChain::for_stream(false));

        writer.write(b"* OK\r\n").await.unwrap();
        writer.flush().await.unwrap();

        assert_eq!(writer.get_mut().data, b"* OK\r\n");
        assert_eq!(writer.get_mut().flushes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_spill_without_flush() {
        let mut writer = FrameWriter::new(Recorder::default(), 8, FlushChain::for_stream(true));

        writer.write(b"12345").await.unwrap();
        writer.write(b"6789").await.unwrap();

        // The first chunk spilled to make room; nothing was flushed.
        assert_eq!(writer.get_mut().data, b"12345");
        assert_eq!(writer.buffered(), 4);
        assert_eq!(writer.get_mut().flushes.load(Ordering::SeqCst), 0);

        writer.write(b"a much longer chunk").await.unwrap();
        assert_eq!(writer.get_mut().data, b"123456789a much longer chunk");
        assert_eq!(writer.buffered(), 0);
    }

    #[tokio::test]
    async fn test_flush_stops_at_first_error() {
        let recorder = Recorder {
            fail_writes: true,
            ..Recorder::default()
        };
        let flushes = Arc::clone(&recorder.flushes);
        let mut writer = FrameWriter::new(recorder, 64, FlushChain::for_stream(true));

        writer.write(b"a1 NOOP\r\n").await.unwrap();
        let err = writer.flush().await.unwrap_err();

        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
        assert_eq!(flushes.load(Ordering::SeqCst), 0);
        assert_eq!(writer.buffered(), 9);
    }

    #[tokio::test]
    async fn test_into_parts_keeps_pending_bytes() {
        let mut writer = FrameWriter::new(Recorder::default(), 64, FlushChain::for_stream(false));
        writer.write(b"pending").await.unwrap();

        let (inner, buf) = writer.into_parts();
        let mut writer = FrameWriter::from_parts(inner, buf, 64, FlushChain::for_stream(false));
        writer.flush().await.unwrap();

        assert_eq!(writer.get_mut().data, b"pending");
    }
}

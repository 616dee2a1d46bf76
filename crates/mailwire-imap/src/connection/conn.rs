//! Connection transport.
//!
//! [`Connection`] owns one live stream at a time. The stream is split into a
//! read half and a write half, each wrapped in a diagnostic tap and a framed
//! buffer, each behind its own lock, so a task waiting for the server never
//! blocks a task sending to it.
//!
//! The stream can be replaced in place with [`Connection::upgrade`]. While an
//! upgrade runs, every other operation parks on the upgrade gate and resumes
//! on the new (or, after a failed upgrade, the original) stream.
//!
//! Diagnostic sinks sit in slots shared with the taps, so they can be swapped
//! without touching either half of the stream.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::PoisonError;

use bytes::BytesMut;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::Mutex;

use super::config::{Config, DEFAULT_BUFFER_SIZE};
use super::debug::{Diagnostics, LOCAL_ADDR_FIELD, REMOTE_ADDR_FIELD};
use super::flush::FlushChain;
use super::framed::{FrameReader, FrameWriter};
use super::gate::UpgradeGate;
use super::stream::{Transport, UpgradeResult};
use super::tap::{SinkSlot, TapReader, TapWriter};
use crate::{Error, Result};

type Reader<S> = FrameReader<TapReader<ReadHalf<S>>>;
type Writer<S> = FrameWriter<TapWriter<WriteHalf<S>>>;

#[derive(Debug, Clone, Copy, Default)]
struct Endpoints {
    local: Option<SocketAddr>,
    peer: Option<SocketAddr>,
}

impl Endpoints {
    fn of<S: Transport>(stream: &S) -> Self {
        Self {
            local: stream.local_addr(),
            peer: stream.peer_addr(),
        }
    }

    fn tag(self, diagnostics: &Diagnostics) {
        if let Some(local) = self.local {
            diagnostics.set_field(LOCAL_ADDR_FIELD, &local.to_string());
        }
        if let Some(peer) = self.peer {
            diagnostics.set_field(REMOTE_ADDR_FIELD, &peer.to_string());
        }
    }
}

#[derive(Debug, Default)]
struct Wiring {
    diagnostics: Diagnostics,
    endpoints: Endpoints,
}

/// Sink slots shared by every tap bound to a connection.
#[derive(Debug, Clone, Default)]
struct Taps {
    local: SinkSlot,
    remote: SinkSlot,
}

impl Taps {
    fn set(&self, diagnostics: &Diagnostics) {
        self.local.set(diagnostics.local().cloned());
        self.remote.set(diagnostics.remote().cloned());
    }
}

/// A live, upgradeable protocol connection.
///
/// All methods take `&self`; share the connection behind an `Arc` to read and
/// write from different tasks.
pub struct Connection<S: Transport> {
    reader: Mutex<Option<Reader<S>>>,
    writer: Mutex<Option<Writer<S>>>,
    wiring: std::sync::Mutex<Wiring>,
    taps: Taps,
    gate: UpgradeGate,
    read_capacity: usize,
    write_capacity: usize,
}

impl<S: Transport> Connection<S> {
    /// Wraps a stream with default buffer sizes and no diagnostics.
    pub fn new(stream: S) -> Self {
        Self::with_options(
            stream,
            DEFAULT_BUFFER_SIZE,
            DEFAULT_BUFFER_SIZE,
            Diagnostics::none(),
        )
    }

    /// Wraps a stream using the buffer sizes and wire tracing from `config`.
    pub fn with_config(stream: S, config: &Config) -> Self {
        let diagnostics = if config.trace_wire {
            Diagnostics::tracing()
        } else {
            Diagnostics::none()
        };
        Self::with_options(
            stream,
            config.read_buffer_size,
            config.write_buffer_size,
            diagnostics,
        )
    }

    /// Wraps a stream with explicit buffer capacities and diagnostics.
    pub fn with_options(
        stream: S,
        read_capacity: usize,
        write_capacity: usize,
        diagnostics: Diagnostics,
    ) -> Self {
        let read_capacity = read_capacity.max(1);
        let write_capacity = write_capacity.max(1);
        let endpoints = Endpoints::of(&stream);
        endpoints.tag(&diagnostics);
        let taps = Taps::default();
        taps.set(&diagnostics);
        let (reader, writer) = bind(
            stream,
            BytesMut::with_capacity(read_capacity),
            BytesMut::with_capacity(write_capacity),
            read_capacity,
            write_capacity,
            &taps,
        );

        Self {
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
            wiring: std::sync::Mutex::new(Wiring {
                diagnostics,
                endpoints,
            }),
            taps,
            gate: UpgradeGate::new(),
            read_capacity,
            write_capacity,
        }
    }

    /// Reads one complete response: a CRLF-terminated line together with
    /// any literals it announces.
    ///
    /// # Errors
    ///
    /// Returns the stream's I/O error, [`Error::Protocol`] for oversized
    /// lines or literals, or [`Error::InvalidState`] if the stream was lost
    /// to a cancelled upgrade.
    pub async fn read_response(&self) -> Result<Vec<u8>> {
        self.gate.wait().await;
        let mut reader = self.reader.lock().await;
        reader.as_mut().ok_or_else(detached)?.read_response().await
    }

    /// Buffers `data` for sending. Nothing is flushed implicitly.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer had to spill to the stream and the
    /// stream failed.
    pub async fn write(&self, data: &[u8]) -> Result<usize> {
        self.gate.wait().await;
        let mut writer = self.writer.lock().await;
        writer.as_mut().ok_or_else(detached)?.write(data).await
    }

    /// Sends everything buffered, then flushes the stream if it buffers too.
    ///
    /// # Errors
    ///
    /// Returns the first error of the flush chain; later stages are skipped.
    pub async fn flush(&self) -> Result<()> {
        self.gate.wait().await;
        let mut writer = self.writer.lock().await;
        writer.as_mut().ok_or_else(detached)?.flush().await
    }

    /// Replaces the stream, typically to start TLS.
    ///
    /// Pending output is flushed first, then the halves are joined and the
    /// whole stream is handed to `upgrader`. Whatever stream comes back is
    /// bound in place of the old one: the new stream on success, the
    /// original one on failure. Other operations wait until this returns.
    ///
    /// Must be called at a protocol boundary, with no read in flight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] without calling `upgrader` if received
    /// bytes are still unread, the flush error if pending output cannot be
    /// sent, or the upgrader's own error.
    pub async fn upgrade<F, Fut>(&self, upgrader: F) -> Result<()>
    where
        F: FnOnce(S) -> Fut,
        Fut: Future<Output = UpgradeResult<S>>,
    {
        let _gate = self.gate.close().await;
        let mut writer_slot = self.writer.lock().await;
        writer_slot.as_mut().ok_or_else(detached)?.flush().await?;

        let mut reader_slot = self.reader.lock().await;
        if reader_slot.as_ref().ok_or_else(detached)?.has_buffered() {
            return Err(Error::InvalidState(
                "cannot upgrade with unread bytes buffered".to_string(),
            ));
        }

        let (Some(reader), Some(writer)) = (reader_slot.take(), writer_slot.take()) else {
            return Err(detached());
        };
        let (tap_reader, read_buf) = reader.into_parts();
        let (tap_writer, write_buf) = writer.into_parts();
        let stream = tap_reader.into_inner().unsplit(tap_writer.into_inner());

        tracing::debug!("upgrading connection stream");
        let (stream, outcome) = match upgrader(stream).await {
            Ok(stream) => (stream, Ok(())),
            Err((error, original)) => {
                tracing::warn!(%error, "stream upgrade failed, keeping original stream");
                (original, Err(error))
            }
        };

        {
            let mut wiring = self.wiring();
            wiring.endpoints = Endpoints::of(&stream);
            wiring.endpoints.tag(&wiring.diagnostics);
        }
        let (reader, writer) = bind(
            stream,
            read_buf,
            write_buf,
            self.read_capacity,
            self.write_capacity,
            &self.taps,
        );
        *reader_slot = Some(reader);
        *writer_slot = Some(writer);

        outcome
    }

    /// Waits until no upgrade is in flight.
    pub async fn wait(&self) {
        self.gate.wait().await;
    }

    /// Returns `true` while an upgrade is in flight.
    pub fn is_upgrading(&self) -> bool {
        self.gate.is_closed()
    }

    /// Replaces the diagnostic sinks.
    ///
    /// Takes effect on the next chunk in each direction, including one that
    /// arrives for a read already in flight. The stream and any buffered
    /// bytes are left alone; the new sinks get the endpoint fields before
    /// they see any traffic.
    pub fn set_diagnostics(&self, diagnostics: Diagnostics) {
        let mut wiring = self.wiring();
        wiring.endpoints.tag(&diagnostics);
        self.taps.set(&diagnostics);
        wiring.diagnostics = diagnostics;
    }

    /// Returns the sinks currently in use.
    pub fn diagnostics(&self) -> Diagnostics {
        self.wiring().diagnostics.clone()
    }

    /// Local address of the current stream, if it has one.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.wiring().endpoints.local
    }

    /// Remote address of the current stream, if it has one.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.wiring().endpoints.peer
    }

    fn wiring(&self) -> std::sync::MutexGuard<'_, Wiring> {
        self.wiring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: Transport> std::fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("wiring", &*self.wiring())
            .field("upgrading", &self.is_upgrading())
            .finish_non_exhaustive()
    }
}

/// Splits `stream` and wraps each half in its tap and framed buffer.
///
/// Endpoint fields are tagged by the caller, under the wiring lock.
fn bind<S: Transport>(
    stream: S,
    read_buf: BytesMut,
    write_buf: BytesMut,
    read_capacity: usize,
    write_capacity: usize,
    taps: &Taps,
) -> (Reader<S>, Writer<S>) {
    let endpoints = Endpoints::of(&stream);
    let chain = FlushChain::for_stream(stream.needs_flush());

    tracing::debug!(
        local = ?endpoints.local,
        peer = ?endpoints.peer,
        flush = ?chain.stages(),
        "binding connection stream"
    );

    let (read_half, write_half) = tokio::io::split(stream);
    let reader = FrameReader::from_parts(
        TapReader::with_slot(read_half, taps.remote.clone()),
        read_buf,
        read_capacity,
    );
    let writer = FrameWriter::from_parts(
        TapWriter::with_slot(write_half, taps.local.clone()),
        write_buf,
        write_capacity,
        chain,
    );
    (reader, writer)
}

fn detached() -> Error {
    Error::InvalidState("connection lost its stream to a cancelled upgrade".to_string())
}

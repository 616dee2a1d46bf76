//! Diagnostic sinks for wire traffic.
//!
//! A connection can mirror outbound bytes into a *local* sink and inbound
//! bytes into a *remote* sink. Sinks that understand fields get the
//! connection's endpoint addresses (`loc`, `rem`) before any traffic flows,
//! so their output can be correlated per connection.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Field key carrying the local endpoint address.
pub const LOCAL_ADDR_FIELD: &str = "loc";

/// Field key carrying the remote endpoint address.
pub const REMOTE_ADDR_FIELD: &str = "rem";

/// Receives a copy of the bytes crossing a connection.
pub trait DebugSink: Send {
    /// Records bytes seen on the wire.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot store the bytes. The connection
    /// logs the failure and keeps going.
    fn record(&mut self, data: &[u8]) -> io::Result<()>;

    /// Adds or replaces a contextual field.
    ///
    /// Sinks without field support ignore it and log untagged.
    fn set_field(&mut self, key: &str, value: &str) {
        let _ = (key, value);
    }
}

/// A sink shared between the read and write side of a connection.
pub type SharedSink = Arc<Mutex<dyn DebugSink>>;

/// Wraps a sink for use in [`Diagnostics`].
pub fn shared<T: DebugSink + 'static>(sink: T) -> SharedSink {
    Arc::new(Mutex::new(sink))
}

impl DebugSink for Vec<u8> {
    fn record(&mut self, data: &[u8]) -> io::Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }
}

/// Direction of traffic, relative to this end of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Bytes written by this end.
    Local,
    /// Bytes received from the peer.
    Remote,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "C:",
            Self::Remote => "S:",
        })
    }
}

/// Sink that turns wire traffic into `tracing` events.
///
/// Each recorded chunk becomes one `DEBUG` event on target
/// `mailwire_imap::wire`, tagged with the direction and any fields set.
#[derive(Debug, Clone)]
pub struct TracingSink {
    direction: Direction,
    fields: Vec<(String, String)>,
}

impl TracingSink {
    /// Creates a sink for one direction.
    #[must_use]
    pub const fn new(direction: Direction) -> Self {
        Self {
            direction,
            fields: Vec::new(),
        }
    }

    /// Returns the fields set so far, in insertion order.
    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    fn context(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl DebugSink for TracingSink {
    fn record(&mut self, data: &[u8]) -> io::Result<()> {
        tracing::debug!(
            target: "mailwire_imap::wire",
            direction = %self.direction,
            conn = %self.context(),
            "{}",
            String::from_utf8_lossy(data).trim_end_matches("\r\n")
        );
        Ok(())
    }

    fn set_field(&mut self, key: &str, value: &str) {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => value.clone_into(v),
            None => self.fields.push((key.to_string(), value.to_string())),
        }
    }
}

/// Sink that copies raw traffic into any [`io::Write`], without fields.
#[derive(Debug)]
pub struct WriterSink<W> {
    inner: W,
}

impl<W: Write + Send> WriterSink<W> {
    /// Wraps a writer.
    pub const fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Send> DebugSink for WriterSink<W> {
    fn record(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write_all(data)
    }
}

/// Which sinks a connection mirrors its traffic into.
#[derive(Clone, Default)]
pub struct Diagnostics {
    local: Option<SharedSink>,
    remote: Option<SharedSink>,
}

impl Diagnostics {
    /// No mirroring.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Separate sinks for outbound (`local`) and inbound (`remote`) bytes.
    #[must_use]
    pub const fn split(local: Option<SharedSink>, remote: Option<SharedSink>) -> Self {
        Self { local, remote }
    }

    /// One sink for both directions.
    #[must_use]
    pub fn shared(sink: SharedSink) -> Self {
        Self {
            local: Some(Arc::clone(&sink)),
            remote: Some(sink),
        }
    }

    /// A [`TracingSink`] per direction.
    #[must_use]
    pub fn tracing() -> Self {
        Self::split(
            Some(shared(TracingSink::new(Direction::Local))),
            Some(shared(TracingSink::new(Direction::Remote))),
        )
    }

    /// Returns `true` if at least one side is mirrored.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.local.is_some() || self.remote.is_some()
    }

    /// Sink for outbound bytes.
    #[must_use]
    pub fn local(&self) -> Option<&SharedSink> {
        self.local.as_ref()
    }

    /// Sink for inbound bytes.
    #[must_use]
    pub fn remote(&self) -> Option<&SharedSink> {
        self.remote.as_ref()
    }

    /// Sets a field on every configured sink (once per sink when shared).
    pub fn set_field(&self, key: &str, value: &str) {
        if let Some(local) = &self.local {
            with_sink(local, |sink| sink.set_field(key, value));
        }
        if let Some(remote) = &self.remote {
            let same = self.local.as_ref().is_some_and(|l| Arc::ptr_eq(l, remote));
            if !same {
                with_sink(remote, |sink| sink.set_field(key, value));
            }
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("local", &self.local.is_some())
            .field("remote", &self.remote.is_some())
            .finish()
    }
}

/// Runs `f` on the sink, recovering the sink if a previous user panicked.
pub(crate) fn with_sink<R>(sink: &SharedSink, f: impl FnOnce(&mut dyn DebugSink) -> R) -> R {
    let mut guard = sink
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    f(&mut *guard)
}

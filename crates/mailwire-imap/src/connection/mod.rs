//! IMAP connection management.
//!
//! This module provides the transport layer, including:
//! - Configuration (host, port, security mode, buffer sizes)
//! - TLS/plaintext stream abstraction and the [`Transport`] trait
//! - Framed I/O for IMAP protocol
//! - Diagnostic taps mirroring wire traffic into sinks
//! - An upgradeable [`Connection`] (STARTTLS)

mod config;
mod conn;
mod debug;
mod flush;
mod framed;
mod gate;
mod stream;
mod tap;

pub use config::{Config, ConfigBuilder, DEFAULT_BUFFER_SIZE, Security};
pub use conn::Connection;
pub use debug::{
    DebugSink, Diagnostics, Direction, LOCAL_ADDR_FIELD, REMOTE_ADDR_FIELD, SharedSink,
    TracingSink, WriterSink, shared,
};
pub use flush::{FlushChain, FlushStage};
pub use framed::{FrameReader, FrameWriter};
pub use stream::{ImapStream, Transport, UpgradeResult, connect, create_tls_connector};
pub use tap::{SinkSlot, TapReader, TapWriter};

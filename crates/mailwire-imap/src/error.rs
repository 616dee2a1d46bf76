//! Error types for the IMAP transport.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur on an IMAP connection.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// A response line could not be tokenized.
    #[error("Protocol error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// A claimed response did not have the shape its handler expects.
    #[error("Cannot decode {response} response: {message}")]
    Decode {
        /// Name of the response being decoded.
        response: String,
        /// Description of what went wrong.
        message: String,
    },

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The consumer of a record channel went away.
    #[error("Record channel closed")]
    ChannelClosed,
}

impl Error {
    /// Creates a decode error for the named response.
    pub fn decode(response: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            response: response.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the error only affects the line being processed.
    ///
    /// Parse and decode errors leave the connection usable; everything else
    /// should be handled at the session level.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Decode { .. })
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

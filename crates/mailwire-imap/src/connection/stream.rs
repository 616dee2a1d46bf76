//! Stream types for IMAP connections.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use super::config::{Config, Security};
use crate::{Error, Result};

/// A duplex byte stream a [`Connection`](super::Connection) can own.
///
/// The optional methods describe the stream to the transport: endpoint
/// addresses are attached to diagnostic sinks, and [`needs_flush`] decides
/// whether flushing the connection must also flush the stream itself.
///
/// [`needs_flush`]: Transport::needs_flush
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {
    /// Local endpoint address, if the stream has one.
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    /// Remote endpoint address, if the stream has one.
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }

    /// Returns `true` if written bytes may sit in the stream until it is
    /// flushed (TLS records, compression).
    fn needs_flush(&self) -> bool {
        false
    }
}

impl Transport for TcpStream {
    fn local_addr(&self) -> Option<SocketAddr> {
        Self::local_addr(self).ok()
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Self::peer_addr(self).ok()
    }
}

impl Transport for DuplexStream {}

/// Result of an upgrader: the replacement stream, or the error together with
/// the original stream so the connection can keep using it.
pub type UpgradeResult<S> = std::result::Result<S, (Error, S)>;

/// A stream that can be either plaintext or TLS.
pub enum ImapStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl ImapStream {
    /// Creates a new plaintext stream.
    pub const fn plain(stream: TcpStream) -> Self {
        Self::Plain(stream)
    }

    /// Creates a new TLS stream.
    pub fn tls(stream: TlsStream<TcpStream>) -> Self {
        Self::Tls(Box::new(stream))
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Upgrades a plaintext stream to TLS after a successful STARTTLS.
    ///
    /// On failure the plaintext stream is handed back with the error, which
    /// makes this usable as an upgrader for
    /// [`Connection::upgrade`](super::Connection::upgrade).
    pub async fn starttls(self, host: &str) -> UpgradeResult<Self> {
        let tcp = match self {
            Self::Plain(tcp) => tcp,
            tls @ Self::Tls(_) => {
                return Err((
                    Error::InvalidState("Stream is already TLS".to_string()),
                    tls,
                ));
            }
        };

        let server_name = match ServerName::try_from(host.to_string()) {
            Ok(name) => name,
            Err(e) => return Err((e.into(), Self::Plain(tcp))),
        };

        match create_tls_connector()
            .connect(server_name, tcp)
            .into_fallible()
            .await
        {
            Ok(tls) => Ok(Self::tls(tls)),
            Err((e, tcp)) => Err((e.into(), Self::Plain(tcp))),
        }
    }

    fn tcp(&self) -> &TcpStream {
        match self {
            Self::Plain(stream) => stream,
            Self::Tls(stream) => stream.get_ref().0,
        }
    }
}

impl Transport for ImapStream {
    fn local_addr(&self) -> Option<SocketAddr> {
        self.tcp().local_addr().ok()
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.tcp().peer_addr().ok()
    }

    fn needs_flush(&self) -> bool {
        self.is_tls()
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Creates a TLS connector with default root certificates.
#[must_use]
pub fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// Opens the stream described by `config`.
///
/// With [`Security::Implicit`] the TLS handshake happens here. With
/// [`Security::StartTls`] the stream stays plaintext; the caller issues
/// STARTTLS and then upgrades the connection with [`ImapStream::starttls`].
pub async fn connect(config: &Config) -> Result<ImapStream> {
    let addr = format!("{}:{}", config.host, config.port);
    tracing::debug!(%addr, security = ?config.security, "connecting");

    let tcp = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| Error::Timeout(config.connect_timeout))??;

    match config.security {
        Security::None | Security::StartTls => Ok(ImapStream::Plain(tcp)),
        Security::Implicit => {
            let server_name = ServerName::try_from(config.host.clone())?;
            let tls = create_tls_connector().connect(server_name, tcp).await?;
            Ok(ImapStream::tls(tls))
        }
    }
}

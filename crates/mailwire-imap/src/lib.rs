//! # mailwire-imap
//!
//! The transport and response-dispatch core of an IMAP server or client.
//!
//! ## Features
//!
//! - **Upgradeable connections**: a [`Connection`] owns one stream at a time
//!   and can swap it in place (STARTTLS) while other tasks wait at a gate
//! - **Independent read and write sides**: a task blocked on the peer never
//!   holds up a task sending to it
//! - **Wire taps**: mirror inbound and outbound bytes into diagnostic sinks,
//!   tagged with the connection's endpoint addresses
//! - **Explicit flushing**: writes are buffered until [`Connection::flush`]
//! - **Named-response dispatch**: untagged responses are routed to handlers
//!   by name, decoded into records and encoded back onto the wire
//! - **TLS via rustls**: secure connections without OpenSSL dependency
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailwire_imap::connection::{self, Config, Connection, Security};
//! use mailwire_imap::handler::{ResponseWriter, Dispatcher};
//! use mailwire_imap::responses::List;
//!
//! # async fn run() -> mailwire_imap::Result<()> {
//! let config = Config::builder("imap.example.com")
//!     .security(Security::StartTls)
//!     .build();
//! let conn = Connection::with_config(connection::connect(&config).await?, &config);
//!
//! conn.write(b"a1 STARTTLS\r\n").await?;
//! conn.flush().await?;
//! conn.read_response().await?;
//! conn.upgrade(|stream| stream.starttls("imap.example.com")).await?;
//!
//! // Decode LIST responses into records, then write the special-use ones
//! // back out.
//! let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.register(List::list().handler(tx));
//! dispatcher.dispatch_line(b"* LIST (\\Sent) \"/\" Sent\r\n")?;
//! drop(dispatcher);
//!
//! let mut out = Vec::new();
//! List::list().special_use(true).writer(rx).write_to(&mut out).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`connection`]: Streams, configuration, taps and the upgradeable connection
//! - [`handler`]: Named-response handlers, writers and the dispatcher
//! - [`responses`]: Handlers and writers for specific responses (LIST, LSUB)
//! - [`parser`]: Lexer and named-response parser
//! - [`format`]: Wire formatting of strings and fields
//! - [`types`]: Mailbox types
//! - [`state`]: Connection state bitmask

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod connection;
mod error;
pub mod format;
pub mod handler;
pub mod parser;
pub mod responses;
pub mod state;
pub mod types;

pub use connection::{
    Config, ConfigBuilder, Connection, DebugSink, Diagnostics, ImapStream, Security, Transport,
};
pub use error::{Error, Result};
pub use handler::{Dispatch, Dispatcher, Handled, ResponseHandler, ResponseSink, ResponseWriter};
pub use parser::{Field, NamedResponse};
pub use responses::{List, ListHandler, ListWriter};
pub use state::ConnState;
pub use types::{Mailbox, MailboxInfo, SPECIAL_USE};

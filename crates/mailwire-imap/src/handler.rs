//! Named-response handlers.
//!
//! Untagged responses arrive in any order and a client must be ready to take
//! any of them at any time (RFC 2683). A [`Dispatcher`] offers each parsed
//! [`NamedResponse`] to its handlers in registration order. A handler either
//! claims the response or declines it with [`Handled::NotMine`]; declining
//! is normal and never logged as a failure.
//!
//! The way back out is a [`ResponseWriter`], which turns records into wire
//! lines on a [`ResponseSink`].
//!
//! # Example
//!
//! ```
//! use mailwire_imap::handler::{CollectingHandler, Dispatch, Dispatcher};
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.register(CollectingHandler::new("EXISTS"));
//!
//! match dispatcher.dispatch_line(b"* 23 EXISTS\r\n").unwrap() {
//!     Dispatch::Handled { name } => assert_eq!(name, "EXISTS"),
//!     Dispatch::Unhandled(_) => unreachable!(),
//! }
//! ```

use std::future::Future;

use crate::connection::{Connection, Transport};
use crate::parser::NamedResponse;
use crate::Result;

/// Outcome of offering a response to a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// The handler decoded and consumed the response.
    Consumed,
    /// The response belongs to some other handler.
    NotMine,
}

/// Consumer of one kind of named response.
pub trait ResponseHandler: Send {
    /// Name of the responses this handler claims, for logging.
    fn name(&self) -> &str;

    /// Offers a response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`](crate::Error::Decode) if the response is
    /// claimed but malformed, or any error raised while delivering the
    /// decoded record.
    fn handle(&mut self, response: &NamedResponse) -> Result<Handled>;
}

/// Destination for encoded response lines.
pub trait ResponseSink {
    /// Writes one complete line, CRLF included.
    fn write_line(&mut self, line: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Pushes written lines to their destination.
    fn flush(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Source of encoded response lines.
pub trait ResponseWriter {
    /// Writes every pending record to `sink`, then flushes it.
    ///
    /// Returns the number of lines written.
    ///
    /// # Errors
    ///
    /// Returns the first error of the sink; records after it are not
    /// written.
    fn write_to<W: ResponseSink + Send>(
        &mut self,
        sink: W,
    ) -> impl Future<Output = Result<usize>> + Send;
}

impl<S: Transport> ResponseSink for &Connection<S> {
    fn write_line(&mut self, line: &[u8]) -> impl Future<Output = Result<()>> + Send {
        async move { self.write(line).await.map(|_| ()) }
    }

    fn flush(&mut self) -> impl Future<Output = Result<()>> + Send {
        Connection::flush(*self)
    }
}

impl ResponseSink for &mut Vec<u8> {
    fn write_line(&mut self, line: &[u8]) -> impl Future<Output = Result<()>> + Send {
        self.extend_from_slice(line);
        std::future::ready(Ok(()))
    }

    fn flush(&mut self) -> impl Future<Output = Result<()>> + Send {
        std::future::ready(Ok(()))
    }
}

/// Result of dispatching one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A handler consumed the response.
    Handled {
        /// Name reported by the handler.
        name: String,
    },
    /// No handler claimed the response; it is handed back untouched.
    Unhandled(NamedResponse),
}

/// Routes named responses to handlers in registration order.
#[derive(Default)]
pub struct Dispatcher {
    handlers: Vec<Box<dyn ResponseHandler>>,
}

impl Dispatcher {
    /// Creates a dispatcher without handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler after the existing ones.
    pub fn register<H: ResponseHandler + 'static>(&mut self, handler: H) -> &mut Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Offers `response` to each handler until one claims it.
    ///
    /// # Errors
    ///
    /// Returns the error of the first handler that claims the response and
    /// fails; handlers after it are not consulted.
    pub fn dispatch(&mut self, response: NamedResponse) -> Result<Dispatch> {
        for handler in &mut self.handlers {
            match handler.handle(&response) {
                Ok(Handled::NotMine) => {}
                Ok(Handled::Consumed) => {
                    tracing::trace!(handler = handler.name(), response = response.name(), "handled");
                    return Ok(Dispatch::Handled {
                        name: handler.name().to_string(),
                    });
                }
                Err(error) => {
                    tracing::debug!(handler = handler.name(), %error, "handler failed");
                    return Err(error);
                }
            }
        }

        tracing::trace!(response = response.name(), "no handler");
        Ok(Dispatch::Unhandled(response))
    }

    /// Parses one framed line and dispatches it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`](crate::Error::Parse) for a malformed line,
    /// otherwise as [`Dispatcher::dispatch`].
    pub fn dispatch_line(&mut self, line: &[u8]) -> Result<Dispatch> {
        self.dispatch(NamedResponse::parse(line)?)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| h.name()))
            .finish()
    }
}

/// A handler that keeps every response of one name.
///
/// Useful for testing, or for responses that only need to be looked at once
/// the command that caused them has completed.
#[derive(Debug, Clone)]
pub struct CollectingHandler {
    name: String,
    /// Collected responses.
    pub responses: Vec<NamedResponse>,
}

impl CollectingHandler {
    /// Creates a handler for responses called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Vec::new(),
        }
    }

    /// Takes all collected responses, leaving the handler empty.
    pub fn take(&mut self) -> Vec<NamedResponse> {
        std::mem::take(&mut self.responses)
    }
}

impl ResponseHandler for CollectingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&mut self, response: &NamedResponse) -> Result<Handled> {
        if !response.is(&self.name) {
            return Ok(Handled::NotMine);
        }
        self.responses.push(response.clone());
        Ok(Handled::Consumed)
    }
}

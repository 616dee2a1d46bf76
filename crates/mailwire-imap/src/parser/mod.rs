//! IMAP response parsing.
//!
//! - **Lexer**: tokenizes raw response bytes (atoms, strings, literals, ...)
//! - **Named responses**: splits an untagged line into a name and untyped
//!   fields, the common input of every response handler
//!
//! # Example
//!
//! ```
//! use mailwire_imap::parser::{Field, NamedResponse};
//!
//! let resp = NamedResponse::parse(b"* LIST (\\Sent) \"/\" Sent\r\n").unwrap();
//! assert_eq!(resp.name(), "LIST");
//! assert_eq!(resp.fields()[2], Field::Atom("Sent".to_string()));
//! ```

pub mod lexer;
mod named;

pub use lexer::{Lexer, Token};
pub use named::{Field, NamedResponse};

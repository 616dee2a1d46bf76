//! Core IMAP data types carried by responses.

mod mailbox;

pub use mailbox::{Mailbox, MailboxInfo, SPECIAL_USE};

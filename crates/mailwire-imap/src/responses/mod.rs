//! Handlers and writers for specific named responses.
//!
//! Each response kind pairs a decode side, a [`ResponseHandler`] that turns
//! claimed lines into records, with an encode side, a [`ResponseWriter`] that
//! turns records back into lines. The two sides are connected by a channel.
//!
//! [`ResponseHandler`]: crate::handler::ResponseHandler
//! [`ResponseWriter`]: crate::handler::ResponseWriter

mod list;

pub use list::{List, ListHandler, ListWriter};

//! LIST and LSUB responses (RFC 3501 section 7.2.2, RFC 6154).
//!
//! ```text
//! * LIST (\HasNoChildren \Sent) "/" Sent
//! * LSUB () "." INBOX.Drafts
//! ```

use std::future::Future;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::format::untagged_line;
use crate::handler::{Handled, ResponseHandler, ResponseSink, ResponseWriter};
use crate::parser::{Field, NamedResponse};
use crate::types::{Mailbox, MailboxInfo};
use crate::{Error, Result};

/// Which listing a handler or writer works on.
///
/// `subscribed` selects LSUB instead of LIST. With `special_use` set, the
/// writer only emits mailboxes that carry a special-use attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct List {
    /// LSUB instead of LIST.
    pub subscribed: bool,
    /// Only write special-use mailboxes.
    pub special_use: bool,
}

impl List {
    /// Plain LIST.
    #[must_use]
    pub const fn list() -> Self {
        Self {
            subscribed: false,
            special_use: false,
        }
    }

    /// LSUB.
    #[must_use]
    pub const fn lsub() -> Self {
        Self {
            subscribed: true,
            special_use: false,
        }
    }

    /// Enables or disables the special-use filter.
    #[must_use]
    pub const fn special_use(mut self, enabled: bool) -> Self {
        self.special_use = enabled;
        self
    }

    /// Response name on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        if self.subscribed { "LSUB" } else { "LIST" }
    }

    /// Returns `true` if the writer emits `info` under this configuration.
    #[must_use]
    pub fn accepts(self, info: &MailboxInfo) -> bool {
        !self.special_use || info.is_special_use()
    }

    /// Creates the decode side, delivering records to `tx`.
    #[must_use]
    pub const fn handler(self, tx: UnboundedSender<MailboxInfo>) -> ListHandler {
        ListHandler { list: self, tx }
    }

    /// Creates the encode side, reading records from `rx`.
    #[must_use]
    pub const fn writer(self, rx: UnboundedReceiver<MailboxInfo>) -> ListWriter {
        ListWriter { list: self, rx }
    }

    /// Decodes the fields of a listing response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] unless the response has exactly an
    /// attribute list of atoms, a delimiter (one-character quoted string or
    /// NIL) and a mailbox name.
    pub fn decode(self, response: &NamedResponse) -> Result<MailboxInfo> {
        let name = self.name();
        // LIST-EXTENDED (RFC 5258) appends extended data; it is not kept.
        let [attributes, delimiter, mailbox, ..] = response.fields() else {
            return Err(Error::decode(
                name,
                format!("expected at least 3 fields, got {}", response.fields().len()),
            ));
        };

        let attributes = attributes
            .as_list()
            .ok_or_else(|| Error::decode(name, "attributes must be a parenthesised list"))?
            .iter()
            .map(|attr| {
                attr.as_atom()
                    .map(str::to_string)
                    .ok_or_else(|| Error::decode(name, format!("invalid attribute {attr:?}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let delimiter = match delimiter {
            Field::Nil => None,
            Field::Quoted(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => {
                        return Err(Error::decode(
                            name,
                            format!("delimiter must be one character, got {s:?}"),
                        ));
                    }
                }
            }
            other => {
                return Err(Error::decode(name, format!("invalid delimiter {other:?}")));
            }
        };

        let mailbox = mailbox
            .as_astring()
            .ok_or_else(|| Error::decode(name, format!("invalid mailbox name {mailbox:?}")))?;

        Ok(MailboxInfo {
            attributes,
            delimiter,
            mailbox: Mailbox::new(mailbox),
        })
    }

    /// Encodes one record as a response line.
    #[must_use]
    pub fn encode(self, info: &MailboxInfo) -> Vec<u8> {
        let attributes = info
            .attributes
            .iter()
            .map(|attr| Field::Atom(attr.clone()))
            .collect();
        let delimiter = info
            .delimiter
            .map_or(Field::Nil, |c| Field::Quoted(c.to_string()));

        untagged_line(
            self.name(),
            &[
                Field::List(attributes),
                delimiter,
                Field::astring(info.mailbox.as_str()),
            ],
        )
    }
}

/// Decode side of a listing: claims LIST or LSUB lines and sends the records
/// down a channel.
#[derive(Debug)]
pub struct ListHandler {
    list: List,
    tx: UnboundedSender<MailboxInfo>,
}

impl ResponseHandler for ListHandler {
    fn name(&self) -> &str {
        self.list.name()
    }

    fn handle(&mut self, response: &NamedResponse) -> Result<Handled> {
        if !response.is(self.list.name()) {
            return Ok(Handled::NotMine);
        }
        let info = self.list.decode(response)?;
        self.tx.send(info).map_err(|_| Error::ChannelClosed)?;
        Ok(Handled::Consumed)
    }
}

/// Encode side of a listing: writes every record it receives until all
/// senders are gone.
#[derive(Debug)]
pub struct ListWriter {
    list: List,
    rx: UnboundedReceiver<MailboxInfo>,
}

impl ResponseWriter for ListWriter {
    fn write_to<W: ResponseSink + Send>(
        &mut self,
        mut sink: W,
    ) -> impl Future<Output = Result<usize>> + Send {
        async move {
            let mut written = 0;
            while let Some(info) = self.rx.recv().await {
                if !self.list.accepts(&info) {
                    continue;
                }
                sink.write_line(&self.list.encode(&info)).await?;
                written += 1;
            }
            sink.flush().await?;
            tracing::trace!(response = self.list.name(), written, "listing written");
            Ok(written)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use tokio::sync::mpsc::unbounded_channel;

    use super::*;

    fn response(line: &[u8]) -> NamedResponse {
        NamedResponse::parse(line).unwrap()
    }

    #[test]
    fn test_name_follows_config() {
        assert_eq!(List::list().name(), "LIST");
        assert_eq!(List::lsub().name(), "LSUB");
        assert_eq!(List::lsub().special_use(true).name(), "LSUB");
        assert_eq!(List::default(), List::list());
    }

    #[test]
    fn test_decode() {
        let info = List::list()
            .decode(&response(b"* LIST (\\HasNoChildren \\Sent) \"/\" Sent\r\n"))
            .unwrap();

        assert_eq!(info.attributes, vec!["\\HasNoChildren", "\\Sent"]);
        assert_eq!(info.delimiter, Some('/'));
        assert_eq!(info.mailbox.as_str(), "Sent");
    }

    #[test]
    fn test_decode_nil_delimiter_and_quoted_name() {
        let info = List::list()
            .decode(&response(b"* LIST () NIL \"My Folder\"\r\n"))
            .unwrap();

        assert!(info.attributes.is_empty());
        assert_eq!(info.delimiter, None);
        assert_eq!(info.mailbox.as_str(), "My Folder");
    }

    #[test]
    fn test_decode_escaped_delimiter() {
        let info = List::list()
            .decode(&response(b"* LIST () \"\\\\\" Work\r\n"))
            .unwrap();
        assert_eq!(info.delimiter, Some('\\'));
    }

    #[test]
    fn test_decode_literal_name() {
        let info = List::list()
            .decode(&response(b"* LIST () \"/\" {7}\r\nArchiv\xc3\r\n"))
            .err();
        // Invalid UTF-8 in a literal is not a mailbox name.
        assert!(matches!(info, Some(Error::Decode { .. })));

        let info = List::list()
            .decode(&response(b"* LIST () \"/\" {6}\r\nAr\"chv\r\n"))
            .unwrap();
        assert_eq!(info.mailbox.as_str(), "Ar\"chv");
    }

    #[test]
    fn test_decode_normalises_inbox() {
        let info = List::list()
            .decode(&response(b"* LIST () \"/\" inbox\r\n"))
            .unwrap();
        assert_eq!(info.mailbox, Mailbox::inbox());
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let cases: [&[u8]; 5] = [
            b"* LIST () \"/\"\r\n",
            b"* LIST ()\r\n",
            b"* LIST \\Sent \"/\" Sent\r\n",
            b"* LIST () \"//\" Sent\r\n",
            b"* LIST ((\\Sent)) \"/\" Sent\r\n",
        ];
        for line in cases {
            let err = List::list().decode(&response(line)).unwrap_err();
            assert!(matches!(err, Error::Decode { ref response, .. } if response == "LIST"), "{err}");
        }
    }

    #[test]
    fn test_decode_ignores_extended_data() {
        let info = List::list()
            .decode(&response(
                b"* LIST (\\Subscribed) \"/\" foo (\"CHILDINFO\" (\"SUBSCRIBED\"))\r\n",
            ))
            .unwrap();
        assert_eq!(info.mailbox.as_str(), "foo");
        assert_eq!(info.delimiter, Some('/'));
        assert_eq!(info.attributes, vec!["\\Subscribed"]);

        let info = List::list().decode(&response(b"* LIST () \"/\" a b\r\n")).unwrap();
        assert_eq!(info.mailbox.as_str(), "a");
    }

    #[test]
    fn test_filter_accepts_all_mail() {
        let filtered = List::list().special_use(true);
        for attr in ["\\ALL", "\\All"] {
            let info = MailboxInfo::new("All", Some('/')).with_attribute(attr);
            assert!(filtered.accepts(&info), "{attr}");
        }
        let info = MailboxInfo::new("All", Some('/')).with_attribute("\\all");
        assert!(!filtered.accepts(&info));
        assert!(List::list().accepts(&info));
    }

    #[test]
    fn test_encode() {
        let info = MailboxInfo::new("Sent", Some('/'))
            .with_attribute("\\HasNoChildren")
            .with_attribute("\\Sent");
        assert_eq!(
            List::list().encode(&info),
            b"* LIST (\\HasNoChildren \\Sent) \"/\" Sent\r\n"
        );

        let info = MailboxInfo::new("My Folder", None);
        assert_eq!(List::lsub().encode(&info), b"* LSUB () NIL \"My Folder\"\r\n");

        let info = MailboxInfo::new("a", Some('"'));
        assert_eq!(List::list().encode(&info), b"* LIST () \"\\\"\" a\r\n");
    }

    #[test]
    fn test_handler_decodes_good_line() {
        let (tx, mut rx) = unbounded_channel();
        let mut handler = List::list().handler(tx);

        let outcome = handler
            .handle(&response(b"* LIST (\\Sent) \"/\" Sent\r\n"))
            .unwrap();

        assert_eq!(outcome, Handled::Consumed);
        let info = rx.try_recv().unwrap();
        assert_eq!(info.mailbox.as_str(), "Sent");
    }

    #[test]
    fn test_handler_rejects_malformed_line() {
        let (tx, mut rx) = unbounded_channel();
        let mut handler = List::list().handler(tx);

        let err = handler.handle(&response(b"* LIST garbage\r\n")).unwrap_err();

        assert!(matches!(err, Error::Decode { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_handler_ignores_other_responses() {
        let (tx, mut rx) = unbounded_channel();
        let mut lsub = List::lsub().handler(tx);

        assert_eq!(
            lsub.handle(&response(b"* LIST () \"/\" INBOX\r\n")).unwrap(),
            Handled::NotMine
        );
        assert_eq!(
            lsub.handle(&response(b"* 3 EXISTS\r\n")).unwrap(),
            Handled::NotMine
        );
        assert_eq!(
            lsub.handle(&response(b"* lsub () \"/\" INBOX\r\n")).unwrap(),
            Handled::Consumed
        );
        assert_eq!(rx.try_recv().unwrap().mailbox, Mailbox::inbox());
    }

    #[test]
    fn test_handler_reports_closed_channel() {
        let (tx, rx) = unbounded_channel();
        drop(rx);
        let mut handler = List::list().handler(tx);

        let err = handler
            .handle(&response(b"* LIST () \"/\" INBOX\r\n"))
            .unwrap_err();
        assert!(matches!(err, Error::ChannelClosed));
    }

    #[tokio::test]
    async fn test_writer_drains_in_order() {
        let (tx, rx) = unbounded_channel();
        tx.send(MailboxInfo::new("INBOX", Some('/'))).unwrap();
        tx.send(MailboxInfo::new("Drafts", Some('/')).with_attribute("\\Drafts"))
            .unwrap();
        drop(tx);

        let mut out = Vec::new();
        let written = List::list().writer(rx).write_to(&mut out).await.unwrap();

        assert_eq!(written, 2);
        assert_eq!(
            out,
            b"* LIST () \"/\" INBOX\r\n* LIST (\\Drafts) \"/\" Drafts\r\n"
        );
    }

    #[tokio::test]
    async fn test_writer_special_use_filter() {
        let records = [
            MailboxInfo::new("Plain", Some('/')),
            MailboxInfo::new("Archive", Some('/')).with_attribute("\\Archive"),
            MailboxInfo::new("Hidden", Some('/')).with_attribute("\\Noselect"),
            MailboxInfo::new("Sent", Some('/'))
                .with_attribute("\\Sent")
                .with_attribute("\\Noselect"),
        ];

        let (tx, rx) = unbounded_channel();
        for record in &records {
            tx.send(record.clone()).unwrap();
        }
        drop(tx);

        let mut out = Vec::new();
        let written = List::list()
            .special_use(true)
            .writer(rx)
            .write_to(&mut out)
            .await
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(
            out,
            [
                List::list().encode(&records[1]),
                List::list().encode(&records[3]),
            ]
            .concat()
        );
    }

    #[tokio::test]
    async fn test_writer_stops_on_sink_error() {
        struct Failing {
            lines: usize,
        }

        impl ResponseSink for &mut Failing {
            fn write_line(&mut self, _: &[u8]) -> impl Future<Output = Result<()>> + Send {
                self.lines += 1;
                std::future::ready(Err(Error::Protocol("sink closed".into())))
            }

            fn flush(&mut self) -> impl Future<Output = Result<()>> + Send {
                std::future::ready(Ok(()))
            }
        }

        let (tx, rx) = unbounded_channel();
        tx.send(MailboxInfo::new("a", None)).unwrap();
        tx.send(MailboxInfo::new("b", None)).unwrap();
        drop(tx);

        let mut sink = Failing { lines: 0 };
        let err = List::list().writer(rx).write_to(&mut sink).await.unwrap_err();

        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(sink.lines, 1);
    }
}

//! Mailbox types.

use std::fmt;

/// Mailbox name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox(pub String);

impl Mailbox {
    /// Creates a new mailbox name.
    ///
    /// `INBOX` is case-insensitive per RFC 3501 and is stored in its
    /// canonical upper-case form.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.eq_ignore_ascii_case("INBOX") {
            Self::inbox()
        } else {
            Self(name)
        }
    }

    /// The INBOX mailbox.
    #[must_use]
    pub fn inbox() -> Self {
        Self("INBOX".to_string())
    }

    /// Returns the mailbox name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SPECIAL-USE attributes recognised by the listing filter (RFC 6154, RFC 8457).
///
/// Matching is exact and case-sensitive. The all-mail role is recognised
/// both as registered (`\All`) and as `\ALL`, which some servers send.
pub const SPECIAL_USE: [&str; 9] = [
    "\\ALL",
    "\\All",
    "\\Archive",
    "\\Drafts",
    "\\Flagged",
    "\\Junk",
    "\\Sent",
    "\\Trash",
    "\\Important",
];

/// Mailbox description carried by a LIST or LSUB response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxInfo {
    /// Mailbox attributes as sent on the wire, in order.
    pub attributes: Vec<String>,
    /// Hierarchy delimiter, `None` for a flat namespace (NIL).
    pub delimiter: Option<char>,
    /// Mailbox name.
    pub mailbox: Mailbox,
}

impl MailboxInfo {
    /// Creates a mailbox description without attributes.
    #[must_use]
    pub fn new(mailbox: impl Into<String>, delimiter: Option<char>) -> Self {
        Self {
            attributes: Vec::new(),
            delimiter,
            mailbox: Mailbox::new(mailbox),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    /// Returns `true` if the mailbox carries `attribute` (exact match).
    #[must_use]
    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute)
    }

    /// Returns the special-use attributes of this mailbox.
    ///
    /// The result follows the order of [`SPECIAL_USE`] and contains each
    /// attribute at most once, however often the server repeated it.
    #[must_use]
    pub fn special_use(&self) -> Vec<&'static str> {
        SPECIAL_USE
            .iter()
            .copied()
            .filter(|attr| self.has_attribute(attr))
            .collect()
    }

    /// Returns `true` if the mailbox serves at least one special-use role.
    #[must_use]
    pub fn is_special_use(&self) -> bool {
        SPECIAL_USE.iter().any(|attr| self.has_attribute(attr))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    mod mailbox_tests {
        use super::*;

        #[test]
        fn new_from_str() {
            let mb = Mailbox::new("Drafts");
            assert_eq!(mb.as_str(), "Drafts");
        }

        #[test]
        fn inbox_is_canonical() {
            assert_eq!(Mailbox::new("inbox"), Mailbox::inbox());
            assert_eq!(Mailbox::new("InBoX").as_str(), "INBOX");
        }

        #[test]
        fn other_names_keep_case() {
            assert_eq!(Mailbox::new("Inbox/Work").as_str(), "Inbox/Work");
        }

        #[test]
        fn display() {
            let mb = Mailbox::new("Sent");
            assert_eq!(format!("{mb}"), "Sent");
        }
    }

    mod special_use_tests {
        use super::*;

        #[test]
        fn no_attributes() {
            let info = MailboxInfo::new("Plain", Some('/'));
            assert!(info.special_use().is_empty());
            assert!(!info.is_special_use());
        }

        #[test]
        fn non_special_attribute() {
            let info = MailboxInfo::new("Folder", Some('/')).with_attribute("\\Noselect");
            assert!(!info.is_special_use());
        }

        #[test]
        fn mixed_attributes() {
            let info = MailboxInfo::new("Sent", Some('/'))
                .with_attribute("\\Noselect")
                .with_attribute("\\Sent");
            assert_eq!(info.special_use(), vec!["\\Sent"]);
        }

        #[test]
        fn repeated_attribute_counted_once() {
            let info = MailboxInfo::new("Bin", Some('.'))
                .with_attribute("\\Trash")
                .with_attribute("\\Trash")
                .with_attribute("\\Archive");
            assert_eq!(info.special_use(), vec!["\\Archive", "\\Trash"]);
        }

        #[test]
        fn all_mail_spellings() {
            let upper = MailboxInfo::new("All", Some('/')).with_attribute("\\ALL");
            assert_eq!(upper.special_use(), vec!["\\ALL"]);
            let registered = MailboxInfo::new("All Mail", Some('/')).with_attribute("\\All");
            assert_eq!(registered.special_use(), vec!["\\All"]);
            let other = MailboxInfo::new("all", Some('/')).with_attribute("\\all");
            assert!(!other.is_special_use());
        }

        #[test]
        fn matching_is_case_sensitive() {
            let info = MailboxInfo::new("Junk", Some('/')).with_attribute("\\JUNK");
            assert!(!info.is_special_use());
        }
    }
}

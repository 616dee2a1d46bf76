//! Connection state bitmask.
//!
//! Follows the state diagram in RFC 3501 section 3. The transport never reads
//! or changes the state; it is owned by the session layer above it.

use std::fmt;
use std::ops::{BitAnd, BitOr};

/// IMAP connection state.
///
/// States are bit flags so that related states can be tested together:
/// `SELECTED` includes the `AUTHENTICATED` bit, and [`ConnState::CONNECTED`]
/// is the union of every state in which a session is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConnState(u8);

impl ConnState {
    /// The server has not yet sent a greeting; no command can be issued.
    pub const CONNECTING: Self = Self(0);

    /// The client must authenticate before most commands are permitted.
    pub const NOT_AUTHENTICATED: Self = Self(1 << 0);

    /// The client is authenticated and must select a mailbox before
    /// message commands are permitted.
    pub const AUTHENTICATED: Self = Self(1 << 1);

    /// A mailbox has been selected.
    pub const SELECTED: Self = Self(Self::AUTHENTICATED.0 | 1 << 2);

    /// The connection is being terminated.
    pub const LOGOUT: Self = Self(1 << 3);

    /// Any state in which a session is established and not yet terminated.
    pub const CONNECTED: Self =
        Self(Self::NOT_AUTHENTICATED.0 | Self::AUTHENTICATED.0 | Self::SELECTED.0);

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    ///
    /// `CONNECTING` has no bits, so every state contains it.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if `self` and `other` share at least one bit.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `true` if a session is established and not yet terminated.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        self.intersects(Self::CONNECTED)
    }

    /// Returns `true` for the authenticated and selected states.
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        self.contains(Self::AUTHENTICATED)
    }
}

impl BitOr for ConnState {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for ConnState {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::CONNECTING => "connecting",
            Self::NOT_AUTHENTICATED => "not authenticated",
            Self::AUTHENTICATED => "authenticated",
            Self::SELECTED => "selected",
            Self::LOGOUT => "logout",
            _ => return write!(f, "{:#06b}", self.0),
        };
        f.write_str(name)
    }
}

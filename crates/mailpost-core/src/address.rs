//! Recipient token validation and classified addresses

use std::path::PathBuf;

/// Whether a character may appear inside a recipient token.
pub fn is_address_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '/' | '-' | ';' | '@' | '(' | ')')
}

/// A recipient token resolved to exactly one destination kind.
///
/// Classification is total: every non-empty token becomes exactly one of
/// these, with `Unknown` as the terminal case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// A user found in the local directory; delivery appends to their mailbox.
    Local {
        user: String,
        mailbox: PathBuf,
        uid: u32,
    },
    /// A `user@host` destination queued for the transport daemon.
    Network { user: String, host: String },
    /// A token that matched nothing; always undeliverable.
    Unknown { token: String },
}

impl Address {
    /// The token as shown in per-recipient progress output.
    pub fn label(&self) -> String {
        match self {
            Address::Local { user, .. } => user.clone(),
            Address::Network { user, host } => format!("{user}@{host}"),
            Address::Unknown { token } => token.clone(),
        }
    }
}

//! Recipient list resolution
//!
//! Consumes a free-form recipient list (tokens separated by comma, space,
//! or newline) and classifies every token as a local user, a network
//! `user@host`, or unknown. A token ending in `:` names a file of further
//! recipients, expanded exactly one level deep; a `name:` inside such a
//! file is an error that abandons the rest of that file.

use crate::address::{Address, is_address_char};
use crate::directory::{DirectoryError, UserDb};
use std::fs;
use thiserror::Error;

/// A token-level resolution failure. These are reported per token; none of
/// them abort the whole list.
#[derive(Debug, Error)]
pub enum TokenError {
    /// A character outside the address set ended a token.
    #[error("Illegal terminator {terminator:?}; name {token:?} ignored")]
    IllegalTerminator { token: String, terminator: char },

    /// A `name:` entry appeared inside a file already being read.
    #[error("Nested name files not allowed")]
    NestedNameFile { name: String },

    /// The file named by a `name:` entry could not be opened.
    #[error("Couldn't open {name}")]
    NameFileUnreadable {
        name: String,
        source: std::io::Error,
    },
}

/// One position in the resolved list, in input order.
#[derive(Debug)]
pub enum Recipient {
    Resolved(Address),
    Rejected(TokenError),
}

/// Resolve a recipient list into classified addresses.
///
/// Only a failure to read the user database itself is an `Err`; everything
/// token-shaped comes back inside the `Vec` so the caller can report
/// inline, in order.
pub fn resolve_list(list: &str, db: &UserDb) -> Result<Vec<Recipient>, DirectoryError> {
    let mut out = Vec::new();
    scan(list, false, db, &mut out)?;
    Ok(out)
}

fn scan(
    input: &str,
    from_file: bool,
    db: &UserDb,
    out: &mut Vec<Recipient>,
) -> Result<(), DirectoryError> {
    let mut token = String::new();
    let mut chars = input.chars();

    loop {
        let c = chars.next();
        match c {
            Some(c) if is_address_char(c) => token.push(c),

            Some(':') => {
                let name = std::mem::take(&mut token);
                if from_file {
                    out.push(Recipient::Rejected(TokenError::NestedNameFile { name }));
                    return Ok(());
                }
                match fs::read_to_string(&name) {
                    Ok(contents) => scan(&contents, true, db, out)?,
                    Err(source) => {
                        out.push(Recipient::Rejected(TokenError::NameFileUnreadable {
                            name,
                            source,
                        }));
                    }
                }
            }

            Some(',') | Some(' ') | Some('\n') | Some('\r') | None => {
                if !token.is_empty() {
                    let address = classify(std::mem::take(&mut token), db)?;
                    out.push(Recipient::Resolved(address));
                }
                if c.is_none() {
                    return Ok(());
                }
            }

            Some(other) => {
                out.push(Recipient::Rejected(TokenError::IllegalTerminator {
                    token: std::mem::take(&mut token),
                    terminator: other,
                }));
            }
        }
    }
}

/// Classify one non-empty token: `user@host` first, then the directory,
/// then `Unknown`.
fn classify(token: String, db: &UserDb) -> Result<Address, DirectoryError> {
    if let Some(at) = token.find('@') {
        let (user, host) = (&token[..at], &token[at + 1..]);
        if !user.is_empty() && !host.is_empty() {
            return Ok(Address::Network {
                user: user.to_string(),
                host: host.to_string(),
            });
        }
    }

    match db.lookup_name(&token)? {
        Some(entry) => Ok(Address::Local {
            mailbox: entry.mailbox_path(),
            uid: entry.uid,
            user: token,
        }),
        None => Ok(Address::Unknown { token }),
    }
}

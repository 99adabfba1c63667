//! User directory lookup over a passwd-format database
//!
//! Every lookup scans the whole database file; there is no cache and no
//! state between calls. Malformed lines are skipped, not errors.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::trace;

/// Mailbox file name inside a user's home directory.
pub const MAILBOX_FILE: &str = "mailbox";

/// Errors raised while reading the user database
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The database file could not be read
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One user database entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
}

impl UserEntry {
    /// The user's mailbox file.
    pub fn mailbox_path(&self) -> PathBuf {
        self.home.join(MAILBOX_FILE)
    }
}

/// Handle on a passwd-format user database file
#[derive(Debug, Clone)]
pub struct UserDb {
    path: PathBuf,
}

impl UserDb {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find a user by exact name match.
    pub fn lookup_name(&self, name: &str) -> Result<Option<UserEntry>, DirectoryError> {
        self.scan(|entry| entry.name == name)
    }

    /// Find a user by numeric identity.
    pub fn lookup_uid(&self, uid: u32) -> Result<Option<UserEntry>, DirectoryError> {
        self.scan(|entry| entry.uid == uid)
    }

    fn scan(
        &self,
        matches: impl Fn(&UserEntry) -> bool,
    ) -> Result<Option<UserEntry>, DirectoryError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| DirectoryError::Io {
            path: self.path.clone(),
            source,
        })?;

        for line in contents.lines() {
            let Some(entry) = parse_entry(line) else {
                trace!("skipping malformed user database line");
                continue;
            };
            if matches(&entry) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}

/// Parse one `name:pw:uid:gid:gecos:home:shell` line; `None` when malformed.
fn parse_entry(line: &str) -> Option<UserEntry> {
    let mut fields = line.splitn(7, ':');
    let name = fields.next()?;
    let _password = fields.next()?;
    let uid = fields.next()?.parse().ok()?;
    let gid = fields.next()?.parse().ok()?;
    let _gecos = fields.next()?;
    let home = fields.next()?;

    if name.is_empty() || home.is_empty() {
        return None;
    }

    Some(UserEntry {
        name: name.to_string(),
        uid,
        gid,
        home: PathBuf::from(home),
    })
}

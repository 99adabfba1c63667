//! Session state for one invocation
//!
//! Everything the delivery loop mutates lives here and is threaded through
//! calls explicitly; there is no process-global state.

use crate::directory::{DirectoryError, UserDb};
use std::path::PathBuf;
use thiserror::Error;

/// Failure to establish who is sending
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// The invoking user has no entry in the user database
    #[error("Your user id is not in the user database")]
    UnknownSender,
}

/// The invoking user.
#[derive(Debug, Clone)]
pub struct Sender {
    pub name: String,
    pub uid: u32,
    /// Return mailbox written into spool entry headers; `None` when the
    /// sender has no local mailbox.
    pub mailbox: Option<PathBuf>,
}

impl Sender {
    /// Resolve the invoking user from their real identity.
    pub fn current(db: &UserDb) -> Result<Self, IdentityError> {
        #[cfg(unix)]
        let entry = db.lookup_uid(unsafe { libc::getuid() })?;

        #[cfg(not(unix))]
        let entry = match std::env::var("USERNAME") {
            Ok(name) => db.lookup_name(&name)?,
            Err(_) => None,
        };

        match entry {
            Some(entry) => Ok(Self {
                uid: entry.uid,
                mailbox: Some(entry.mailbox_path()),
                name: entry.name,
            }),
            None => Err(IdentityError::UnknownSender),
        }
    }
}

/// One invocation's worth of state.
#[derive(Debug)]
pub struct Session {
    pub sender: Sender,
    pub to: String,
    pub cc: String,
    pub subject: String,
    /// Addresses that could not be delivered; non-zero triggers the
    /// unsent-mail fallback copy.
    pub undelivered: u32,
    /// Entries queued in the outbound spool this session.
    pub queued_net: u32,
}

impl Session {
    pub fn new(sender: Sender) -> Self {
        Self {
            sender,
            to: String::new(),
            cc: String::new(),
            subject: String::new(),
            undelivered: 0,
            queued_net: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    #[cfg(unix)]
    fn test_current_sender_resolves_by_uid() {
        let temp_dir = TempDir::new().unwrap();
        let uid = unsafe { libc::getuid() };
        let path = temp_dir.path().join("passwd");
        fs::write(
            &path,
            format!("me:x:{uid}:100:Current User:/home/me:/bin/sh\n"),
        )
        .unwrap();

        let sender = Sender::current(&UserDb::new(path)).unwrap();
        assert_eq!(sender.name, "me");
        assert_eq!(sender.uid, uid);
        assert_eq!(sender.mailbox, Some(PathBuf::from("/home/me/mailbox")));
    }

    #[test]
    #[cfg(unix)]
    fn test_current_sender_missing_entry() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("passwd");
        fs::write(&path, "somebodyelse:x:4242424:100:X:/home/x:/bin/sh\n").unwrap();

        let result = Sender::current(&UserDb::new(path));
        assert!(matches!(result, Err(IdentityError::UnknownSender)));
    }

    #[test]
    fn test_new_session_counters_start_at_zero() {
        let session = Session::new(Sender {
            name: "alice".to_string(),
            uid: 1000,
            mailbox: None,
        });
        assert_eq!(session.undelivered, 0);
        assert_eq!(session.queued_net, 0);
        assert!(session.to.is_empty());
    }
}

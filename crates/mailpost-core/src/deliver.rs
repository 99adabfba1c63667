//! Delivery engine
//!
//! Iterates resolved addresses strictly in order: local addresses get the
//! stored message appended to their mailbox file, network addresses get an
//! entry queued in the outbound spool for the transport daemon. Per-address
//! failures are outcomes, not errors; the loop over remaining recipients
//! always continues.

use crate::address::Address;
use crate::config::Config;
use crate::session::{Sender, Session};
use crate::store::MessageStore;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fallback file left in the sender's working directory when any address
/// was undeliverable.
pub const FALLBACK_FILE: &str = "unsent.mail";

/// Spool entry names have this fixed width: the sender name truncated or
/// zero-padded, with the last character as the collision-avoidance suffix.
const SPOOL_NAME_WIDTH: usize = 14;

/// Copy unit for mailbox and spool writes.
const COPY_CHUNK: usize = 512;

/// Per-address delivery result.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// Appended to a local mailbox.
    Delivered,
    /// Queued in the outbound spool for the transport daemon.
    Queued { spool_path: PathBuf },
    /// Counted against the session's undelivered total.
    Undeliverable(UndeliverableReason),
}

/// Why an address could not be delivered. The `Display` text is what the
/// sender sees, one line per address.
#[derive(Debug, Error)]
pub enum UndeliverableReason {
    #[error("Not a known user")]
    UnknownUser,

    #[error("Mailbox is busy")]
    MailboxBusy,

    #[error("Host {host} is unknown")]
    UnknownHost { host: String },

    #[error("Too many messages awaiting transmission")]
    SpoolExhausted,

    #[error("Unable to deliver to {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Deliver one resolved address, updating the session counters.
pub fn deliver(
    session: &mut Session,
    store: &mut MessageStore,
    address: &Address,
    config: &Config,
) -> DeliveryOutcome {
    let outcome = match address {
        Address::Local { mailbox, uid, .. } => mailbox_append(store, mailbox, *uid),
        Address::Network { user, host } => {
            spool_enqueue(store, &session.sender, user, host, config)
        }
        Address::Unknown { .. } => {
            DeliveryOutcome::Undeliverable(UndeliverableReason::UnknownUser)
        }
    };

    match &outcome {
        DeliveryOutcome::Delivered => {}
        DeliveryOutcome::Queued { .. } => session.queued_net += 1,
        DeliveryOutcome::Undeliverable(_) => session.undelivered += 1,
    }
    outcome
}

/// Append the stored message to a local mailbox, creating it if absent.
///
/// A link count above one means another process may be working on the
/// file; the append is skipped without touching it. This is a convention,
/// not a lock — a concurrent writer can still begin after the check
/// passes, and callers are expected to retry later.
fn mailbox_append(store: &mut MessageStore, mailbox: &Path, uid: u32) -> DeliveryOutcome {
    let io_err = |source| {
        DeliveryOutcome::Undeliverable(UndeliverableReason::Io {
            path: mailbox.to_path_buf(),
            source,
        })
    };

    let mut file = match fs::symlink_metadata(mailbox) {
        Err(e) if e.kind() == ErrorKind::NotFound => {
            match OpenOptions::new().write(true).create_new(true).open(mailbox) {
                Ok(file) => file,
                Err(e) => return io_err(e),
            }
        }
        Err(e) => return io_err(e),
        Ok(meta) => {
            if link_count(&meta) > 1 {
                return DeliveryOutcome::Undeliverable(UndeliverableReason::MailboxBusy);
            }
            match OpenOptions::new().append(true).open(mailbox) {
                Ok(file) => file,
                Err(e) => return io_err(e),
            }
        }
    };

    if let Err(e) = copy_message(store, &mut file) {
        return io_err(e);
    }
    drop(file);

    set_owner(mailbox, uid);
    DeliveryOutcome::Delivered
}

/// Queue the stored message in the outbound spool.
///
/// The host must have a directory under the net root; the entry name is
/// the padded sender stem plus the first free letter suffix. Running out
/// of letters is its own failure, distinct from any I/O error.
fn spool_enqueue(
    store: &mut MessageStore,
    sender: &Sender,
    user: &str,
    host: &str,
    config: &Config,
) -> DeliveryOutcome {
    if !config.paths.net_root.join(host).exists() {
        return DeliveryOutcome::Undeliverable(UndeliverableReason::UnknownHost {
            host: host.to_string(),
        });
    }

    let spool_dir = &config.paths.spool_dir;
    if let Err(source) = fs::create_dir_all(spool_dir) {
        return DeliveryOutcome::Undeliverable(UndeliverableReason::Io {
            path: spool_dir.clone(),
            source,
        });
    }

    let stem = spool_stem(&sender.name);
    for letter in b'a'..=b'z' {
        let path = spool_dir.join(format!("{stem}{}", letter as char));
        match create_spool_entry(&path) {
            Ok(Some(file)) => return write_spool_entry(store, sender, user, host, file, path),
            Ok(None) => continue,
            Err(source) => {
                return DeliveryOutcome::Undeliverable(UndeliverableReason::Io { path, source });
            }
        }
    }

    DeliveryOutcome::Undeliverable(UndeliverableReason::SpoolExhausted)
}

/// Sender name truncated or zero-padded so every entry name has the same
/// width before its suffix letter.
fn spool_stem(sender: &str) -> String {
    let mut stem: String = sender.chars().take(SPOOL_NAME_WIDTH - 1).collect();
    while stem.len() < SPOOL_NAME_WIDTH - 1 {
        stem.push('0');
    }
    stem
}

/// Create a candidate entry; `None` when the name is already taken.
fn create_spool_entry(path: &Path) -> std::io::Result<Option<File>> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o444);
    }

    match options.open(path) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(e),
    }
}

fn write_spool_entry(
    store: &mut MessageStore,
    sender: &Sender,
    user: &str,
    host: &str,
    mut file: File,
    path: PathBuf,
) -> DeliveryOutcome {
    let return_mailbox = sender
        .mailbox
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let header = format!("{host}:{user}:{return_mailbox}:\n");

    let result = file
        .write_all(header.as_bytes())
        .and_then(|_| copy_message(store, &mut file));
    if let Err(source) = result {
        // A half-written entry must not be left for the daemon
        let _ = fs::remove_file(&path);
        return DeliveryOutcome::Undeliverable(UndeliverableReason::Io { path, source });
    }
    drop(file);

    set_owner(&path, sender.uid);
    DeliveryOutcome::Queued { spool_path: path }
}

/// Leave a copy of the stored message in `dir`, owned by the sender.
pub fn write_fallback(
    store: &mut MessageStore,
    dir: &Path,
    uid: u32,
) -> std::io::Result<PathBuf> {
    let path = dir.join(FALLBACK_FILE);
    let mut file = File::create(&path)?;
    copy_message(store, &mut file)?;
    drop(file);

    set_owner(&path, uid);
    Ok(path)
}

/// Copy the rewound store contents into `dest` in fixed-size chunks.
fn copy_message(store: &mut MessageStore, dest: &mut File) -> std::io::Result<()> {
    let reader = store.reader()?;
    let mut buf = [0u8; COPY_CHUNK];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        dest.write_all(&buf[..n])?;
    }
    Ok(())
}

#[cfg(unix)]
fn link_count(meta: &fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.nlink()
}

#[cfg(not(unix))]
fn link_count(_meta: &fs::Metadata) -> u64 {
    1
}

/// Assign ownership. The write itself has already succeeded, so a refused
/// chown (non-root sender, foreign uid) is logged rather than reported as
/// undeliverable.
#[cfg(unix)]
fn set_owner(path: &Path, uid: u32) {
    if let Err(e) = std::os::unix::fs::chown(path, Some(uid), None) {
        tracing::warn!("failed to set owner {uid} on {path:?}: {e}");
    }
}

#[cfg(not(unix))]
fn set_owner(_path: &Path, _uid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Message;
    use tempfile::TempDir;

    fn test_store(dir: &Path) -> MessageStore {
        let message = Message {
            date: "09 Jan 1976 at 1423-PST".to_string(),
            sender: "alice".to_string(),
            origin: "lab11".to_string(),
            subject: String::new(),
            to: "bob".to_string(),
            cc: String::new(),
            body: "hello\n".to_string(),
        };
        MessageStore::create_in(dir, &message).unwrap()
    }

    #[test]
    fn test_spool_stem_pads_and_truncates() {
        assert_eq!(spool_stem("alice"), "alice00000000");
        assert_eq!(spool_stem("alongusername"), "alongusername");
        assert_eq!(spool_stem("averylongusername"), "averylongusern");
        assert_eq!(spool_stem("averylongusername").len(), SPOOL_NAME_WIDTH - 1);
    }

    #[test]
    fn test_mailbox_created_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = test_store(temp_dir.path());
        let mailbox = temp_dir.path().join("mailbox");

        let outcome = mailbox_append(&mut store, &mailbox, current_uid());
        assert!(matches!(outcome, DeliveryOutcome::Delivered));

        let contents = fs::read_to_string(&mailbox).unwrap();
        assert!(contents.starts_with("Date: "));
        assert!(contents.contains("hello\n"));
    }

    #[test]
    fn test_second_append_concatenates() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = test_store(temp_dir.path());
        let mailbox = temp_dir.path().join("mailbox");

        mailbox_append(&mut store, &mailbox, current_uid());
        let one = fs::read_to_string(&mailbox).unwrap();

        mailbox_append(&mut store, &mailbox, current_uid());
        let two = fs::read_to_string(&mailbox).unwrap();

        assert_eq!(two, format!("{one}{one}"));
    }

    #[test]
    #[cfg(unix)]
    fn test_busy_mailbox_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = test_store(temp_dir.path());
        let mailbox = temp_dir.path().join("mailbox");
        fs::write(&mailbox, "existing contents").unwrap();
        fs::hard_link(&mailbox, temp_dir.path().join("claimed")).unwrap();

        let outcome = mailbox_append(&mut store, &mailbox, current_uid());
        assert!(matches!(
            outcome,
            DeliveryOutcome::Undeliverable(UndeliverableReason::MailboxBusy)
        ));
        assert_eq!(fs::read_to_string(&mailbox).unwrap(), "existing contents");
    }

    #[test]
    fn test_unknown_host_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = test_store(temp_dir.path());
        let mut config = Config::default();
        config.paths.net_root = temp_dir.path().join("net");
        config.paths.spool_dir = temp_dir.path().join("spool");
        fs::create_dir_all(&config.paths.net_root).unwrap();

        let sender = test_sender(temp_dir.path());
        let outcome = spool_enqueue(&mut store, &sender, "carol", "example.net", &config);
        assert!(matches!(
            outcome,
            DeliveryOutcome::Undeliverable(UndeliverableReason::UnknownHost { .. })
        ));
        assert!(!config.paths.spool_dir.exists() || dir_is_empty(&config.paths.spool_dir));
    }

    #[test]
    fn test_spool_entry_format() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = test_store(temp_dir.path());
        let mut config = Config::default();
        config.paths.net_root = temp_dir.path().join("net");
        config.paths.spool_dir = temp_dir.path().join("spool");
        fs::create_dir_all(config.paths.net_root.join("example.net")).unwrap();

        let sender = test_sender(temp_dir.path());
        let outcome = spool_enqueue(&mut store, &sender, "carol", "example.net", &config);
        let DeliveryOutcome::Queued { spool_path } = outcome else {
            panic!("expected a queued outcome, got {outcome:?}");
        };

        assert_eq!(
            spool_path.file_name().unwrap().to_str().unwrap(),
            "alice00000000a"
        );
        let contents = fs::read_to_string(&spool_path).unwrap();
        let first_line = contents.lines().next().unwrap();
        assert_eq!(
            first_line,
            format!(
                "example.net:carol:{}:",
                temp_dir.path().join("alice-mailbox").display()
            )
        );
        assert!(contents.contains("hello\n"));
    }

    #[test]
    fn test_fallback_copy() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = test_store(temp_dir.path());
        let cwd = temp_dir.path().join("work");
        fs::create_dir_all(&cwd).unwrap();

        let path = write_fallback(&mut store, &cwd, current_uid()).unwrap();
        assert_eq!(path, cwd.join(FALLBACK_FILE));

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("From: alice at lab11"));
        assert!(contents.contains("hello\n"));
    }

    fn test_sender(dir: &Path) -> Sender {
        Sender {
            name: "alice".to_string(),
            uid: current_uid(),
            mailbox: Some(dir.join("alice-mailbox")),
        }
    }

    fn dir_is_empty(dir: &Path) -> bool {
        fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(true)
    }

    #[cfg(unix)]
    fn current_uid() -> u32 {
        unsafe { libc::getuid() }
    }

    #[cfg(not(unix))]
    fn current_uid() -> u32 {
        0
    }
}

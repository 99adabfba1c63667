//! Durable message store
//!
//! A composed message is written once, header block plus body, to a
//! uniquely named file, then reopened for reading. Every delivery attempt
//! rewinds the handle and gets a full, independent read of the same bytes.
//! The file is unlinked when the store is dropped, whatever the delivery
//! outcome was.

use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Line separating the header block from the body, and closing the block.
pub const BLOCK_DELIMITER: &str = "-----";

const STORE_PREFIX: &str = "mail";

/// Message store error
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A composed message plus its generated header fields. Immutable once
/// handed to [`MessageStore::create`].
#[derive(Debug, Clone)]
pub struct Message {
    pub date: String,
    pub sender: String,
    pub origin: String,
    pub subject: String,
    pub to: String,
    pub cc: String,
    pub body: String,
}

impl Message {
    /// Render the stored block: date, sender, optional subject, recipients,
    /// delimiter, body, trailing delimiter and blank line.
    fn render(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 256);
        out.push_str(&format!("Date: {}\n", self.date));
        out.push_str(&format!("From: {} at {}\n", self.sender, self.origin));
        if !self.subject.is_empty() {
            out.push_str(&format!("Subject: {}\n", self.subject));
        }
        out.push_str(&format!("To: {}\n", self.to));
        if !self.cc.is_empty() {
            out.push_str(&format!("CC: {}\n", self.cc));
        }
        out.push_str(BLOCK_DELIMITER);
        out.push('\n');
        out.push_str(&self.body);
        if !self.body.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(BLOCK_DELIMITER);
        out.push_str("\n\n");
        out
    }
}

/// The on-disk representation of one composed message.
pub struct MessageStore {
    path: PathBuf,
    file: File,
}

impl MessageStore {
    /// Create the store file in the system temp directory.
    pub fn create(message: &Message) -> Result<Self, StoreError> {
        Self::create_in(&std::env::temp_dir(), message)
    }

    /// Create the store file in `dir`, named from a fixed prefix and the
    /// process identity.
    pub fn create_in(dir: &Path, message: &Message) -> Result<Self, StoreError> {
        let path = dir.join(format!("{STORE_PREFIX}{}", std::process::id()));
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        let mut file = File::create(&path).map_err(io_err)?;
        file.write_all(message.render().as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        let file = File::open(&path).map_err(io_err)?;
        Ok(Self { path, file })
    }

    /// Rewind and hand out the readable file. Callers copy the whole
    /// contents; the next caller starts from the beginning again.
    pub fn reader(&mut self) -> std::io::Result<&mut File> {
        self.file.seek(SeekFrom::Start(0))?;
        Ok(&mut self.file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MessageStore {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Origin host for the `From:` line.
pub fn origin_host() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

//! Core library for mailpost — local message composition and delivery.
//!
//! This crate holds everything that does not touch a terminal: the user
//! directory, recipient classification, the on-disk message store, and the
//! delivery engine that appends to local mailboxes or queues entries in the
//! outbound spool for the transport daemon.
//!
//! The interactive composer and prompts live in the `mailpost` binary crate.

pub mod address;
pub mod config;
pub mod date;
pub mod deliver;
pub mod directory;
pub mod logging;
pub mod resolve;
pub mod session;
pub mod store;

pub use address::Address;
pub use config::{Config, resolve_config};
pub use deliver::{DeliveryOutcome, UndeliverableReason, deliver, write_fallback};
pub use directory::{UserDb, UserEntry};
pub use resolve::{Recipient, TokenError, resolve_list};
pub use session::{Sender, Session};
pub use store::{Message, MessageStore};

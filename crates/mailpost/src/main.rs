//! mailpost - compose and deliver mail to local and network users
//!
//! Prompts for recipients, cc, and subject, runs a raw-mode composer, then
//! appends the message to local mailboxes or queues spool entries for the
//! network transport daemon.

use clap::Parser;
use std::path::PathBuf;

mod compose;
mod prompt;
mod run;

/// Compose and deliver mail to local and network users.
#[derive(Parser, Debug)]
#[command(
    name = "mailpost",
    version,
    about = "Compose and deliver mail to local and network users",
    long_about = "An interactive mail agent: composes a message through a raw-mode \
                  line editor, then delivers it to local mailbox files or queues it \
                  in the outbound spool for the network transport daemon."
)]
pub struct Cli {
    /// Initial recipients; prompted for when omitted
    pub recipients: Vec<String>,

    /// Config file to use instead of the global one
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Translate literal-escaped input for a half-duplex terminal
    #[arg(long)]
    pub half_duplex: bool,
}

fn main() {
    mailpost_core::logging::init();
    let cli = Cli::parse();

    if let Err(e) = run::execute(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

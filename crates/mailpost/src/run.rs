//! Top-level session control flow
//!
//! Prompt for the destination lists and subject, compose, persist the
//! message, then deliver to every resolved address in order, reporting one
//! line per recipient as the loop progresses.

use anyhow::{Context, Result, bail};
use mailpost_core::config::resolve_config;
use mailpost_core::date::send_date;
use mailpost_core::deliver::{DeliveryOutcome, FALLBACK_FILE, deliver, write_fallback};
use mailpost_core::directory::UserDb;
use mailpost_core::resolve::{Recipient, TokenError, resolve_list};
use mailpost_core::session::{Sender, Session};
use mailpost_core::store::{Message, MessageStore, origin_host};
use std::io::Write;
use std::process::Command;
use tracing::debug;

use crate::Cli;
use crate::compose::{ComposeOutcome, compose_interactive};
use crate::prompt::gather;

pub fn execute(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref()).context("cannot resolve configuration")?;
    debug!(
        "user db {:?}, spool {:?}",
        config.paths.user_db, config.paths.spool_dir
    );

    let db = UserDb::new(&config.paths.user_db);
    let sender = Sender::current(&db)?;
    let mut session = Session::new(sender);

    session.to = if cli.recipients.is_empty() {
        gather("To: ")?
    } else {
        cli.recipients.join(",")
    };
    if session.to.trim().is_empty() {
        bail!("No destination?");
    }
    session.cc = gather("cc: ")?;
    session.subject = gather("Subject: ")?;

    println!("Type letter:");
    println!("-----");
    let body = match compose_interactive(cli.half_duplex)? {
        ComposeOutcome::Body(body) => body,
        ComposeOutcome::Aborted => return Ok(()),
    };

    let message = Message {
        date: send_date(),
        sender: session.sender.name.clone(),
        origin: origin_host(),
        subject: session.subject.clone(),
        to: session.to.clone(),
        cc: session.cc.clone(),
        body,
    };
    let mut store = MessageStore::create(&message).context("Unable to create temp file")?;

    let to_list = session.to.clone();
    let cc_list = session.cc.clone();
    for list in [&to_list, &cc_list] {
        deliver_to_list(&mut session, &mut store, list, &db, &config)?;
    }

    if session.undelivered > 0 {
        let cwd = std::env::current_dir().context("cannot determine working directory")?;
        write_fallback(&mut store, &cwd, session.sender.uid)
            .with_context(|| format!("unable to create {FALLBACK_FILE}"))?;
        println!("A copy of this letter has been left in '{FALLBACK_FILE}'");
    }

    // Unlinks the stored message whatever the delivery outcome was
    drop(store);

    if session.queued_net > 0 {
        let answer = gather("Send network mail now? ")?;
        if answer.trim_start().starts_with('y') {
            let status = Command::new(&config.paths.mail_daemon)
                .status()
                .with_context(|| format!("failed to run {:?}", config.paths.mail_daemon))?;
            if !status.success() {
                bail!("mail daemon exited with {status}");
            }
        }
    }

    Ok(())
}

/// Resolve one recipient list and deliver to each address in order,
/// reporting inline.
fn deliver_to_list(
    session: &mut Session,
    store: &mut MessageStore,
    list: &str,
    db: &UserDb,
    config: &mailpost_core::Config,
) -> Result<()> {
    for recipient in resolve_list(list, db).context("cannot read user database")? {
        match recipient {
            Recipient::Rejected(e) => {
                println!("{e}");
                if matches!(e, TokenError::NameFileUnreadable { .. }) {
                    session.undelivered += 1;
                }
            }
            Recipient::Resolved(address) => {
                print!("{}...", address.label());
                std::io::stdout().flush()?;
                match deliver(session, store, &address, config) {
                    DeliveryOutcome::Delivered => println!("ok"),
                    DeliveryOutcome::Queued { .. } => println!("Queued for transmission"),
                    DeliveryOutcome::Undeliverable(reason) => println!("{reason}"),
                }
            }
        }
    }
    Ok(())
}

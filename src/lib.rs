//! Gmail change-feed tail and message review library
//!
//! Follows a mailbox through the Gmail REST API: [`Feed`] polls the
//! change history and fetches new messages concurrently while keeping
//! their order, and [`Viewer`] drives an interactive, keyboard-controlled
//! review of a message list. Signatures are checked by running an external
//! gpg-compatible program through [`Verifier`].
//!
//! ```no_run
//! use mailtail::{Feed, GmailClient, SessionConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> mailtail::Result<()> {
//! let client = GmailClient::new(SessionConfig::load(None)?)?;
//! let feed = Feed::new(Arc::new(client));
//! let cursor = feed.start_cursor().await?;
//! feed.poll_cycle(cursor, |m| println!("{}", mailtail::feed_line(m)))
//!     .await;
//! # Ok(())
//! # }
//! ```

mod client;
mod compose;
mod config;
mod error;
mod feed;
mod label;
mod message;
mod render;
mod review;
#[cfg(test)]
mod testing;
mod tui;
mod verify;

pub use client::{GmailClient, MailService};
pub use compose::{ComposeKind, Composer, EditorComposer, template};
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use feed::{Feed, PAGE_SIZE};
pub use label::{Label, LabelTable, SystemLabel};
pub use message::{
    ChangeRecord, Cursor, Header, HistoryPage, Message, MessageRef, Part, PartBody, Profile,
};
pub use render::{
    HEADER_LINES, MessageView, clamp_scroll, feed_line, max_scroll, message_view, wrap_body,
};
pub use review::{
    Action, Exit, HELP, Key, ReviewState, Status, StatusKind, Terminal, Viewer, spawn_mark_read,
};
pub use tui::CrosstermTerminal;
pub use verify::{VerificationOutcome, Verdict, Verifier, classify};

//! Fake Gmail REST server for integration testing
//!
//! Serves a fixed mailbox over HTTP with `wiremock`, enough of the API
//! to exercise `GmailClient`, `Feed` and the `mailtail` binary:
//!
//! - `mailbox` -- test data model (messages, labels, history pages)
//! - `server` -- mounts one mock per endpoint and inspects requests

pub mod mailbox;
mod server;

pub use mailbox::MailboxBuilder;
pub use server::FakeGmailServer;

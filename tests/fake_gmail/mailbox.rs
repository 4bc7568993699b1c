//! Test data model for the fake Gmail server
//!
//! ```ignore
//! let mailbox = MailboxBuilder::new()
//!     .history_id(1000)
//!     .label("Label_1", "work")
//!     .message("m1", "alice@example.com", "Hello", "Hi there.")
//!     .page(None, &[&["m1"]], None, 1001)
//!     .build();
//! ```

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TestMessage {
    pub id: String,
    pub from: String,
    pub subject: String,
    pub body: String,
    pub labels: Vec<String>,
    /// Response delay for `messages.get`.
    pub delay: Option<Duration>,
}

impl TestMessage {
    pub fn thread_id(&self) -> String {
        format!("thread-{}", self.id)
    }

    /// The message as `messages.get?format=full` returns it.
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "threadId": self.thread_id(),
            "labelIds": self.labels,
            "snippet": self.body.lines().next().unwrap_or_default(),
            "historyId": "1",
            "payload": {
                "mimeType": "multipart/alternative",
                "headers": [
                    { "name": "From", "value": self.from },
                    { "name": "To", "value": "me@example.com" },
                    { "name": "Subject", "value": self.subject },
                    { "name": "Date", "value": "Mon, 01 Jan 2024 12:00:00 +0000" },
                    { "name": "Message-ID", "value": format!("<{}@fake.test>", self.id) },
                ],
                "body": { "size": 0 },
                "parts": [
                    {
                        "mimeType": "text/html",
                        "headers": [],
                        "body": { "data": URL_SAFE_NO_PAD.encode(format!("<p>{}</p>", self.body)) },
                    },
                    {
                        "mimeType": "text/plain",
                        "headers": [],
                        "body": { "data": URL_SAFE_NO_PAD.encode(&self.body) },
                    },
                ],
            },
        })
    }
}

/// One page of `history.list`.
#[derive(Debug, Clone)]
pub struct HistoryPage {
    /// `pageToken` this page answers; `None` for the first page.
    pub token: Option<String>,
    /// Message ids added per change record.
    pub records: Vec<Vec<String>>,
    pub next: Option<String>,
    pub history_id: u64,
}

impl HistoryPage {
    pub fn to_json(&self) -> Value {
        let history: Vec<Value> = self
            .records
            .iter()
            .enumerate()
            .map(|(n, ids)| {
                let added: Vec<Value> = ids
                    .iter()
                    .map(|id| {
                        json!({
                            "message": { "id": id, "threadId": format!("thread-{id}") }
                        })
                    })
                    .collect();
                json!({
                    "id": (self.history_id - n as u64).to_string(),
                    "messagesAdded": added,
                })
            })
            .collect();

        let mut page = json!({
            "history": history,
            "historyId": self.history_id.to_string(),
        });
        if let Some(next) = &self.next {
            page["nextPageToken"] = json!(next);
        }
        page
    }
}

#[derive(Debug, Clone)]
pub struct Mailbox {
    pub history_id: u64,
    pub labels: Vec<(String, String)>,
    pub messages: Vec<TestMessage>,
    pub pages: Vec<HistoryPage>,
}

pub struct MailboxBuilder {
    mailbox: Mailbox,
}

impl MailboxBuilder {
    pub fn new() -> Self {
        Self {
            mailbox: Mailbox {
                history_id: 1,
                labels: vec![
                    ("INBOX".into(), "INBOX".into()),
                    ("UNREAD".into(), "UNREAD".into()),
                ],
                messages: Vec::new(),
                pages: Vec::new(),
            },
        }
    }

    /// Current history id reported by the profile.
    pub const fn history_id(mut self, id: u64) -> Self {
        self.mailbox.history_id = id;
        self
    }

    pub fn label(mut self, id: &str, name: &str) -> Self {
        self.mailbox.labels.push((id.into(), name.into()));
        self
    }

    /// Add an unread inbox message.
    pub fn message(mut self, id: &str, from: &str, subject: &str, body: &str) -> Self {
        self.mailbox.messages.push(TestMessage {
            id: id.into(),
            from: from.into(),
            subject: subject.into(),
            body: body.into(),
            labels: vec!["INBOX".into(), "UNREAD".into()],
            delay: None,
        });
        self
    }

    /// Delay the response for the most recently added message.
    pub fn delayed(mut self, delay: Duration) -> Self {
        if let Some(last) = self.mailbox.messages.last_mut() {
            last.delay = Some(delay);
        }
        self
    }

    pub fn page(
        mut self,
        token: Option<&str>,
        records: &[&[&str]],
        next: Option<&str>,
        history_id: u64,
    ) -> Self {
        self.mailbox.pages.push(HistoryPage {
            token: token.map(str::to_string),
            records: records
                .iter()
                .map(|ids| ids.iter().map(|id| (*id).to_string()).collect())
                .collect(),
            next: next.map(str::to_string),
            history_id,
        });
        self
    }

    pub fn build(self) -> Mailbox {
        self.mailbox
    }
}

//! In-memory [`MailService`] for unit tests.

use crate::client::MailService;
use crate::error::{Error, Result};
use crate::label::Label;
use crate::message::{ChangeRecord, Cursor, Header, HistoryPage, Message, MessageRef, Part, Profile};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

type PageKey = Option<String>;

/// A recorded `modify-message` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modify {
    pub id: String,
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

#[derive(Default)]
pub struct FakeService {
    messages: HashMap<String, Message>,
    delays: HashMap<String, Duration>,
    pages: HashMap<PageKey, HistoryPage>,
    history_failures: Mutex<HashMap<PageKey, usize>>,
    history_calls: Mutex<Vec<(Cursor, PageKey)>>,
    history_times: Mutex<Vec<Instant>>,
    profile_cursor: Cursor,
    fail_modify: bool,
    modify_delay: Option<Duration>,
    fail_send: bool,
    modifies: Mutex<Vec<Modify>>,
    sent: Mutex<Vec<(String, String)>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A message in INBOX, unread, whose body is `Body of <id>`.
    pub fn message(id: &str, subject: &str) -> Message {
        let headers = [
            ("From", format!("sender-{id}@example.com")),
            ("To", "me@example.com".to_string()),
            ("Subject", subject.to_string()),
            ("Date", "Mon, 01 Jan 2024 12:00:00 +0000".to_string()),
        ]
        .into_iter()
        .map(|(name, value)| Header {
            name: name.to_string(),
            value,
        })
        .collect();
        Message {
            id: id.to_string(),
            thread_id: format!("thread-{id}"),
            label_ids: vec!["INBOX".into(), "UNREAD".into()],
            snippet: format!("Body of {id}"),
            payload: Some(Part {
                mime_type: "text/plain".into(),
                headers,
                body: None,
                parts: vec![],
            }),
        }
    }

    /// Like [`Self::message`] with `lines` numbered body lines.
    pub fn long_message(id: &str, lines: usize) -> Message {
        let mut m = Self::message(id, "long");
        m.snippet = (0..lines)
            .map(|n| format!("line {n}"))
            .collect::<Vec<_>>()
            .join("\n");
        m
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.insert(message.id.clone(), message);
        self
    }

    pub fn with_delay(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }

    /// Serve a history page for `token`; each inner slice is one change
    /// record listing the added message ids.
    pub fn with_page(
        mut self,
        token: Option<&str>,
        records: &[&[&str]],
        next: Option<&str>,
        history_id: Cursor,
    ) -> Self {
        let history = records
            .iter()
            .map(|ids| ChangeRecord {
                added: ids
                    .iter()
                    .map(|id| MessageRef {
                        id: (*id).to_string(),
                        thread_id: format!("thread-{id}"),
                    })
                    .collect(),
            })
            .collect();
        self.pages.insert(
            token.map(str::to_string),
            HistoryPage {
                history,
                next_page_token: next.map(str::to_string),
                history_id,
            },
        );
        self
    }

    /// Fail the next `times` listings of `token`.
    pub fn fail_history_times(self, token: Option<&str>, times: usize) -> Self {
        self.history_failures
            .lock()
            .unwrap()
            .insert(token.map(str::to_string), times);
        self
    }

    pub const fn with_profile_cursor(mut self, cursor: Cursor) -> Self {
        self.profile_cursor = cursor;
        self
    }

    pub const fn failing_modify(mut self) -> Self {
        self.fail_modify = true;
        self
    }

    /// Hold every `modify-message` call for `delay` before it is recorded.
    pub const fn with_modify_delay(mut self, delay: Duration) -> Self {
        self.modify_delay = Some(delay);
        self
    }

    pub const fn failing_send(mut self) -> Self {
        self.fail_send = true;
        self
    }

    pub fn history_calls(&self) -> Vec<(Cursor, PageKey)> {
        self.history_calls.lock().unwrap().clone()
    }

    /// When each history listing arrived, on the tokio clock.
    pub fn history_times(&self) -> Vec<Instant> {
        self.history_times.lock().unwrap().clone()
    }

    pub fn modifies(&self) -> Vec<Modify> {
        self.modifies.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailService for FakeService {
    async fn list_history(
        &self,
        cursor: Cursor,
        _page_size: u32,
        page_token: Option<&str>,
    ) -> Result<HistoryPage> {
        let key = page_token.map(str::to_string);
        self.history_calls.lock().unwrap().push((cursor, key.clone()));
        self.history_times.lock().unwrap().push(Instant::now());
        {
            let mut failures = self.history_failures.lock().unwrap();
            if let Some(left) = failures.get_mut(&key)
                && *left > 0
            {
                *left -= 1;
                return Err(Error::Api("503 Service Unavailable".into()));
            }
        }
        self.pages
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::Api(format!("no page for {key:?}")))
    }

    async fn get_message(&self, id: &str) -> Result<Message> {
        if let Some(delay) = self.delays.get(id) {
            tokio::time::sleep(*delay).await;
        }
        self.messages
            .get(id)
            .cloned()
            .ok_or_else(|| Error::Api(format!("404 message {id} not found")))
    }

    async fn get_profile(&self) -> Result<Profile> {
        Ok(Profile {
            email_address: "me@example.com".into(),
            history_id: self.profile_cursor,
        })
    }

    async fn modify_message(&self, id: &str, add: &[&str], remove: &[&str]) -> Result<()> {
        if let Some(delay) = self.modify_delay {
            tokio::time::sleep(delay).await;
        }
        self.modifies.lock().unwrap().push(Modify {
            id: id.to_string(),
            add: add.iter().map(ToString::to_string).collect(),
            remove: remove.iter().map(ToString::to_string).collect(),
        });
        if self.fail_modify {
            return Err(Error::Api("403 Forbidden".into()));
        }
        Ok(())
    }

    async fn send_message(&self, thread_id: &str, raw: &str) -> Result<()> {
        if self.fail_send {
            return Err(Error::Api("400 Bad Request".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((thread_id.to_string(), raw.to_string()));
        Ok(())
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        Ok(Vec::new())
    }

    async fn list_messages(&self, _label: &str, max: u32) -> Result<Vec<MessageRef>> {
        let mut ids: Vec<&String> = self.messages.keys().collect();
        ids.sort();
        Ok(ids
            .into_iter()
            .take(max as usize)
            .map(|id| MessageRef {
                id: id.clone(),
                thread_id: format!("thread-{id}"),
            })
            .collect())
    }
}

//! Mailbox data model
//!
//! Types mirror the JSON the REST API returns. History ids arrive as
//! decimal strings and are parsed into `u64` cursors.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer};

/// Position in the mailbox's change history.
pub type Cursor = u64;

/// Reference to a message from a change record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
}

/// Messages added at one step of the change history.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    #[serde(default, rename = "messagesAdded", deserialize_with = "added_refs")]
    pub added: Vec<MessageRef>,
}

/// One page of `list-changes`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    #[serde(default)]
    pub history: Vec<ChangeRecord>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(deserialize_with = "cursor_from_string")]
    pub history_id: Cursor,
}

impl HistoryPage {
    /// The continuation token, if there is another page.
    #[must_use]
    pub fn next_page(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub email_address: String,
    #[serde(deserialize_with = "cursor_from_string")]
    pub history_id: Cursor,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
}

/// A node of the MIME tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A fully fetched message.
///
/// Only the label set can change after fetching, and the remote side is
/// authoritative for it; the local copy is not refreshed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub payload: Option<Part>,
}

impl Message {
    /// Value of the first header called `name` (case-insensitive), or `""`.
    #[must_use]
    pub fn header(&self, name: &str) -> &str {
        self.payload
            .as_ref()
            .and_then(|p| p.headers.iter().find(|h| h.name.eq_ignore_ascii_case(name)))
            .map_or("", |h| h.value.as_str())
    }

    #[must_use]
    pub fn has_label(&self, id: &str) -> bool {
        self.label_ids.iter().any(|l| l == id)
    }

    /// The `Date` header, parsed.
    ///
    /// Trailing comments such as `(UTC)` are ignored.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.header("Date");
        let raw = raw.split_once('(').map_or(raw, |(before, _)| before).trim();
        DateTime::parse_from_rfc2822(raw).ok()
    }

    /// Plain-text body: the first `text/plain` part, else the snippet.
    #[must_use]
    pub fn body(&self) -> String {
        self.payload
            .as_ref()
            .and_then(find_plain)
            .and_then(decode_part)
            .unwrap_or_else(|| self.snippet.clone())
    }
}

fn find_plain(part: &Part) -> Option<&Part> {
    if part.mime_type.eq_ignore_ascii_case("text/plain")
        && part.body.as_ref().is_some_and(|b| b.data.is_some())
    {
        return Some(part);
    }
    part.parts.iter().find_map(find_plain)
}

fn decode_part(part: &Part) -> Option<String> {
    let data = part.body.as_ref()?.data.as_deref()?;
    match decode_base64url(data) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            tracing::warn!("Undecodable body part: {}", e);
            None
        }
    }
}

/// Decode base64url with or without padding.
pub(crate) fn decode_base64url(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(data.trim_end_matches('='))
}

fn cursor_from_string<'de, D>(deserializer: D) -> Result<Cursor, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        Raw::Number(n) => Ok(n),
    }
}

fn added_refs<'de, D>(deserializer: D) -> Result<Vec<MessageRef>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Added {
        message: MessageRef,
    }

    let added = Vec::<Added>::deserialize(deserializer)?;
    Ok(added.into_iter().map(|a| a.message).collect())
}

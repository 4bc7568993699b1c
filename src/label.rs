//! Mailbox labels
//!
//! Provides a strongly-typed enum for the labels the service defines
//! itself, and a read-only id <-> name table for rendering and for
//! choosing labels by name. User-created labels only have an opaque id,
//! so everything shown to the user goes through [`LabelTable`].

use crate::message::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A label managed by the service itself.
///
/// # Examples
///
/// ```
/// use mailtail::SystemLabel;
///
/// assert_eq!(SystemLabel::Inbox.as_id(), "INBOX");
/// assert_eq!(SystemLabel::from("Label_12"), SystemLabel::User("Label_12".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SystemLabel {
    /// Messages shown in the inbox; archiving removes it.
    Inbox,
    /// Messages not yet read.
    Unread,
    Starred,
    Important,
    Sent,
    Draft,
    Spam,
    Trash,
    /// A user-defined label, by id.
    User(String),
}

impl SystemLabel {
    /// The label id as used on the wire.
    #[must_use]
    pub fn as_id(&self) -> &str {
        match self {
            Self::Inbox => "INBOX",
            Self::Unread => "UNREAD",
            Self::Starred => "STARRED",
            Self::Important => "IMPORTANT",
            Self::Sent => "SENT",
            Self::Draft => "DRAFT",
            Self::Spam => "SPAM",
            Self::Trash => "TRASH",
            Self::User(id) => id,
        }
    }
}

impl fmt::Display for SystemLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_id())
    }
}

impl From<&str> for SystemLabel {
    fn from(s: &str) -> Self {
        match s {
            "INBOX" => Self::Inbox,
            "UNREAD" => Self::Unread,
            "STARRED" => Self::Starred,
            "IMPORTANT" => Self::Important,
            "SENT" => Self::Sent,
            "DRAFT" => Self::Draft,
            "SPAM" => Self::Spam,
            "TRASH" => Self::Trash,
            other => Self::User(other.to_string()),
        }
    }
}

/// A label as listed by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// Bidirectional id <-> name mapping, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    names: HashMap<String, String>,
    ids: HashMap<String, String>,
}

impl LabelTable {
    #[must_use]
    pub fn new(labels: impl IntoIterator<Item = Label>) -> Self {
        let mut table = Self::default();
        for label in labels {
            table.ids.insert(label.name.clone(), label.id.clone());
            table.names.insert(label.id, label.name);
        }
        table
    }

    /// Display name for `id`, or the id itself when it is unknown.
    #[must_use]
    pub fn name<'a>(&'a self, id: &'a str) -> &'a str {
        self.names.get(id).map_or(id, String::as_str)
    }

    #[must_use]
    pub fn id(&self, name: &str) -> Option<&str> {
        self.ids.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All labels, sorted by name.
    #[must_use]
    pub fn labels(&self) -> Vec<Label> {
        let mut labels: Vec<Label> = self
            .names
            .iter()
            .map(|(id, name)| Label {
                id: id.clone(),
                name: name.clone(),
            })
            .collect();
        labels.sort_by(|a, b| sort_key(&a.name).cmp(&sort_key(&b.name)));
        labels
    }

    /// Names of the labels `message` carries.
    #[must_use]
    pub fn applied(&self, message: &Message) -> Vec<String> {
        let mut names: Vec<String> = message
            .label_ids
            .iter()
            .map(|id| self.name(id).to_string())
            .collect();
        sort_names(&mut names);
        names
    }

    /// Names of the known labels `message` does not carry.
    #[must_use]
    pub fn not_applied(&self, message: &Message) -> Vec<String> {
        let mut names: Vec<String> = self
            .names
            .iter()
            .filter(|(id, _)| !message.has_label(id))
            .map(|(_, name)| name.clone())
            .collect();
        sort_names(&mut names);
        names
    }
}

fn sort_key(name: &str) -> (String, String) {
    (name.to_lowercase(), name.to_string())
}

pub(crate) fn sort_names(names: &mut [String]) {
    names.sort_by_cached_key(|n| sort_key(n));
}

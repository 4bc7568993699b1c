//! Reply and forward composition
//!
//! [`Composer`] is what the viewer needs; [`EditorComposer`] prepares a
//! template and lets the user's editor do the rest.

use crate::error::{Error, Result};
use crate::message::Message;
use std::io::Write;
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeKind {
    Reply,
    ReplyAll,
    Forward,
}

impl ComposeKind {
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Reply => "reply",
            Self::ReplyAll => "reply to all",
            Self::Forward => "forward",
        }
    }
}

/// Produces a complete RFC 2822 message in answer to `message`.
pub trait Composer: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if composing failed or the user aborted.
    fn compose(&self, kind: ComposeKind, message: &Message) -> Result<String>;
}

/// Starting text for a reply, reply-all or forward.
#[must_use]
pub fn template(kind: ComposeKind, message: &Message) -> String {
    let subject = message.header("Subject");
    let from = message.header("From");
    let body = message.body();

    if kind == ComposeKind::Forward {
        return format!(
            "To: \nSubject: {}\n\n\
             ---------- Forwarded message ----------\n\
             From: {from}\nDate: {}\nSubject: {subject}\nTo: {}\n\n{body}\n",
            prefixed("Fwd:", subject),
            message.header("Date"),
            message.header("To"),
        );
    }

    let reply_to = message.header("Reply-To");
    let mut out = format!("To: {}\n", if reply_to.is_empty() { from } else { reply_to });
    if kind == ComposeKind::ReplyAll {
        let cc: Vec<&str> = [message.header("To"), message.header("Cc")]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        if !cc.is_empty() {
            out.push_str(&format!("Cc: {}\n", cc.join(", ")));
        }
    }
    out.push_str(&format!("Subject: {}\n", prefixed("Re:", subject)));

    let message_id = message.header("Message-ID");
    if !message_id.is_empty() {
        let references = message.header("References");
        out.push_str(&format!("In-Reply-To: {message_id}\n"));
        if references.is_empty() {
            out.push_str(&format!("References: {message_id}\n"));
        } else {
            out.push_str(&format!("References: {references} {message_id}\n"));
        }
    }

    out.push_str(&format!("\nOn {}, {from} wrote:\n", message.header("Date")));
    for line in body.lines() {
        if line.is_empty() {
            out.push_str(">\n");
        } else {
            out.push_str(&format!("> {line}\n"));
        }
    }
    out
}

fn prefixed(prefix: &str, subject: &str) -> String {
    let already = subject
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
    if already {
        subject.to_string()
    } else {
        format!("{prefix} {subject}")
    }
}

/// Opens the template in `$VISUAL` / `$EDITOR`.
#[derive(Debug, Clone)]
pub struct EditorComposer {
    editor: String,
}

impl EditorComposer {
    #[must_use]
    pub fn new(editor: impl Into<String>) -> Self {
        Self {
            editor: editor.into(),
        }
    }

    /// Use `$VISUAL`, then `$EDITOR`, then `vi`.
    #[must_use]
    pub fn from_env() -> Self {
        let editor = std::env::var("VISUAL")
            .or_else(|_| std::env::var("EDITOR"))
            .unwrap_or_else(|_| "vi".to_string());
        Self::new(editor)
    }
}

impl Composer for EditorComposer {
    fn compose(&self, kind: ComposeKind, message: &Message) -> Result<String> {
        let draft = template(kind, message);
        let mut file = tempfile::Builder::new()
            .prefix("mailtail-")
            .suffix(".eml")
            .tempfile()?;
        file.write_all(draft.as_bytes())?;
        file.flush()?;

        let mut words = self.editor.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| Error::Compose("no editor configured".into()))?;
        let status = Command::new(program)
            .args(words)
            .arg(file.path())
            .status()
            .map_err(|e| Error::Compose(format!("failed to start {program}: {e}")))?;
        if !status.success() {
            return Err(Error::Compose(format!("{program} exited with {status}")));
        }

        let edited = std::fs::read_to_string(file.path())?;
        if edited.trim().is_empty() || edited.trim() == draft.trim() {
            return Err(Error::Compose("message unchanged, not sending".into()));
        }
        Ok(edited)
    }
}

//! Interactive message review
//!
//! [`Viewer`] shows one message at a time out of a list and turns key
//! presses into state changes and remote calls. Only key handling mutates
//! [`ReviewState`]; the read marker runs detached and touches nothing
//! local.
//!
//! Painting, key input and the label chooser live behind [`Terminal`] so
//! the state machine can be driven by a script in tests.

use crate::client::MailService;
use crate::compose::{ComposeKind, Composer};
use crate::error::Result;
use crate::label::{LabelTable, SystemLabel};
use crate::message::Message;
use crate::render::{self, MessageView};
use crate::verify::Verifier;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const SCROLL_STEP: i64 = 2;
/// Rows of the view not counted in a page step.
const PAGE_MARGIN: usize = 12;

pub const HELP: &str = "\
q                 Quit
<, u, Left        Back to list
^P, k             Previous
^N, j             Next
f                 Forward
r                 Reply
a                 Reply all
e                 Archive
l                 Add label
L                 Remove label
x                 Mark message
v                 Verify GPG signature
p, Up             Scroll up
n, Down           Scroll down
Space, PgDn       Page down
Backspace, PgUp   Page up
";

/// A key press, independent of the terminal library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Char(char),
    /// A letter pressed with Control.
    Ctrl(char),
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Backspace,
    Enter,
    Tab,
    Esc,
    Other(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(' ') => f.write_str("Space"),
            Self::Char(c) => write!(f, "{c}"),
            Self::Ctrl(c) => write!(f, "^{}", c.to_ascii_uppercase()),
            Self::Up => f.write_str("Up"),
            Self::Down => f.write_str("Down"),
            Self::Left => f.write_str("Left"),
            Self::Right => f.write_str("Right"),
            Self::PageUp => f.write_str("PgUp"),
            Self::PageDown => f.write_str("PgDn"),
            Self::Backspace => f.write_str("Backspace"),
            Self::Enter => f.write_str("Enter"),
            Self::Tab => f.write_str("Tab"),
            Self::Esc => f.write_str("Esc"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Help,
    Quit,
    Back,
    Previous,
    Next,
    Forward,
    Reply,
    ReplyAll,
    Archive,
    AddLabel,
    RemoveLabel,
    ToggleMark,
    Verify,
    ScrollUp,
    ScrollDown,
    PageDown,
    PageUp,
}

impl Action {
    /// The viewer's key map.
    #[must_use]
    pub const fn from_key(key: &Key) -> Option<Self> {
        Some(match key {
            Key::Char('?') => Self::Help,
            Key::Char('q') => Self::Quit,
            Key::Left | Key::Char('<' | 'u') => Self::Back,
            Key::Ctrl('p') | Key::Char('k') => Self::Previous,
            Key::Ctrl('n') | Key::Char('j') => Self::Next,
            Key::Char('f') => Self::Forward,
            Key::Char('r') => Self::Reply,
            Key::Char('a') => Self::ReplyAll,
            Key::Char('e') => Self::Archive,
            Key::Char('l') => Self::AddLabel,
            Key::Char('L') => Self::RemoveLabel,
            Key::Char('x') => Self::ToggleMark,
            Key::Char('v') => Self::Verify,
            Key::Up | Key::Char('p') => Self::ScrollUp,
            Key::Down | Key::Char('n') => Self::ScrollDown,
            Key::PageDown | Key::Char(' ') => Self::PageDown,
            Key::PageUp | Key::Backspace => Self::PageUp,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Ok,
    Error,
}

/// A line for the status bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub kind: StatusKind,
    pub text: String,
}

impl Status {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Info,
            text: text.into(),
        }
    }

    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Ok,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            text: text.into(),
        }
    }
}

/// What the viewer needs from the screen and keyboard.
#[async_trait]
pub trait Terminal: Send {
    /// Wait for the next key press.
    async fn next_key(&mut self) -> Result<Key>;

    /// `(width, height)` of the message area.
    fn size(&self) -> (usize, usize);

    fn draw(&mut self, lines: &[String]) -> Result<()>;

    fn status(&mut self, status: &Status) -> Result<()>;

    /// Show `text` until a key is pressed.
    async fn help(&mut self, text: &str) -> Result<()>;

    /// Let the user pick one of `options`; `None` if they cancel.
    async fn choose(&mut self, prompt: &str, options: &[String]) -> Result<Option<String>>;

    /// Hand the terminal to another program.
    fn suspend(&mut self) -> Result<()>;

    fn resume(&mut self) -> Result<()>;
}

/// How the viewer was left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Return to the message list.
    Back,
    /// Stop the whole session.
    Quit,
}

/// Position, scroll offset and local marks of a review session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewState {
    current: usize,
    scroll: i64,
    marked: HashSet<String>,
}

impl ReviewState {
    #[must_use]
    pub fn new(current: usize) -> Self {
        Self {
            current,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn current(&self) -> usize {
        self.current
    }

    #[must_use]
    pub const fn scroll(&self) -> i64 {
        self.scroll
    }

    #[must_use]
    pub fn is_marked(&self, id: &str) -> bool {
        self.marked.contains(id)
    }

    #[must_use]
    pub const fn marked(&self) -> &HashSet<String> {
        &self.marked
    }

    pub const fn previous(&mut self) {
        self.scroll = 0;
        self.current = self.current.saturating_sub(1);
    }

    pub const fn next(&mut self, len: usize) {
        self.scroll = 0;
        if self.current + 1 < len {
            self.current += 1;
        }
    }

    pub const fn scroll_by(&mut self, delta: i64) {
        self.scroll = self.scroll.saturating_add(delta);
    }

    pub fn clamp(&mut self, content_lines: usize, view_height: usize) {
        self.scroll = render::clamp_scroll(self.scroll, content_lines, view_height);
    }

    /// Flip the mark on `id`; returns whether it is now marked.
    pub fn toggle_mark(&mut self, id: &str) -> bool {
        if self.marked.remove(id) {
            false
        } else {
            self.marked.insert(id.to_string());
            true
        }
    }
}

/// Clear the unread label without waiting for the outcome.
///
/// Failures are only logged.
pub fn spawn_mark_read<S: MailService>(service: Arc<S>, id: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started = Instant::now();
        let unread = SystemLabel::Unread;
        match service.modify_message(&id, &[], &[unread.as_id()]).await {
            Ok(()) => debug!("Marked {} read in {:?}", id, started.elapsed()),
            Err(e) => warn!("Failed to mark {} read: {}", id, e),
        }
    })
}

/// The message viewer.
pub struct Viewer<'a, S, C> {
    service: Arc<S>,
    labels: &'a LabelTable,
    composer: &'a C,
    verifier: &'a Verifier,
    messages: &'a [Message],
    current_label: String,
    state: ReviewState,
    read_dispatched: HashSet<String>,
}

impl<'a, S: MailService, C: Composer> Viewer<'a, S, C> {
    /// A viewer over `messages`, opened from the list of `current_label`.
    #[must_use]
    pub fn new(
        service: Arc<S>,
        labels: &'a LabelTable,
        composer: &'a C,
        verifier: &'a Verifier,
        messages: &'a [Message],
        current_label: &str,
    ) -> Self {
        Self {
            service,
            labels,
            composer,
            verifier,
            messages,
            current_label: current_label.to_string(),
            state: ReviewState::default(),
            read_dispatched: HashSet::new(),
        }
    }

    /// Start from `state` instead of the first message.
    #[must_use]
    pub fn with_state(mut self, state: ReviewState) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub const fn state(&self) -> &ReviewState {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> ReviewState {
        self.state
    }

    /// Handle keys until the user leaves the viewer.
    ///
    /// # Errors
    ///
    /// Only terminal failures are returned; failed remote calls are
    /// reported on the status line.
    pub async fn run<T: Terminal>(&mut self, term: &mut T) -> Result<Exit> {
        let Some(last) = self.messages.len().checked_sub(1) else {
            term.status(&Status::info("No messages"))?;
            return Ok(Exit::Back);
        };
        self.state.current = self.state.current.min(last);

        term.status(&Status::info("Opening message"))?;
        loop {
            self.enter_current();
            self.redraw(term)?;
            let key = term.next_key().await?;
            term.status(&Status::info("OK"))?;
            if let Some(exit) = self.handle(&key, term).await? {
                return Ok(exit);
            }
            let (width, height) = term.size();
            let lines = render::wrap_body(&self.current().body(), width).len();
            self.state.clamp(lines, height);
        }
    }

    fn current(&self) -> &'a Message {
        let messages: &'a [Message] = self.messages;
        &messages[self.state.current]
    }

    fn enter_current(&mut self) {
        let message = self.current();
        if message.has_label(SystemLabel::Unread.as_id())
            && self.read_dispatched.insert(message.id.clone())
        {
            spawn_mark_read(Arc::clone(&self.service), message.id.clone());
        }
    }

    fn redraw<T: Terminal>(&self, term: &mut T) -> Result<()> {
        let (width, height) = term.size();
        let message = self.current();
        let lines = render::message_view(&MessageView {
            message,
            position: self.state.current,
            total: self.messages.len(),
            marked: self.state.is_marked(&message.id),
            current_label: &self.current_label,
            labels: self.labels,
            width,
            height,
            scroll: self.state.scroll,
        });
        term.draw(&lines)
    }

    async fn handle<T: Terminal>(&mut self, key: &Key, term: &mut T) -> Result<Option<Exit>> {
        let Some(action) = Action::from_key(key) else {
            term.status(&Status::error(format!("unknown key: {key}")))?;
            return Ok(None);
        };
        let (_, height) = term.size();
        let page = i64::try_from(height.saturating_sub(PAGE_MARGIN).max(1)).unwrap_or(1);

        match action {
            Action::Help => term.help(HELP).await?,
            Action::Quit => return Ok(Some(Exit::Quit)),
            Action::Back => return Ok(Some(Exit::Back)),
            Action::Previous => self.state.previous(),
            Action::Next => self.state.next(self.messages.len()),
            Action::Forward => self.compose(ComposeKind::Forward, term).await?,
            Action::Reply => self.compose(ComposeKind::Reply, term).await?,
            Action::ReplyAll => self.compose(ComposeKind::ReplyAll, term).await?,
            Action::Archive => {
                if self.archive(term).await? {
                    return Ok(Some(Exit::Back));
                }
            }
            Action::AddLabel => self.add_label(term).await?,
            Action::RemoveLabel => self.remove_label(term).await?,
            Action::ToggleMark => {
                let id = &self.current().id;
                let text = if self.state.toggle_mark(id) {
                    "Marked"
                } else {
                    "Unmarked"
                };
                term.status(&Status::info(text))?;
            }
            Action::Verify => self.verify(term).await?,
            Action::ScrollUp => self.state.scroll_by(-SCROLL_STEP),
            Action::ScrollDown => self.state.scroll_by(SCROLL_STEP),
            Action::PageDown => self.state.scroll_by(page),
            Action::PageUp => self.state.scroll_by(-page),
        }
        Ok(None)
    }

    /// Returns whether the message left the inbox.
    async fn archive<T: Terminal>(&self, term: &mut T) -> Result<bool> {
        let message = self.current();
        let started = Instant::now();
        let inbox = SystemLabel::Inbox;
        match self
            .service
            .modify_message(&message.id, &[], &[inbox.as_id()])
            .await
        {
            Ok(()) => {
                debug!("Archived {} in {:?}", message.id, started.elapsed());
                term.status(&Status::ok("OK, archived"))?;
                Ok(true)
            }
            Err(e) => {
                term.status(&Status::error(format!("Failed to archive: {e}")))?;
                Ok(false)
            }
        }
    }

    async fn add_label<T: Terminal>(&self, term: &mut T) -> Result<()> {
        let message = self.current();
        let options = self.labels.not_applied(message);
        let Some(name) = self.choose(term, "Add label>", &options).await? else {
            return Ok(());
        };
        let Some(id) = self.labels.id(&name) else {
            return term.status(&Status::error(format!("Unknown label {name:?}")));
        };
        match self.service.modify_message(&message.id, &[id], &[]).await {
            Ok(()) => term.status(&Status::ok(format!("Applied label {name:?}"))),
            Err(e) => term.status(&Status::error(format!(
                "Failed to apply label {name:?}: {e}"
            ))),
        }
    }

    async fn remove_label<T: Terminal>(&self, term: &mut T) -> Result<()> {
        let message = self.current();
        let options = self.labels.applied(message);
        let Some(name) = self.choose(term, "Remove label>", &options).await? else {
            return Ok(());
        };
        // Labels missing from the table are shown by id.
        let id = self.labels.id(&name).unwrap_or(name.as_str());
        match self.service.modify_message(&message.id, &[], &[id]).await {
            Ok(()) => term.status(&Status::ok(format!("Removed label {name:?}"))),
            Err(e) => term.status(&Status::error(format!(
                "Failed to remove label {name:?}: {e}"
            ))),
        }
    }

    /// The chooser's pick, if it is one of `options`.
    async fn choose<T: Terminal>(
        &self,
        term: &mut T,
        prompt: &str,
        options: &[String],
    ) -> Result<Option<String>> {
        let choice = term.choose(prompt, options).await?;
        Ok(choice.filter(|name| !name.is_empty() && options.contains(name)))
    }

    async fn compose<T: Terminal>(&self, kind: ComposeKind, term: &mut T) -> Result<()> {
        let message = self.current();
        term.status(&Status::info(format!("Composing {}", kind.describe())))?;

        term.suspend()?;
        let composed = self.composer.compose(kind, message);
        term.resume()?;

        let raw = match composed {
            Ok(raw) => raw,
            Err(e) => {
                return term.status(&Status::error(format!(
                    "Failed to compose {}: {e}",
                    kind.describe()
                )));
            }
        };
        match self.service.send_message(&message.thread_id, &raw).await {
            Ok(()) => term.status(&Status::ok("Sent")),
            Err(e) => term.status(&Status::error(format!("Failed to send: {e}"))),
        }
    }

    async fn verify<T: Terminal>(&self, term: &mut T) -> Result<()> {
        term.status(&Status::info("Verifying..."))?;
        let outcome = self.verifier.verify(&self.current().body()).await;
        let status = if outcome.is_success() {
            Status::ok(outcome.to_string())
        } else {
            Status::error(outcome.to_string())
        };
        term.status(&status)
    }
}
